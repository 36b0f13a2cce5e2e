//! Standalone formula validation.
//!
//! Wraps the core syntax/field pass and layers a non-fatal preview
//! evaluation on top. This entry point never fails: every problem comes
//! back as a structured diagnostic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use appraise_core::validate::{check, Diagnostic};

use crate::context::Context;
use crate::fields::{known_field_paths, sample_context, EntityKind};
use crate::interp;
use crate::trace::TraceCollector;

/// Result of validating one formula against an entity's field catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaValidation {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    /// Value the formula produced against the sample context, when it
    /// could be computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Decimal>,
    pub used_fields: Vec<String>,
    pub available_fields: Vec<String>,
}

/// Validate a formula for the given entity.
///
/// Runs the syntax and identifier checks, then — when the formula parsed
/// cleanly — computes a preview value against `sample`, or against a
/// synthesized sample context when none is supplied. A preview failure
/// is a warning, never an error: the sample context cannot know which
/// optional relations a real listing will carry.
pub fn validate_formula(
    formula: &str,
    entity: EntityKind,
    sample: Option<&Context>,
) -> FormulaValidation {
    let available_fields = known_field_paths(entity);
    let field_refs: Vec<&str> = available_fields.iter().map(String::as_str).collect();
    let result = check(formula, &field_refs);

    let mut errors = result.diagnostics;
    let mut preview = None;

    if let Some(expr) = &result.expr {
        let synthesized;
        let ctx = match sample {
            Some(ctx) => ctx,
            None => {
                synthesized = sample_context(entity);
                &synthesized
            }
        };
        let mut collector = TraceCollector::new();
        match interp::evaluate(expr, ctx, &mut collector) {
            Ok(value) => preview = Some(value),
            Err(e) => {
                errors.push(Diagnostic::warning(format!(
                    "preview evaluation failed: {}",
                    e
                )));
            }
        }
    }

    let valid = !errors
        .iter()
        .any(|d| d.severity == appraise_core::Severity::Error);

    FormulaValidation {
        valid,
        errors,
        preview,
        used_fields: result.used_fields,
        available_fields,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
