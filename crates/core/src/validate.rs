//! Dry formula validation: syntax checking and identifier
//! cross-referencing against a known field list.
//!
//! This pass never evaluates anything and never fails — every problem is
//! returned as a structured [`Diagnostic`]. Preview evaluation against a
//! sample context is layered on top by the engine crate.

use serde::{Deserialize, Serialize};

use crate::ast::Expr;
use crate::parser::parse;

/// Diagnostic severity. Only `Error` makes a formula invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One validation finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            position: None,
            suggestion: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Warning,
            position: None,
            suggestion: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Info,
            position: None,
            suggestion: None,
        }
    }

    pub fn with_position(mut self, position: Option<usize>) -> Self {
        self.position = position;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Outcome of the syntax/field pass.
#[derive(Debug, Clone)]
pub struct SyntaxCheck {
    /// The parsed expression, when the formula parsed at all.
    pub expr: Option<Expr>,
    pub diagnostics: Vec<Diagnostic>,
    /// Field paths the formula references, in first-use order.
    pub used_fields: Vec<String>,
}

impl SyntaxCheck {
    /// True when no error-severity diagnostic was produced.
    pub fn is_valid(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Check a formula's syntax and cross-reference its identifiers against
/// the known field list.
pub fn check(formula: &str, known_fields: &[&str]) -> SyntaxCheck {
    if formula.trim().is_empty() {
        return SyntaxCheck {
            expr: None,
            diagnostics: vec![Diagnostic::info(
                "formula is empty; the action's value_usd will be used instead",
            )],
            used_fields: Vec::new(),
        };
    }

    let expr = match parse(formula) {
        Ok(expr) => expr,
        Err(e) => {
            return SyntaxCheck {
                expr: None,
                diagnostics: vec![Diagnostic::error(e.message).with_position(e.position)],
                used_fields: Vec::new(),
            };
        }
    };

    let used_fields = expr.fields();
    let mut diagnostics = Vec::new();

    for field in &used_fields {
        if !known_fields.iter().any(|k| k == field) {
            let mut d = Diagnostic::error(format!("unknown field '{}'", field));
            if let Some(s) = suggest(field, known_fields) {
                d = d.with_suggestion(format!("did you mean '{}'?", s));
            }
            diagnostics.push(d);
        }
    }

    if expr.yields_boolean() {
        diagnostics.push(Diagnostic::warning(
            "formula evaluates to a boolean, not an amount",
        ));
    }

    SyntaxCheck {
        expr: Some(expr),
        diagnostics,
        used_fields,
    }
}

/// Best-effort suggestion for a misspelled field: a case-insensitive
/// match first, then a field sharing the same final path segment, then a
/// prefix/containment match. Deliberately cheap — no fuzzy matching.
fn suggest(name: &str, known_fields: &[&str]) -> Option<String> {
    if let Some(k) = known_fields
        .iter()
        .find(|k| k.eq_ignore_ascii_case(name))
    {
        return Some(k.to_string());
    }
    let last = name.rsplit('.').next().unwrap_or(name);
    if let Some(k) = known_fields
        .iter()
        .find(|k| k.rsplit('.').next().unwrap_or(k).eq_ignore_ascii_case(last))
    {
        return Some(k.to_string());
    }
    known_fields
        .iter()
        .find(|k| {
            let kl = k.to_ascii_lowercase();
            let nl = name.to_ascii_lowercase();
            kl.starts_with(&nl) || nl.starts_with(&kl)
        })
        .map(|k| k.to_string())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
