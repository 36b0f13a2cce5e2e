//! appraise-eval: the listing valuation rule engine.
//!
//! Consumes read-only rule definitions (rulesets, groups, rules,
//! condition trees, actions) and a flattened listing context, and
//! produces ephemeral evaluation results. The evaluator is a pure
//! function of `(definitions, context)`: no shared mutable state, no
//! I/O, safe to call concurrently across listings. Anything
//! asynchronous — fetching rules, joining catalog records, persisting
//! outcomes — belongs to the caller.
//!
//! # Public API
//!
//! - [`build_context`] / [`Context`] -- flatten a listing for evaluation
//! - [`validate_definitions`] -- save-time invariant checks
//! - [`select_ruleset`] + [`evaluate_listing`], or [`evaluate`] for both
//! - [`preview_rule`] -- read-only candidate-rule simulation
//! - [`apply_batch`] -- bulk application with isolated failures
//! - [`validate_formula`] -- standalone formula checking

pub mod action;
pub mod audit;
pub mod batch;
pub mod condition;
pub mod context;
pub mod error;
pub mod fields;
pub mod formula;
pub mod interp;
pub mod model;
pub mod preview;
pub mod ruleset;
pub mod trace;
pub mod value;

// ── Convenience re-exports: key types ────────────────────────────────

pub use batch::{apply_batch, BatchError, BatchOutcome, BatchReport};
pub use context::{build_context, Context};
pub use error::{ActionError, DefinitionError, RuntimeError, SelectionError};
pub use fields::EntityKind;
pub use formula::{validate_formula, FormulaValidation};
pub use model::{
    validate_definitions, Action, ActionKind, Condition, FieldType, LogicalOp, Modifier,
    Modifiers, Operator, Rule, RuleGroup, Ruleset,
};
pub use preview::{preview_rule, CandidateRule, ContextPool, InMemoryPool, PoolEntry, PreviewResult};
pub use ruleset::{evaluate_listing, select_ruleset, EvaluationResult, EvaluationSummary};
pub use trace::AdjustmentTrace;
pub use value::Value;

/// Select the applicable ruleset and evaluate it in one call.
///
/// `assigned` is the listing's explicitly assigned ruleset id, when it
/// has one. Fails only when no active ruleset exists at all.
pub fn evaluate(
    rulesets: &[Ruleset],
    assigned: Option<&str>,
    ctx: &Context,
) -> Result<EvaluationSummary, SelectionError> {
    let ruleset = select_ruleset(rulesets, assigned, ctx)?;
    Ok(evaluate_listing(ruleset, ctx))
}
