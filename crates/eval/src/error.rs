//! Engine error taxonomy.
//!
//! Condition-evaluation faults are internal: they degrade the leaf to a
//! non-match and are logged, never surfaced. Everything that does cross
//! the API boundary is one of the enums below.

use rust_decimal::Decimal;

/// A formula runtime failure. Aborts the owning rule's contribution,
/// never the whole evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("unknown field '{name}'")]
    UnknownField { name: String },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("numeric overflow: {message}")]
    Overflow { message: String },

    /// The step budget guards against pathological expressions; see
    /// `interp::MAX_STEPS`.
    #[error("formula exceeded the evaluation step budget")]
    BudgetExceeded,
}

/// A failure while computing one rule's adjustment. Captured into the
/// rule's `EvaluationResult`; the orchestrator continues with the rest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("per-unit metric '{metric}' is not present in the context")]
    MissingMetric { metric: String },

    #[error("formula failed: {0}")]
    Formula(#[from] RuntimeError),

    /// A formula that should have been rejected at save time. Kept so a
    /// stale stored rule degrades to a per-rule error instead of a panic.
    #[error("formula does not parse: {0}")]
    BadFormula(String),
}

/// Ruleset selection failure — fatal for the evaluation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("no active ruleset is available")]
    NoActiveRuleset,
}

/// A definition rejected at save/load time. The evaluator assumes
/// definitions passed these checks and performs none of them itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("rule '{rule_id}': per_unit action requires a metric")]
    PerUnitWithoutMetric { rule_id: String },

    #[error("rule '{rule_id}': formula does not parse: {message}")]
    InvalidFormula { rule_id: String, message: String },

    #[error("rule '{rule_id}': clamp is set but neither min_usd nor max_usd is given")]
    ClampWithoutBounds { rule_id: String },

    #[error("rule '{rule_id}': min_usd/max_usd are set but clamp is not")]
    BoundsWithoutClamp { rule_id: String },

    #[error("rule '{rule_id}': min_usd {min} exceeds max_usd {max}")]
    InvertedClampBounds {
        rule_id: String,
        min: Decimal,
        max: Decimal,
    },

    #[error("rule '{rule_id}': multiplier on field '{field}' has no cases")]
    EmptyMultiplier { rule_id: String, field: String },

    #[error("group '{group_id}': weight {weight} is outside [0, 1]")]
    WeightOutOfRange { group_id: String, weight: Decimal },
}
