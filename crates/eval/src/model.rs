//! Rule definition records.
//!
//! These types are the engine's read-only input: rulesets, groups, rules,
//! condition trees and actions, deserialized from the surrounding
//! application's records. The adjacency-list condition storage shape
//! (`parent_condition_id` rows) is reconstructed upstream into the owned
//! recursive [`Condition`] tree before it reaches the engine.
//!
//! All invariants are enforced here, at save/load time, by
//! [`validate_definitions`] — the evaluator assumes well-formed input and
//! never re-checks these mid-evaluation.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;

// ──────────────────────────────────────────────
// Condition tree
// ──────────────────────────────────────────────

/// How a group combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

/// The closed comparison operator set for condition leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    Regex,
    IsEmpty,
    NotExists,
}

/// Declared type of a leaf's field, governing comparison coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Number,
    #[default]
    Text,
    Boolean,
}

/// A condition tree node: a leaf comparison, or a logical group whose
/// children are evaluated in stored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Group {
        logical_operator: LogicalOp,
        #[serde(default)]
        children: Vec<Condition>,
    },
    Leaf {
        field_name: String,
        #[serde(default)]
        field_type: FieldType,
        operator: Operator,
        #[serde(default)]
        value: serde_json::Value,
    },
}

impl Condition {
    /// The unrestricted condition: an AND group with no children. A
    /// ruleset or rule carrying this matches every listing.
    pub fn empty() -> Condition {
        Condition::Group {
            logical_operator: LogicalOp::And,
            children: Vec::new(),
        }
    }

    /// True when the tree has no leaves at all.
    pub fn is_empty_tree(&self) -> bool {
        match self {
            Condition::Leaf { .. } => false,
            Condition::Group { children, .. } => children.iter().all(Condition::is_empty_tree),
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::empty()
    }
}

// ──────────────────────────────────────────────
// Actions and modifiers
// ──────────────────────────────────────────────

/// How an action computes its base amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FixedValue,
    PerUnit,
    Formula,
}

/// One case of a field-based multiplier: a value to match
/// (case-insensitively) and the factor to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierCase {
    pub value: String,
    pub multiplier: Decimal,
}

/// A field-based multiplier spec: the first case matching the context's
/// value for `field` scales the running amount; no match means identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMultiplier {
    pub field: String,
    pub cases: Vec<MultiplierCase>,
}

/// The modifier record carried by an action, in its stored shape. Both
/// historical formats live here: the field-based multiplier list and the
/// legacy flat condition→multiplier map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multipliers: Vec<FieldMultiplier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_multipliers: Option<BTreeMap<String, Decimal>>,
    #[serde(default)]
    pub clamp: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_usd: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_usd: Option<Decimal>,
}

/// One normalized modifier, in application order. Validation guarantees
/// a `Clamp` entry carries at least one bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    FieldMultiplier(FieldMultiplier),
    ConditionMultiplier(BTreeMap<String, Decimal>),
    Clamp {
        min_usd: Option<Decimal>,
        max_usd: Option<Decimal>,
    },
}

impl Modifiers {
    /// Whether any modifier is configured.
    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty() && self.condition_multipliers.is_none() && !self.clamp
    }

    /// Normalize the stored record into the ordered, closed modifier
    /// list the calculator applies: field multipliers, then the legacy
    /// condition map, then the clamp.
    pub fn normalized(&self) -> Vec<Modifier> {
        let mut out = Vec::new();
        for m in &self.multipliers {
            out.push(Modifier::FieldMultiplier(m.clone()));
        }
        if let Some(table) = &self.condition_multipliers {
            out.push(Modifier::ConditionMultiplier(table.clone()));
        }
        if self.clamp {
            out.push(Modifier::Clamp {
                min_usd: self.min_usd,
                max_usd: self.max_usd,
            });
        }
        out
    }

    fn validate(&self, rule_id: &str, errors: &mut Vec<DefinitionError>) {
        if self.clamp && self.min_usd.is_none() && self.max_usd.is_none() {
            errors.push(DefinitionError::ClampWithoutBounds {
                rule_id: rule_id.to_string(),
            });
        }
        if !self.clamp && (self.min_usd.is_some() || self.max_usd.is_some()) {
            errors.push(DefinitionError::BoundsWithoutClamp {
                rule_id: rule_id.to_string(),
            });
        }
        if let (Some(min), Some(max)) = (self.min_usd, self.max_usd) {
            if min > max {
                errors.push(DefinitionError::InvertedClampBounds {
                    rule_id: rule_id.to_string(),
                    min,
                    max,
                });
            }
        }
        for m in &self.multipliers {
            if m.cases.is_empty() {
                errors.push(DefinitionError::EmptyMultiplier {
                    rule_id: rule_id.to_string(),
                    field: m.field.clone(),
                });
            }
        }
    }
}

/// A pricing action: fixed amount, per-unit amount, or formula result,
/// subject to its modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "action_type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(default)]
    pub value_usd: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Modifiers::is_empty")]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub display_order: i32,
}

impl Action {
    fn validate(&self, rule_id: &str, errors: &mut Vec<DefinitionError>) {
        if self.kind == ActionKind::PerUnit
            && self.metric.as_deref().map_or(true, str::is_empty)
        {
            errors.push(DefinitionError::PerUnitWithoutMetric {
                rule_id: rule_id.to_string(),
            });
        }
        // An absent or empty formula falls back to value_usd; a present
        // formula must parse.
        if self.kind == ActionKind::Formula {
            if let Some(formula) = self.formula.as_deref() {
                if !formula.trim().is_empty() {
                    if let Err(e) = appraise_core::parse(formula) {
                        errors.push(DefinitionError::InvalidFormula {
                            rule_id: rule_id.to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
        self.modifiers.validate(rule_id, errors);
    }
}

// ──────────────────────────────────────────────
// Rules, groups, rulesets
// ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

fn default_weight() -> Decimal {
    Decimal::ONE
}

/// A condition plus an ordered action list, contributing a signed price
/// adjustment when matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub evaluation_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn validate(&self, errors: &mut Vec<DefinitionError>) {
        for action in &self.actions {
            action.validate(&self.id, errors);
        }
    }
}

/// A weighted, ordered collection of rules within a ruleset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_weight")]
    pub weight: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    pub fn validate(&self, errors: &mut Vec<DefinitionError>) {
        if self.weight < Decimal::ZERO || self.weight > Decimal::ONE {
            errors.push(DefinitionError::WeightOutOfRange {
                group_id: self.id.clone(),
                weight: self.weight,
            });
        }
        for rule in &self.rules {
            rule.validate(errors);
        }
    }
}

/// Top-level, prioritized container of rule groups, gated by its own
/// condition tree. Lower `priority` runs and matches first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
    /// RFC 3339 creation timestamp. Ordered lexicographically when
    /// breaking priority ties.
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

impl Ruleset {
    pub fn validate(&self, errors: &mut Vec<DefinitionError>) {
        for group in &self.groups {
            group.validate(errors);
        }
    }
}

/// Validate a full set of definitions at save/load time. Collects every
/// violation rather than stopping at the first.
pub fn validate_definitions(rulesets: &[Ruleset]) -> Result<(), Vec<DefinitionError>> {
    let mut errors = Vec::new();
    for rs in rulesets {
        rs.validate(&mut errors);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
