//! Ruleset selection and rule-walk orchestration.
//!
//! Selection is a four-step fallback chain: explicit assignment, context
//! match over active rulesets, first active ruleset, then failure. Every
//! ordering is total — priority, then `created_at`, then id — so the same
//! inputs always select the same ruleset.
//!
//! Rule evaluation walks groups by `display_order` and rules by
//! `(evaluation_order, id)`, accumulating matched rules' adjustments.
//! Per-rule failures are captured on the result and the walk continues.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::action::compute_adjustment;
use crate::condition::eval_condition;
use crate::context::Context;
use crate::error::SelectionError;
use crate::model::{Rule, RuleGroup, Ruleset};
use crate::trace::{AdjustmentTrace, TraceCollector};

/// Per-rule outcome. Ephemeral — the engine never persists these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub rule_id: String,
    pub matched: bool,
    pub adjustment_value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub trace: AdjustmentTrace,
}

/// Aggregated outcome across all rules considered for one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub total_adjustment: Decimal,
    pub matched_rules_count: usize,
    pub matched_rules: Vec<EvaluationResult>,
}

impl EvaluationSummary {
    /// The adjusted valuation for a listing priced at `original`.
    pub fn adjusted_price(&self, original: Decimal) -> Decimal {
        original.saturating_add(self.total_adjustment)
    }
}

/// Select the ruleset applicable to a context.
///
/// 1. An explicitly assigned, active ruleset wins.
/// 2. Otherwise the first active ruleset (by priority, `created_at`, id)
///    whose condition tree matches the context.
/// 3. Otherwise the first active ruleset under the same ordering.
/// 4. With no active ruleset at all, selection fails.
pub fn select_ruleset<'a>(
    rulesets: &'a [Ruleset],
    assigned: Option<&str>,
    ctx: &Context,
) -> Result<&'a Ruleset, SelectionError> {
    if let Some(id) = assigned {
        if let Some(rs) = rulesets.iter().find(|r| r.id == id && r.is_active) {
            return Ok(rs);
        }
        // An assigned but missing or inactive ruleset falls through to
        // context matching.
    }

    let mut active: Vec<&Ruleset> = rulesets.iter().filter(|r| r.is_active).collect();
    if active.is_empty() {
        return Err(SelectionError::NoActiveRuleset);
    }
    active.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    for rs in &active {
        let mut collector = TraceCollector::new();
        if eval_condition(&rs.condition, ctx, &mut collector) {
            return Ok(rs);
        }
    }
    Ok(active[0])
}

/// Evaluate every active rule of a ruleset against a context.
pub fn evaluate_listing(ruleset: &Ruleset, ctx: &Context) -> EvaluationSummary {
    let mut matched_rules = Vec::new();
    let mut total = Decimal::ZERO;

    let mut groups: Vec<&RuleGroup> = ruleset.groups.iter().filter(|g| g.is_active).collect();
    groups.sort_by_key(|g| g.display_order);

    for group in groups {
        let mut rules: Vec<&Rule> = group.rules.iter().filter(|r| r.is_active).collect();
        rules.sort_by(|a, b| {
            a.evaluation_order
                .cmp(&b.evaluation_order)
                .then_with(|| a.id.cmp(&b.id))
        });

        for rule in rules {
            let mut collector = TraceCollector::new();
            if !eval_condition(&rule.condition, ctx, &mut collector) {
                continue;
            }
            match compute_adjustment(&rule.actions, ctx, &mut collector) {
                Ok(amount) => {
                    let scaled = amount
                        .checked_mul(group.weight)
                        .and_then(|w| total.checked_add(w).map(|t| (w, t)));
                    match scaled {
                        Some((weighted, new_total)) => {
                            total = new_total;
                            matched_rules.push(EvaluationResult {
                                rule_id: rule.id.clone(),
                                matched: true,
                                adjustment_value: weighted,
                                error: None,
                                trace: collector.into_trace(),
                            });
                        }
                        None => {
                            matched_rules.push(EvaluationResult {
                                rule_id: rule.id.clone(),
                                matched: true,
                                adjustment_value: Decimal::ZERO,
                                error: Some("adjustment overflow".to_string()),
                                trace: collector.into_trace(),
                            });
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(rule = %rule.id, "rule contribution skipped: {}", e);
                    matched_rules.push(EvaluationResult {
                        rule_id: rule.id.clone(),
                        matched: true,
                        adjustment_value: Decimal::ZERO,
                        error: Some(e.to_string()),
                        trace: collector.into_trace(),
                    });
                }
            }
        }
    }

    EvaluationSummary {
        total_adjustment: total,
        matched_rules_count: matched_rules.len(),
        matched_rules,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, ActionKind, Condition, FieldType, Modifiers, Operator};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ctx(json: serde_json::Value) -> Context {
        Context::from_json(&json)
    }

    fn fixed_rule(id: &str, order: i32, value: &str, condition: Condition) -> Rule {
        Rule {
            id: id.to_string(),
            name: id.to_string(),
            priority: 0,
            evaluation_order: order,
            is_active: true,
            version: 1,
            condition,
            actions: vec![Action {
                kind: ActionKind::FixedValue,
                metric: None,
                value_usd: dec(value),
                formula: None,
                modifiers: Modifiers::default(),
                display_order: 0,
            }],
        }
    }

    fn group(id: &str, order: i32, weight: &str, rules: Vec<Rule>) -> RuleGroup {
        RuleGroup {
            id: id.to_string(),
            category: "general".to_string(),
            display_order: order,
            weight: dec(weight),
            is_active: true,
            rules,
        }
    }

    fn ruleset(id: &str, priority: i32, created_at: &str, condition: Condition) -> Ruleset {
        Ruleset {
            id: id.to_string(),
            name: id.to_string(),
            version: 1,
            is_active: true,
            priority,
            created_at: created_at.to_string(),
            condition,
            groups: vec![],
        }
    }

    fn used_condition() -> Condition {
        Condition::Leaf {
            field_name: "condition".to_string(),
            field_type: FieldType::Text,
            operator: Operator::Eq,
            value: serde_json::json!("used"),
        }
    }

    #[test]
    fn explicit_assignment_wins() {
        let rulesets = vec![
            ruleset("a", 0, "2025-01-01T00:00:00Z", Condition::empty()),
            ruleset("b", 5, "2025-01-02T00:00:00Z", Condition::empty()),
        ];
        let selected = select_ruleset(&rulesets, Some("b"), &Context::new()).unwrap();
        assert_eq!(selected.id, "b");
    }

    #[test]
    fn inactive_assignment_falls_through() {
        let mut a = ruleset("a", 0, "2025-01-01T00:00:00Z", Condition::empty());
        a.is_active = false;
        let b = ruleset("b", 5, "2025-01-02T00:00:00Z", Condition::empty());
        let selected = select_ruleset(&[a, b], Some("a"), &Context::new()).unwrap();
        assert_eq!(selected.id, "b");
    }

    #[test]
    fn context_match_respects_priority_order() {
        let rulesets = vec![
            ruleset("low", 10, "2025-01-01T00:00:00Z", Condition::empty()),
            ruleset("high", 1, "2025-01-02T00:00:00Z", Condition::empty()),
        ];
        let selected = select_ruleset(&rulesets, None, &Context::new()).unwrap();
        assert_eq!(selected.id, "high");
    }

    #[test]
    fn priority_ties_break_on_created_at_then_id() {
        let rulesets = vec![
            ruleset("b", 1, "2025-06-01T00:00:00Z", Condition::empty()),
            ruleset("a", 1, "2025-06-01T00:00:00Z", Condition::empty()),
            ruleset("c", 1, "2025-01-01T00:00:00Z", Condition::empty()),
        ];
        // c is oldest; a beats b on id
        let selected = select_ruleset(&rulesets, None, &Context::new()).unwrap();
        assert_eq!(selected.id, "c");

        let no_c: Vec<Ruleset> = rulesets.into_iter().filter(|r| r.id != "c").collect();
        let selected = select_ruleset(&no_c, None, &Context::new()).unwrap();
        assert_eq!(selected.id, "a");
    }

    #[test]
    fn selection_is_deterministic() {
        let rulesets = vec![
            ruleset("x", 2, "2025-03-01T00:00:00Z", used_condition()),
            ruleset("y", 2, "2025-03-01T00:00:00Z", Condition::empty()),
        ];
        let c = ctx(serde_json::json!({ "condition": "used" }));
        let first = select_ruleset(&rulesets, None, &c).unwrap().id.clone();
        for _ in 0..10 {
            assert_eq!(select_ruleset(&rulesets, None, &c).unwrap().id, first);
        }
    }

    #[test]
    fn non_matching_conditions_fall_back_to_first_active() {
        let rulesets = vec![
            ruleset("gated", 1, "2025-01-01T00:00:00Z", used_condition()),
            ruleset("also_gated", 2, "2025-01-02T00:00:00Z", used_condition()),
        ];
        let c = ctx(serde_json::json!({ "condition": "new" }));
        let selected = select_ruleset(&rulesets, None, &c).unwrap();
        assert_eq!(selected.id, "gated");
    }

    #[test]
    fn no_active_ruleset_is_fatal() {
        let mut rs = ruleset("a", 0, "2025-01-01T00:00:00Z", Condition::empty());
        rs.is_active = false;
        assert_eq!(
            select_ruleset(&[rs], None, &Context::new()),
            Err(SelectionError::NoActiveRuleset)
        );
    }

    #[test]
    fn evaluate_sums_matched_rules() {
        let mut rs = ruleset("rs", 0, "2025-01-01T00:00:00Z", Condition::empty());
        rs.groups = vec![group(
            "g1",
            0,
            "1.0",
            vec![
                fixed_rule("r1", 0, "-20", used_condition()),
                fixed_rule("r2", 1, "5", Condition::empty()),
            ],
        )];
        let c = ctx(serde_json::json!({ "condition": "used" }));
        let summary = evaluate_listing(&rs, &c);
        assert_eq!(summary.total_adjustment, dec("-15"));
        assert_eq!(summary.matched_rules_count, 2);
    }

    #[test]
    fn group_weight_scales_contributions() {
        let mut rs = ruleset("rs", 0, "2025-01-01T00:00:00Z", Condition::empty());
        rs.groups = vec![group(
            "g1",
            0,
            "0.5",
            vec![fixed_rule("r1", 0, "-20", Condition::empty())],
        )];
        let summary = evaluate_listing(&rs, &Context::new());
        assert_eq!(summary.total_adjustment, dec("-10.0"));
        assert_eq!(summary.matched_rules[0].adjustment_value, dec("-10.0"));
    }

    #[test]
    fn inactive_groups_and_rules_are_skipped() {
        let mut rs = ruleset("rs", 0, "2025-01-01T00:00:00Z", Condition::empty());
        let mut inactive_group = group(
            "g1",
            0,
            "1.0",
            vec![fixed_rule("r1", 0, "-100", Condition::empty())],
        );
        inactive_group.is_active = false;
        let mut inactive_rule = fixed_rule("r2", 0, "-50", Condition::empty());
        inactive_rule.is_active = false;
        rs.groups = vec![
            inactive_group,
            group(
                "g2",
                1,
                "1.0",
                vec![inactive_rule, fixed_rule("r3", 1, "7", Condition::empty())],
            ),
        ];
        let summary = evaluate_listing(&rs, &Context::new());
        assert_eq!(summary.total_adjustment, dec("7"));
        assert_eq!(summary.matched_rules_count, 1);
    }

    #[test]
    fn rules_run_in_evaluation_order_with_id_tiebreak() {
        let mut rs = ruleset("rs", 0, "2025-01-01T00:00:00Z", Condition::empty());
        rs.groups = vec![group(
            "g1",
            0,
            "1.0",
            vec![
                fixed_rule("r_b", 1, "2", Condition::empty()),
                fixed_rule("r_a", 1, "3", Condition::empty()),
                fixed_rule("r_c", 0, "1", Condition::empty()),
            ],
        )];
        let summary = evaluate_listing(&rs, &Context::new());
        let order: Vec<&str> = summary
            .matched_rules
            .iter()
            .map(|r| r.rule_id.as_str())
            .collect();
        assert_eq!(order, vec!["r_c", "r_a", "r_b"]);
    }

    #[test]
    fn per_rule_failure_does_not_abort_walk() {
        let mut rs = ruleset("rs", 0, "2025-01-01T00:00:00Z", Condition::empty());
        let mut failing = fixed_rule("r1", 0, "0", Condition::empty());
        failing.actions = vec![Action {
            kind: ActionKind::PerUnit,
            metric: Some("ram_gb".to_string()),
            value_usd: dec("2.5"),
            formula: None,
            modifiers: Modifiers::default(),
            display_order: 0,
        }];
        rs.groups = vec![group(
            "g1",
            0,
            "1.0",
            vec![failing, fixed_rule("r2", 1, "5", Condition::empty())],
        )];
        // Context lacks ram_gb: r1 fails, r2 still contributes
        let summary = evaluate_listing(&rs, &Context::new());
        assert_eq!(summary.total_adjustment, dec("5"));
        assert_eq!(summary.matched_rules.len(), 2);
        let failed = &summary.matched_rules[0];
        assert_eq!(failed.rule_id, "r1");
        assert!(failed.error.as_deref().unwrap().contains("ram_gb"));
        assert_eq!(failed.adjustment_value, Decimal::ZERO);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let mut rs = ruleset("rs", 0, "2025-01-01T00:00:00Z", Condition::empty());
        rs.groups = vec![group(
            "g1",
            0,
            "1.0",
            vec![fixed_rule("r1", 0, "-20", used_condition())],
        )];
        let c = ctx(serde_json::json!({ "condition": "used", "price_usd": 300 }));
        let first = evaluate_listing(&rs, &c);
        let second = evaluate_listing(&rs, &c);
        assert_eq!(first, second);
    }

    #[test]
    fn adjusted_price_adds_total() {
        let summary = EvaluationSummary {
            total_adjustment: dec("-20"),
            matched_rules_count: 1,
            matched_rules: vec![],
        };
        assert_eq!(summary.adjusted_price(dec("300")), dec("280"));
    }
}
