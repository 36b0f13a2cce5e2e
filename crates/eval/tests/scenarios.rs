//! End-to-end scenarios: definitions loaded from JSON, contexts built
//! from listing records, full selection + evaluation.

use rust_decimal::Decimal;
use std::str::FromStr;

use appraise_eval::{
    apply_batch, build_context, evaluate, preview_rule, validate_definitions, CandidateRule,
    Context, InMemoryPool, PoolEntry, Ruleset,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn load_rulesets(json: serde_json::Value) -> Vec<Ruleset> {
    let rulesets: Vec<Ruleset> = serde_json::from_value(json).unwrap();
    validate_definitions(&rulesets).unwrap();
    rulesets
}

fn single_rule_ruleset(rule: serde_json::Value) -> Vec<Ruleset> {
    load_rulesets(serde_json::json!([{
        "id": "rs-default",
        "name": "default",
        "created_at": "2025-01-01T00:00:00Z",
        "groups": [{
            "id": "g-main",
            "category": "general",
            "display_order": 0,
            "rules": [rule]
        }]
    }]))
}

/// Scenario A: used-condition discount.
#[test]
fn scenario_a_fixed_discount_on_used_listing() {
    let rulesets = single_rule_ruleset(serde_json::json!({
        "id": "r-used",
        "name": "used discount",
        "condition": {
            "field_name": "condition",
            "field_type": "text",
            "operator": "eq",
            "value": "used"
        },
        "actions": [{ "action_type": "fixed_value", "value_usd": "-20" }]
    }));

    let listing = serde_json::json!({ "condition": "used", "price_usd": 300 });
    let ctx = build_context(&listing, &[]);
    let summary = evaluate(&rulesets, None, &ctx).unwrap();

    assert_eq!(summary.matched_rules_count, 1);
    assert_eq!(summary.total_adjustment, dec("-20"));
    assert_eq!(summary.adjusted_price(dec("300")), dec("280"));
}

/// Scenario B: per-unit RAM pricing.
#[test]
fn scenario_b_per_unit_ram_adjustment() {
    let rulesets = single_rule_ruleset(serde_json::json!({
        "id": "r-ram",
        "name": "ram premium",
        "condition": {
            "field_name": "ram_gb",
            "field_type": "number",
            "operator": "gte",
            "value": 16
        },
        "actions": [{ "action_type": "per_unit", "metric": "ram_gb", "value_usd": "2.5" }]
    }));

    let ctx = build_context(&serde_json::json!({ "ram_gb": 32 }), &[]);
    let summary = evaluate(&rulesets, None, &ctx).unwrap();
    assert_eq!(summary.total_adjustment, dec("80.0"));
}

/// Scenario C: formula floor.
#[test]
fn scenario_c_formula_floor_applies() {
    let rulesets = single_rule_ruleset(serde_json::json!({
        "id": "r-formula",
        "name": "ram formula",
        "actions": [{ "action_type": "formula", "formula": "max(ram_gb * 2.5, 50)" }]
    }));

    let ctx = build_context(&serde_json::json!({ "ram_gb": 8 }), &[]);
    let summary = evaluate(&rulesets, None, &ctx).unwrap();
    assert_eq!(summary.total_adjustment, dec("50"));
}

/// Scenario D: batch with two listings referencing an invalid CPU id.
#[test]
fn scenario_d_batch_isolates_bad_catalog_references() {
    let rulesets = single_rule_ruleset(serde_json::json!({
        "id": "r-flat",
        "name": "flat",
        "actions": [{ "action_type": "fixed_value", "value_usd": "-5" }]
    }));

    let listings: Vec<serde_json::Value> = (0..10)
        .map(|i| {
            if i == 2 || i == 6 {
                serde_json::json!({ "id": format!("l{}", i), "cpu_id": "cpu-missing" })
            } else {
                serde_json::json!({ "id": format!("l{}", i), "price_usd": 100 + i })
            }
        })
        .collect();

    let report = apply_batch(&rulesets, &listings, |listing| {
        if listing.get("cpu_id").and_then(|v| v.as_str()) == Some("cpu-missing") {
            Err("unknown cpu_id 'cpu-missing'".to_string())
        } else {
            Ok(Context::from_json(listing))
        }
    });

    assert_eq!(report.succeeded, 8);
    assert_eq!(report.failed, 2);
    let ids: Vec<&str> = report.errors.iter().map(|e| e.listing_id.as_str()).collect();
    assert_eq!(ids, vec!["l2", "l6"]);
}

/// A ruleset with an empty condition tree matches every listing.
#[test]
fn empty_condition_tree_is_vacuous_match() {
    let rulesets = load_rulesets(serde_json::json!([{
        "id": "rs-unrestricted",
        "name": "unrestricted",
        "created_at": "2025-01-01T00:00:00Z",
        "condition": { "logical_operator": "AND", "children": [] },
        "groups": []
    }]));

    let selected = appraise_eval::select_ruleset(&rulesets, None, &Context::new()).unwrap();
    assert_eq!(selected.id, "rs-unrestricted");
}

/// Definitions with invariant violations are rejected before any
/// evaluation happens.
#[test]
fn invalid_definitions_are_rejected_at_load() {
    let rulesets: Vec<Ruleset> = serde_json::from_value(serde_json::json!([{
        "id": "rs",
        "name": "bad",
        "created_at": "2025-01-01T00:00:00Z",
        "groups": [{
            "id": "g",
            "category": "general",
            "display_order": 0,
            "rules": [{
                "id": "r",
                "name": "per-unit without metric",
                "actions": [
                    { "action_type": "per_unit", "value_usd": "2.5" },
                    { "action_type": "fixed_value", "value_usd": "1",
                      "modifiers": { "min_usd": "10", "max_usd": "50" } }
                ]
            }]
        }]
    }]))
    .unwrap();

    let errors = validate_definitions(&rulesets).unwrap_err();
    assert_eq!(errors.len(), 2);
}

/// Selection and evaluation are deterministic across repeated calls.
#[test]
fn identical_inputs_yield_identical_results() {
    let rulesets = load_rulesets(serde_json::json!([
        {
            "id": "rs-b",
            "name": "b",
            "priority": 1,
            "created_at": "2025-02-01T00:00:00Z",
            "groups": [{
                "id": "g",
                "category": "general",
                "display_order": 0,
                "rules": [{
                    "id": "r",
                    "name": "flat",
                    "actions": [{ "action_type": "fixed_value", "value_usd": "-7" }]
                }]
            }]
        },
        {
            "id": "rs-a",
            "name": "a",
            "priority": 1,
            "created_at": "2025-02-01T00:00:00Z",
            "groups": []
        }
    ]));

    let ctx = build_context(&serde_json::json!({ "condition": "used" }), &[]);
    let first = evaluate(&rulesets, None, &ctx).unwrap();
    for _ in 0..5 {
        assert_eq!(evaluate(&rulesets, None, &ctx).unwrap(), first);
    }
    // Tie on (priority, created_at) broke on id: rs-a wins and has no rules
    assert_eq!(first.matched_rules_count, 0);
}

/// Group weight scales the contribution of its rules.
#[test]
fn weighted_group_scales_adjustment() {
    let rulesets = load_rulesets(serde_json::json!([{
        "id": "rs",
        "name": "weighted",
        "created_at": "2025-01-01T00:00:00Z",
        "groups": [{
            "id": "g",
            "category": "cosmetic",
            "display_order": 0,
            "weight": "0.5",
            "rules": [{
                "id": "r",
                "name": "scratch discount",
                "actions": [{ "action_type": "fixed_value", "value_usd": "-30" }]
            }]
        }]
    }]));

    let summary = evaluate(&rulesets, None, &Context::new()).unwrap();
    assert_eq!(summary.total_adjustment, dec("-15.0"));
}

/// Preview over a pool built from listing JSON, with modifiers in play.
#[test]
fn preview_candidate_with_clamp() {
    let candidate: CandidateRule = serde_json::from_value(serde_json::json!({
        "condition": {
            "field_name": "condition",
            "field_type": "text",
            "operator": "in",
            "value": ["used", "refurbished"]
        },
        "actions": [{
            "action_type": "formula",
            "formula": "-0.1 * price_usd",
            "modifiers": { "clamp": true, "min_usd": "-40" }
        }]
    }))
    .unwrap();

    let pool = InMemoryPool::new(
        [
            ("l1", serde_json::json!({ "condition": "used", "price_usd": 200 })),
            ("l2", serde_json::json!({ "condition": "used", "price_usd": 1000 })),
            ("l3", serde_json::json!({ "condition": "new", "price_usd": 500 })),
        ]
        .into_iter()
        .map(|(id, json)| PoolEntry {
            listing_id: id.to_string(),
            category: Some("laptop".to_string()),
            context: Context::from_json(&json),
        })
        .collect(),
    );

    let result = preview_rule(&candidate, &pool, 10, None);
    assert_eq!(result.evaluated_count, 3);
    assert_eq!(result.matched_count, 2);
    // l1: -20; l2: -100 clamped to -40
    assert_eq!(result.total_adjustment, dec("-60.0"));
    assert_eq!(result.min_adjustment, Some(dec("-40")));
    assert_eq!(result.max_adjustment, Some(dec("-20.0")));
    assert_eq!(result.non_matched_sample.len(), 1);
    assert_eq!(result.non_matched_sample[0].listing_id, "l3");
}

/// Relation dot-paths work through a context built from joined records.
#[test]
fn joined_catalog_relations_resolve_via_dot_paths() {
    let rulesets = single_rule_ruleset(serde_json::json!({
        "id": "r-ddr5",
        "name": "ddr5 premium",
        "condition": {
            "field_name": "ram_spec.ddr_generation",
            "field_type": "text",
            "operator": "eq",
            "value": "ddr5"
        },
        "actions": [{ "action_type": "fixed_value", "value_usd": "25" }]
    }));

    let listing = serde_json::json!({ "price_usd": 900 });
    let ram = serde_json::json!({ "ddr_generation": "ddr5", "capacity_gb": 32 });
    let ctx = build_context(&listing, &[("ram_spec", Some(&ram)), ("gpu_spec", None)]);

    let summary = evaluate(&rulesets, None, &ctx).unwrap();
    assert_eq!(summary.total_adjustment, dec("25"));

    // Without the relation the same rule is a clean non-match
    let bare = build_context(&listing, &[]);
    let summary = evaluate(&rulesets, None, &bare).unwrap();
    assert_eq!(summary.matched_rules_count, 0);
}
