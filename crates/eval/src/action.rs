//! Action computation and modifier composition.
//!
//! For one matched rule, actions run in `display_order` and their
//! results sum into a single signed USD adjustment. Each action computes
//! a base amount, then its modifiers apply in fixed order: field
//! multipliers, the legacy condition map, the clamp.

use rust_decimal::Decimal;

use appraise_core::parse;

use crate::context::Context;
use crate::error::{ActionError, RuntimeError};
use crate::interp;
use crate::model::{Action, ActionKind, Modifier};
use crate::trace::TraceCollector;

/// Context key the legacy condition→multiplier map is matched against.
const CONDITION_FIELD: &str = "condition";

/// Compute the signed USD adjustment contributed by a matched rule's
/// action list. Field reads and fired modifiers are recorded into the
/// collector.
pub fn compute_adjustment(
    actions: &[Action],
    ctx: &Context,
    collector: &mut TraceCollector,
) -> Result<Decimal, ActionError> {
    let mut ordered: Vec<&Action> = actions.iter().collect();
    ordered.sort_by_key(|a| a.display_order);

    let mut total = Decimal::ZERO;
    for action in ordered {
        let base = base_amount(action, ctx, collector)?;
        let adjusted = apply_modifiers(base, action, ctx, collector)?;
        total = total
            .checked_add(adjusted)
            .ok_or(RuntimeError::Overflow {
                message: "action sum overflow".to_string(),
            })
            .map_err(ActionError::Formula)?;
    }
    Ok(total)
}

fn base_amount(
    action: &Action,
    ctx: &Context,
    collector: &mut TraceCollector,
) -> Result<Decimal, ActionError> {
    match action.kind {
        ActionKind::FixedValue => Ok(action.value_usd),

        ActionKind::PerUnit => {
            // Validation guarantees the metric is declared; its absence
            // from this particular context is a per-rule failure.
            let metric = action.metric.as_deref().unwrap_or_default();
            collector.record_field(metric);
            let value = ctx.get(metric).ok_or_else(|| ActionError::MissingMetric {
                metric: metric.to_string(),
            })?;
            let units = value.as_number().ok_or_else(|| {
                ActionError::Formula(RuntimeError::TypeMismatch {
                    message: format!(
                        "metric '{}' is not numeric ({})",
                        metric,
                        value.type_name()
                    ),
                })
            })?;
            units
                .checked_mul(action.value_usd)
                .ok_or(ActionError::Formula(RuntimeError::Overflow {
                    message: format!("{} * {}", units, action.value_usd),
                }))
        }

        ActionKind::Formula => {
            let Some(formula) = action.formula.as_deref().filter(|f| !f.trim().is_empty())
            else {
                // Empty formula falls back to the action's fixed value
                return Ok(action.value_usd);
            };
            let expr = parse(formula).map_err(|e| ActionError::BadFormula(e.to_string()))?;
            interp::evaluate(&expr, ctx, collector).map_err(ActionError::Formula)
        }
    }
}

fn apply_modifiers(
    base: Decimal,
    action: &Action,
    ctx: &Context,
    collector: &mut TraceCollector,
) -> Result<Decimal, ActionError> {
    let mut amount = base;
    for modifier in action.modifiers.normalized() {
        match modifier {
            Modifier::FieldMultiplier(spec) => {
                collector.record_field(&spec.field);
                let Some(actual) = ctx.get(&spec.field).and_then(|v| v.render()) else {
                    continue; // identity
                };
                // First matching case wins; no match is identity, never zero
                if let Some(case) = spec
                    .cases
                    .iter()
                    .find(|c| c.value.eq_ignore_ascii_case(&actual))
                {
                    amount = mul_checked(amount, case.multiplier)?;
                    collector.record_modifier(format!(
                        "multiplier:{}={}",
                        spec.field, case.value
                    ));
                }
            }

            Modifier::ConditionMultiplier(table) => {
                collector.record_field(CONDITION_FIELD);
                let Some(actual) = ctx.get(CONDITION_FIELD).and_then(|v| v.render()) else {
                    continue;
                };
                if let Some((key, factor)) = table
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&actual))
                {
                    amount = mul_checked(amount, *factor)?;
                    collector.record_modifier(format!("condition_multiplier:{}", key));
                }
            }

            Modifier::Clamp { min_usd, max_usd } => {
                if let Some(min) = min_usd {
                    if amount < min {
                        amount = min;
                        collector.record_modifier("clamp:min");
                    }
                }
                if let Some(max) = max_usd {
                    if amount > max {
                        amount = max;
                        collector.record_modifier("clamp:max");
                    }
                }
            }
        }
    }
    Ok(amount)
}

fn mul_checked(amount: Decimal, factor: Decimal) -> Result<Decimal, ActionError> {
    amount
        .checked_mul(factor)
        .ok_or(ActionError::Formula(RuntimeError::Overflow {
            message: format!("{} * {}", amount, factor),
        }))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
