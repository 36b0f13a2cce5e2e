//! Sandboxed formula interpreter.
//!
//! Walks the expression AST from `appraise-core` against a listing
//! context. The function set is closed, every arithmetic step is checked,
//! and evaluation runs under a step budget — formulas come from rule
//! authors and are treated as untrusted input. There is no delegation to
//! any host evaluation facility.
//!
//! All arithmetic uses `rust_decimal::Decimal` with
//! `RoundingStrategy::MidpointNearestEven`. No `f64` anywhere in the
//! evaluation path.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use appraise_core::ast::{BinOp, Expr, Func};

use crate::context::Context;
use crate::error::RuntimeError;
use crate::trace::TraceCollector;
use crate::value::Value;

/// Evaluation step budget. Far above anything a legitimate pricing
/// formula needs, low enough to cut off pathological expressions.
pub const MAX_STEPS: u32 = 4096;

/// Intermediate value inside a formula. Only numbers may escape as the
/// formula's result; text and booleans exist for conditions inside the
/// `A if COND else B` form.
#[derive(Debug, Clone, PartialEq)]
enum FValue {
    Number(Decimal),
    Text(String),
    Bool(bool),
}

impl FValue {
    fn type_name(&self) -> &'static str {
        match self {
            FValue::Number(_) => "number",
            FValue::Text(_) => "text",
            FValue::Bool(_) => "boolean",
        }
    }

    fn as_number(&self) -> Result<Decimal, RuntimeError> {
        match self {
            FValue::Number(d) => Ok(*d),
            other => Err(RuntimeError::TypeMismatch {
                message: format!("expected a number, got {}", other.type_name()),
            }),
        }
    }

    fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            FValue::Bool(b) => Ok(*b),
            other => Err(RuntimeError::TypeMismatch {
                message: format!("expected a boolean, got {}", other.type_name()),
            }),
        }
    }
}

/// Evaluate a formula to its numeric result.
///
/// Fails on unknown identifiers, type mismatches, division by zero,
/// overflow, or step budget exhaustion. Field accesses are recorded into
/// the collector.
pub fn evaluate(
    expr: &Expr,
    ctx: &Context,
    collector: &mut TraceCollector,
) -> Result<Decimal, RuntimeError> {
    let mut steps = 0u32;
    let result = eval_expr(expr, ctx, collector, &mut steps)?;
    result.as_number().map_err(|_| RuntimeError::TypeMismatch {
        message: format!(
            "formula must yield a number, got {}",
            result.type_name()
        ),
    })
}

fn eval_expr(
    expr: &Expr,
    ctx: &Context,
    collector: &mut TraceCollector,
    steps: &mut u32,
) -> Result<FValue, RuntimeError> {
    *steps += 1;
    if *steps > MAX_STEPS {
        return Err(RuntimeError::BudgetExceeded);
    }

    match expr {
        Expr::Number(d) => Ok(FValue::Number(*d)),
        Expr::Str(s) => Ok(FValue::Text(s.clone())),
        Expr::Bool(b) => Ok(FValue::Bool(*b)),

        Expr::Field(path) => {
            collector.record_field(path);
            let value = ctx
                .get(path)
                .ok_or_else(|| RuntimeError::UnknownField { name: path.clone() })?;
            match value {
                Value::Int(i) => Ok(FValue::Number(Decimal::from(*i))),
                Value::Decimal(d) => Ok(FValue::Number(*d)),
                Value::Text(s) => Ok(FValue::Text(s.clone())),
                Value::Bool(b) => Ok(FValue::Bool(*b)),
                other => Err(RuntimeError::TypeMismatch {
                    message: format!("field '{}' is not a scalar ({})", path, other.type_name()),
                }),
            }
        }

        Expr::Neg(inner) => {
            let v = eval_expr(inner, ctx, collector, steps)?.as_number()?;
            Ok(FValue::Number(-v))
        }

        Expr::Not(inner) => {
            let b = eval_expr(inner, ctx, collector, steps)?.as_bool()?;
            Ok(FValue::Bool(!b))
        }

        Expr::Binary { op, left, right } => match op {
            BinOp::And => {
                let l = eval_expr(left, ctx, collector, steps)?.as_bool()?;
                if !l {
                    // Short-circuit: right side not evaluated
                    return Ok(FValue::Bool(false));
                }
                let r = eval_expr(right, ctx, collector, steps)?.as_bool()?;
                Ok(FValue::Bool(r))
            }
            BinOp::Or => {
                let l = eval_expr(left, ctx, collector, steps)?.as_bool()?;
                if l {
                    return Ok(FValue::Bool(true));
                }
                let r = eval_expr(right, ctx, collector, steps)?.as_bool()?;
                Ok(FValue::Bool(r))
            }
            _ => {
                let l = eval_expr(left, ctx, collector, steps)?;
                let r = eval_expr(right, ctx, collector, steps)?;
                if op.is_comparison() {
                    compare(*op, &l, &r)
                } else {
                    arithmetic(*op, l.as_number()?, r.as_number()?)
                }
            }
        },

        Expr::Conditional {
            then,
            cond,
            otherwise,
        } => {
            let c = eval_expr(cond, ctx, collector, steps)?.as_bool()?;
            if c {
                eval_expr(then, ctx, collector, steps)
            } else {
                eval_expr(otherwise, ctx, collector, steps)
            }
        }

        Expr::Call { func, args } => {
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(eval_expr(a, ctx, collector, steps)?.as_number()?);
            }
            apply_func(*func, &values)
        }
    }
}

fn arithmetic(op: BinOp, l: Decimal, r: Decimal) -> Result<FValue, RuntimeError> {
    let result = match op {
        BinOp::Add => l.checked_add(r),
        BinOp::Sub => l.checked_sub(r),
        BinOp::Mul => l.checked_mul(r),
        BinOp::Div => {
            if r.is_zero() {
                return Err(RuntimeError::DivisionByZero);
            }
            l.checked_div(r)
        }
        other => {
            return Err(RuntimeError::TypeMismatch {
                message: format!("'{}' is not an arithmetic operator", other.symbol()),
            });
        }
    };
    result.map(FValue::Number).ok_or_else(|| RuntimeError::Overflow {
        message: format!("{} {} {}", l, op.symbol(), r),
    })
}

fn compare(op: BinOp, l: &FValue, r: &FValue) -> Result<FValue, RuntimeError> {
    let result = match (l, r) {
        (FValue::Number(a), FValue::Number(b)) => match op {
            BinOp::Eq => a == b,
            BinOp::Neq => a != b,
            BinOp::Lt => a < b,
            BinOp::Lte => a <= b,
            BinOp::Gt => a > b,
            BinOp::Gte => a >= b,
            _ => unreachable!("compare called with non-comparison op"),
        },
        // Text and booleans support equality only
        (FValue::Text(a), FValue::Text(b)) => match op {
            BinOp::Eq => a == b,
            BinOp::Neq => a != b,
            _ => {
                return Err(RuntimeError::TypeMismatch {
                    message: format!("'{}' is not defined for text", op.symbol()),
                });
            }
        },
        (FValue::Bool(a), FValue::Bool(b)) => match op {
            BinOp::Eq => a == b,
            BinOp::Neq => a != b,
            _ => {
                return Err(RuntimeError::TypeMismatch {
                    message: format!("'{}' is not defined for booleans", op.symbol()),
                });
            }
        },
        _ => {
            return Err(RuntimeError::TypeMismatch {
                message: format!("cannot compare {} with {}", l.type_name(), r.type_name()),
            });
        }
    };
    Ok(FValue::Bool(result))
}

fn apply_func(func: Func, args: &[Decimal]) -> Result<FValue, RuntimeError> {
    match func {
        Func::Max => {
            let mut best = args[0];
            for v in &args[1..] {
                if *v > best {
                    best = *v;
                }
            }
            Ok(FValue::Number(best))
        }
        Func::Min => {
            let mut best = args[0];
            for v in &args[1..] {
                if *v < best {
                    best = *v;
                }
            }
            Ok(FValue::Number(best))
        }
        Func::Round => {
            let digits = if args.len() == 2 {
                let d = args[1];
                if d.fract() != Decimal::ZERO || d.is_sign_negative() || d > Decimal::from(28) {
                    return Err(RuntimeError::TypeMismatch {
                        message: format!(
                            "round() digit count must be an integer in 0..=28, got {}",
                            d
                        ),
                    });
                }
                d.to_u32().unwrap_or(0)
            } else {
                0
            };
            Ok(FValue::Number(args[0].round_dp_with_strategy(
                digits,
                RoundingStrategy::MidpointNearestEven,
            )))
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
