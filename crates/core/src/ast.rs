//! Formula expression AST.
//!
//! The tree produced by the parser and consumed by the evaluator. It is a
//! closed vocabulary: arithmetic, comparisons, boolean connectives, the
//! `A if COND else B` conditional, a fixed set of builtin functions, and
//! dot-path field references resolved against an evaluation context.

use rust_decimal::Decimal;

/// Binary operators, grouped by precedence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

impl BinOp {
    /// Symbol used in error messages.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Lte => "<=",
            BinOp::Gt => ">",
            BinOp::Gte => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte
        )
    }
}

/// The closed builtin function set. Formulas cannot call anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Max,
    Min,
    Round,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Func> {
        match name {
            "max" => Some(Func::Max),
            "min" => Some(Func::Min),
            "round" => Some(Func::Round),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Func::Max => "max",
            Func::Min => "min",
            Func::Round => "round",
        }
    }

    /// Check an argument count against the function's accepted arity.
    /// `max`/`min` take one or more arguments; `round` takes one or two.
    pub fn accepts_arity(&self, n: usize) -> bool {
        match self {
            Func::Max | Func::Min => n >= 1,
            Func::Round => n == 1 || n == 2,
        }
    }

    /// Human-readable arity description for diagnostics.
    pub fn arity_hint(&self) -> &'static str {
        match self {
            Func::Max | Func::Min => "at least 1 argument",
            Func::Round => "1 or 2 arguments",
        }
    }
}

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Decimal),
    Str(String),
    Bool(bool),
    /// Dot-path field reference, e.g. `ram_spec.ddr_generation`.
    Field(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `then if cond else otherwise` (conditional expression).
    Conditional {
        then: Box<Expr>,
        cond: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        func: Func,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Collect every field path referenced by the expression, deduplicated,
    /// in first-use order.
    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            Expr::Field(path) => {
                if !out.iter().any(|p| p == path) {
                    out.push(path.clone());
                }
            }
            Expr::Neg(e) | Expr::Not(e) => e.collect_fields(out),
            Expr::Binary { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Expr::Conditional {
                then,
                cond,
                otherwise,
            } => {
                then.collect_fields(out);
                cond.collect_fields(out);
                otherwise.collect_fields(out);
            }
            Expr::Call { args, .. } => {
                for a in args {
                    a.collect_fields(out);
                }
            }
            Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) => {}
        }
    }

    /// Whether the expression yields a boolean at its root. Used by
    /// validation to flag formulas that compute a truth value where an
    /// amount is expected.
    pub fn yields_boolean(&self) -> bool {
        match self {
            Expr::Bool(_) | Expr::Not(_) => true,
            Expr::Binary { op, .. } => {
                op.is_comparison() || matches!(op, BinOp::And | BinOp::Or)
            }
            Expr::Conditional {
                then, otherwise, ..
            } => then.yields_boolean() && otherwise.yields_boolean(),
            _ => false,
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
