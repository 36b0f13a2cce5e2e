//! Recursive-descent parser for pricing formulas.
//!
//! Precedence, loosest binding first: conditional (`A if COND else B`),
//! `or`, `and`, `not`, comparison, additive, multiplicative, unary minus.
//! Comparison does not chain; `a < b < c` is a parse error.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::ast::{BinOp, Expr, Func};
use crate::error::ParseError;
use crate::lexer::{lex, Spanned, Token};

/// Parse a formula into an expression tree.
pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = lex(src)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let expr = parser.parse_expr()?;
    if parser.peek() != &Token::Eof {
        return Err(parser.err(format!("unexpected trailing {}", parser.describe_peek())));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn cur_pos(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(s) if s == w)
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(self.cur_pos(), message)
    }

    fn describe_peek(&self) -> String {
        match self.peek() {
            Token::Word(w) => format!("'{}'", w),
            Token::Str(_) => "string literal".to_string(),
            Token::Number(n) => format!("'{}'", n),
            Token::Eof => "end of formula".to_string(),
            other => format!("{:?}", other),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        if self.peek() != &Token::RParen {
            return Err(self.err(format!("expected ')', got {}", self.describe_peek())));
        }
        self.advance();
        Ok(())
    }

    // -- Expression parsing --------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let then = self.parse_or_expr()?;
        if !self.is_word("if") {
            return Ok(then);
        }
        self.advance();
        let cond = self.parse_or_expr()?;
        if !self.is_word("else") {
            return Err(self.err(format!(
                "expected 'else' in conditional, got {}",
                self.describe_peek()
            )));
        }
        self.advance();
        // Right-associative: `a if c1 else b if c2 else d`
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional {
            then: Box::new(then),
            cond: Box::new(cond),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.is_word("or") {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expr()?;
        while self.is_word("and") {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.is_word("not") {
            self.advance();
            let e = self.parse_not_expr()?;
            return Ok(Expr::Not(Box::new(e)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Token::EqEq => BinOp::Eq,
            Token::Neq => BinOp::Neq,
            Token::Lt => BinOp::Lt,
            Token::Lte => BinOp::Lte,
            Token::Gt => BinOp::Gt,
            Token::Gte => BinOp::Gte,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        let cmp = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        // Reject chained comparison rather than mis-parse it
        if matches!(
            self.peek(),
            Token::EqEq | Token::Neq | Token::Lt | Token::Lte | Token::Gt | Token::Gte
        ) {
            return Err(self.err("chained comparison is not supported"));
        }
        Ok(cmp)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == &Token::Minus {
            self.advance();
            let e = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(e)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Number(s) => {
                let pos = self.cur_pos();
                self.advance();
                let d = Decimal::from_str(&s)
                    .map_err(|_| ParseError::at(pos, format!("invalid number '{}'", s)))?;
                Ok(Expr::Number(d))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Word(w) if w == "true" => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::Word(w) if w == "false" => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Word(w) if w == "if" || w == "else" || w == "and" || w == "or" || w == "not" => {
                Err(self.err(format!("unexpected keyword '{}'", w)))
            }
            Token::Word(w) => {
                let pos = self.cur_pos();
                self.advance();
                if self.peek() == &Token::LParen {
                    self.advance();
                    let func = Func::from_name(&w).ok_or_else(|| {
                        ParseError::at(pos, format!("unknown function '{}'", w))
                    })?;
                    let args = self.parse_args()?;
                    if !func.accepts_arity(args.len()) {
                        return Err(ParseError::at(
                            pos,
                            format!(
                                "{}() takes {}, got {}",
                                func.name(),
                                func.arity_hint(),
                                args.len()
                            ),
                        ));
                    }
                    Ok(Expr::Call { func, args })
                } else {
                    Ok(Expr::Field(w))
                }
            }
            Token::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect_rparen()?;
                Ok(e)
            }
            _ => Err(self.err(format!("expected a value, got {}", self.describe_peek()))),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.peek() == &Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.peek() {
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => {
                    return Err(self.err(format!(
                        "expected ',' or ')' in argument list, got {}",
                        self.describe_peek()
                    )))
                }
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parse_number() {
        assert_eq!(parse("2.5").unwrap(), Expr::Number(dec("2.5")));
    }

    #[test]
    fn parse_precedence_mul_over_add() {
        // a + b * c  =>  a + (b * c)
        let e = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            e,
            Expr::Binary {
                op: BinOp::Add,
                left: Box::new(Expr::Number(dec("1"))),
                right: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    left: Box::new(Expr::Number(dec("2"))),
                    right: Box::new(Expr::Number(dec("3"))),
                }),
            }
        );
    }

    #[test]
    fn parse_parens_override_precedence() {
        let e = parse("(1 + 2) * 3").unwrap();
        match e {
            Expr::Binary { op: BinOp::Mul, .. } => {}
            other => panic!("expected Mul at root, got {:?}", other),
        }
    }

    #[test]
    fn parse_call() {
        let e = parse("max(ram_gb * 2.5, 50)").unwrap();
        match e {
            Expr::Call {
                func: Func::Max,
                args,
            } => assert_eq!(args.len(), 2),
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn parse_unknown_function_rejected() {
        let err = parse("eval(1)").unwrap_err();
        assert!(err.message.contains("unknown function 'eval'"));
        assert_eq!(err.position, Some(0));
    }

    #[test]
    fn parse_round_arity_enforced() {
        assert!(parse("round(1.5)").is_ok());
        assert!(parse("round(1.5, 2)").is_ok());
        let err = parse("round(1, 2, 3)").unwrap_err();
        assert!(err.message.contains("round()"));
    }

    #[test]
    fn parse_conditional() {
        let e = parse("a * 2 if condition == 'used' else a").unwrap();
        match e {
            Expr::Conditional { cond, .. } => match *cond {
                Expr::Binary { op: BinOp::Eq, .. } => {}
                other => panic!("expected Eq condition, got {:?}", other),
            },
            other => panic!("expected Conditional, got {:?}", other),
        }
    }

    #[test]
    fn parse_conditional_right_associative() {
        let e = parse("1 if a > 1 else 2 if b > 2 else 3").unwrap();
        match e {
            Expr::Conditional { otherwise, .. } => {
                assert!(matches!(*otherwise, Expr::Conditional { .. }));
            }
            other => panic!("expected Conditional, got {:?}", other),
        }
    }

    #[test]
    fn parse_conditional_missing_else() {
        let err = parse("1 if a > 2").unwrap_err();
        assert!(err.message.contains("expected 'else'"));
    }

    #[test]
    fn parse_and_or_not() {
        let e = parse("10 if a > 1 and not b == 2 or c < 3 else 0").unwrap();
        match e {
            Expr::Conditional { cond, .. } => match *cond {
                Expr::Binary { op: BinOp::Or, .. } => {}
                other => panic!("expected Or at condition root, got {:?}", other),
            },
            other => panic!("expected Conditional, got {:?}", other),
        }
    }

    #[test]
    fn parse_unary_minus() {
        let e = parse("-price_usd * 0.1").unwrap();
        match e {
            Expr::Binary {
                op: BinOp::Mul,
                left,
                ..
            } => assert!(matches!(*left, Expr::Neg(_))),
            other => panic!("expected Mul, got {:?}", other),
        }
    }

    #[test]
    fn parse_chained_comparison_rejected() {
        let err = parse("1 < a < 3").unwrap_err();
        assert!(err.message.contains("chained comparison"));
    }

    #[test]
    fn parse_trailing_garbage_rejected() {
        let err = parse("1 + 2 3").unwrap_err();
        assert!(err.message.contains("unexpected trailing"));
        assert_eq!(err.position, Some(6));
    }

    #[test]
    fn parse_dotted_field() {
        assert_eq!(
            parse("cpu_spec.cores").unwrap(),
            Expr::Field("cpu_spec.cores".to_string())
        );
    }

    #[test]
    fn parse_empty_input_errors() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }
}
