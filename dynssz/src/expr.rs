//! Arithmetic expressions over spec names, as they appear in dynamic size
//! annotations: `SLOTS_PER_HISTORICAL_ROOT`, `EPOCHS_PER_ETH1_VOTING_PERIOD * 64`,
//! `(BYTES_PER_LOGS_BLOOM + 31) / 32`.
//!
//! Grammar (whitespace-insensitive, standard precedence, left-associative):
//!
//! ```text
//! expr   := term (('+'|'-') term)*
//! term   := factor (('*'|'/') factor)*
//! factor := number | ident | '(' expr ')'
//! ```

use crate::spec::SpecRegistry;
use thiserror::Error;

/// Failures of expression parsing or evaluation. Converted to public
/// [`ErrorKind`](crate::ErrorKind)s by the tag parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum EvalError {
    #[error("unknown spec value `{0}`")]
    UnknownSpec(String),
    #[error("parse error at byte {at}: {msg}")]
    Parse { at: usize, msg: &'static str },
    #[error("division by zero")]
    DivideByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A parsed size expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SizeExpr {
    Literal(u64),
    Spec(String),
    Binary {
        op: BinOp,
        lhs: Box<SizeExpr>,
        rhs: Box<SizeExpr>,
    },
}

impl SizeExpr {
    /// Parses `input` fully; trailing garbage is a parse error.
    pub(crate) fn parse(input: &str) -> Result<Self, EvalError> {
        let mut parser = Parser {
            bytes: input.as_bytes(),
            pos: 0,
        };
        let expr = parser.expr()?;
        parser.skip_whitespace();
        if parser.pos != parser.bytes.len() {
            return Err(EvalError::Parse {
                at: parser.pos,
                msg: "unexpected trailing input",
            });
        }
        Ok(expr)
    }

    /// Evaluates the tree against `specs` with checked `u64` arithmetic.
    /// Any underflow surfaces as [`EvalError::Overflow`].
    pub(crate) fn eval(&self, specs: &SpecRegistry) -> Result<u64, EvalError> {
        match self {
            Self::Literal(value) => Ok(*value),
            Self::Spec(name) => specs
                .lookup(name)
                .ok_or_else(|| EvalError::UnknownSpec(name.clone())),
            Self::Binary { op, lhs, rhs } => {
                let lhs = lhs.eval(specs)?;
                let rhs = rhs.eval(specs)?;
                match op {
                    BinOp::Add => lhs.checked_add(rhs).ok_or(EvalError::Overflow),
                    BinOp::Sub => lhs.checked_sub(rhs).ok_or(EvalError::Overflow),
                    BinOp::Mul => lhs.checked_mul(rhs).ok_or(EvalError::Overflow),
                    BinOp::Div => {
                        if rhs == 0 {
                            Err(EvalError::DivideByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                }
            }
        }
    }

    /// Parses and evaluates in one step.
    pub(crate) fn resolve(input: &str, specs: &SpecRegistry) -> Result<u64, EvalError> {
        Self::parse(input)?.eval(specs)
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.bytes.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<SizeExpr, EvalError> {
        let mut lhs = self.term()?;
        while let Some(op) = match self.peek() {
            Some(b'+') => Some(BinOp::Add),
            Some(b'-') => Some(BinOp::Sub),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = SizeExpr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<SizeExpr, EvalError> {
        let mut lhs = self.factor()?;
        while let Some(op) = match self.peek() {
            Some(b'*') => Some(BinOp::Mul),
            Some(b'/') => Some(BinOp::Div),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = SizeExpr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<SizeExpr, EvalError> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if self.peek() != Some(b')') {
                    return Err(EvalError::Parse {
                        at: self.pos,
                        msg: "expected closing parenthesis",
                    });
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(b) if b.is_ascii_digit() => self.number(),
            Some(b) if b == b'_' || b.is_ascii_alphabetic() => Ok(SizeExpr::Spec(self.ident())),
            _ => Err(EvalError::Parse {
                at: self.pos,
                msg: "expected number, identifier or parenthesized expression",
            }),
        }
    }

    fn number(&mut self) -> Result<SizeExpr, EvalError> {
        let mut value: u64 = 0;
        while let Some(digit) = self
            .bytes
            .get(self.pos)
            .filter(|b| b.is_ascii_digit())
            .map(|b| u64::from(b - b'0'))
        {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or(EvalError::Overflow)?;
            self.pos += 1;
        }
        Ok(SizeExpr::Literal(value))
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| *b == b'_' || b.is_ascii_alphanumeric())
        {
            self.pos += 1;
        }
        // The loop only advances over ASCII, so the slice stays valid UTF-8.
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(pairs: &[(&str, u64)]) -> SpecRegistry {
        SpecRegistry::new(pairs.iter().map(|(k, v)| (k.to_string(), *v)))
    }

    #[test]
    fn precedence_is_multiplicative_over_additive() {
        let specs = specs(&[("X", 10)]);
        assert_eq!(SizeExpr::resolve("X*2-3", &specs), Ok(17));
        assert_eq!(SizeExpr::resolve("3+X*2", &specs), Ok(23));
    }

    #[test]
    fn parentheses_override_precedence() {
        let specs = specs(&[("A", 2), ("B", 3), ("C", 5)]);
        assert_eq!(SizeExpr::resolve("A*(B+C)", &specs), Ok(16));
        assert_eq!(SizeExpr::resolve("A*B+C", &specs), Ok(11));
    }

    #[test]
    fn whitespace_is_ignored() {
        let specs = specs(&[("SLOTS_PER_EPOCH", 32)]);
        assert_eq!(SizeExpr::resolve(" SLOTS_PER_EPOCH * 8 ", &specs), Ok(256));
    }

    #[test]
    fn division_is_integer_and_checked() {
        let specs = specs(&[("N", 7)]);
        assert_eq!(SizeExpr::resolve("N/2", &specs), Ok(3));
        assert_eq!(SizeExpr::resolve("N/0", &specs), Err(EvalError::DivideByZero));
    }

    #[test]
    fn underflow_reports_as_overflow() {
        let specs = specs(&[("N", 1)]);
        assert_eq!(SizeExpr::resolve("N-2", &specs), Err(EvalError::Overflow));
    }

    #[test]
    fn unknown_names_fail_at_evaluation() {
        let specs = specs(&[]);
        assert_eq!(
            SizeExpr::resolve("MISSING+1", &specs),
            Err(EvalError::UnknownSpec("MISSING".to_string()))
        );
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(
            SizeExpr::parse("4+"),
            Err(EvalError::Parse { .. })
        ));
        assert!(matches!(
            SizeExpr::parse("(1+2"),
            Err(EvalError::Parse { .. })
        ));
        assert!(matches!(
            SizeExpr::parse("1 2"),
            Err(EvalError::Parse { .. })
        ));
    }

    #[test]
    fn left_associative_subtraction() {
        let specs = specs(&[]);
        assert_eq!(SizeExpr::resolve("10-3-2", &specs), Ok(5));
    }
}
