//! Boolean expressions over named check instances.
//!
//! Grammar (`&&` binds tighter than `||`, `!` is unary):
//! ```text
//! Expr := Or
//! Or   := And ( "||" And )*
//! And  := Term ( "&&" Term )*
//! Term := "!" Term | "(" Or ")" | Identifier
//! ```
//! Evaluation walks the AST against a precomputed `name → bool` map; the
//! engine runs every referenced instance exactly once beforehand, so
//! diagnostics stay complete regardless of expression shape.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unexpected token '{token}'")]
    UnexpectedToken { token: String },

    #[error("expression ended unexpectedly")]
    UnexpectedEnd,

    #[error("empty expression")]
    Empty,

    #[error("no result recorded for instance '{0}'")]
    UnknownReference(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoolExpr {
    Ref(String),
    Not(Box<BoolExpr>),
    And(Vec<BoolExpr>),
    Or(Vec<BoolExpr>),
}

impl BoolExpr {
    pub fn parse(src: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or_expr()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(ExprError::UnexpectedToken { token: tok.to_string() }),
        }
    }

    /// Referenced instance names, unique, in first-appearance order.
    pub fn references(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs(&self, out: &mut Vec<String>) {
        match self {
            BoolExpr::Ref(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            BoolExpr::Not(inner) => inner.collect_refs(out),
            BoolExpr::And(terms) | BoolExpr::Or(terms) => {
                for term in terms {
                    term.collect_refs(out);
                }
            }
        }
    }

    pub fn evaluate(&self, results: &HashMap<String, bool>) -> Result<bool, ExprError> {
        match self {
            BoolExpr::Ref(name) => results
                .get(name)
                .copied()
                .ok_or_else(|| ExprError::UnknownReference(name.clone())),
            BoolExpr::Not(inner) => Ok(!inner.evaluate(results)?),
            BoolExpr::And(terms) => {
                let mut value = true;
                for term in terms {
                    value &= term.evaluate(results)?;
                }
                Ok(value)
            }
            BoolExpr::Or(terms) => {
                let mut value = false;
                for term in terms {
                    value |= term.evaluate(results)?;
                }
                Ok(value)
            }
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "{}", name),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token::AndAnd);
                    i += 2;
                } else {
                    return Err(ExprError::UnexpectedChar { ch: '&', offset: i });
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token::OrOr);
                    i += 2;
                } else {
                    return Err(ExprError::UnexpectedChar { ch: '|', offset: i });
                }
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let start = i;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c.is_ascii_alphanumeric() || c == '_' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(src[start..i].to_string()));
            }
            other => return Err(ExprError::UnexpectedChar { ch: other, offset: i }),
        }
    }
    Ok(tokens)
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn or_expr(&mut self) -> Result<BoolExpr, ExprError> {
        let mut terms = vec![self.and_expr()?];
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            terms.push(self.and_expr()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            BoolExpr::Or(terms)
        })
    }

    fn and_expr(&mut self) -> Result<BoolExpr, ExprError> {
        let mut terms = vec![self.term()?];
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            terms.push(self.term()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            BoolExpr::And(terms)
        })
    }

    fn term(&mut self) -> Result<BoolExpr, ExprError> {
        match self.advance() {
            Some(Token::Bang) => Ok(BoolExpr::Not(Box::new(self.term()?))),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(tok) => Err(ExprError::UnexpectedToken { token: tok.to_string() }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(Token::Ident(name)) => Ok(BoolExpr::Ref(name)),
            Some(tok) => Err(ExprError::UnexpectedToken { token: tok.to_string() }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn single_reference() {
        let expr = BoolExpr::parse("ready").unwrap();
        assert!(expr.evaluate(&results(&[("ready", true)])).unwrap());
        assert!(!expr.evaluate(&results(&[("ready", false)])).unwrap());
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // a || b && c  ==  a || (b && c)
        let expr = BoolExpr::parse("a || b && c").unwrap();
        assert!(expr
            .evaluate(&results(&[("a", false), ("b", true), ("c", true)]))
            .unwrap());
        assert!(!expr
            .evaluate(&results(&[("a", false), ("b", true), ("c", false)]))
            .unwrap());
        assert!(expr
            .evaluate(&results(&[("a", true), ("b", false), ("c", false)]))
            .unwrap());
    }

    #[test]
    fn parens_override_precedence() {
        let expr = BoolExpr::parse("(a || b) && c").unwrap();
        assert!(!expr
            .evaluate(&results(&[("a", true), ("b", false), ("c", false)]))
            .unwrap());
    }

    #[test]
    fn negation() {
        let expr = BoolExpr::parse("!a && b").unwrap();
        assert!(expr
            .evaluate(&results(&[("a", false), ("b", true)]))
            .unwrap());
        let expr = BoolExpr::parse("!(a || b)").unwrap();
        assert!(expr
            .evaluate(&results(&[("a", false), ("b", false)]))
            .unwrap());
    }

    #[test]
    fn references_are_unique_in_order() {
        let expr = BoolExpr::parse("b && a || b && c").unwrap();
        assert_eq!(expr.references(), vec!["b", "a", "c"]);
    }

    #[test]
    fn no_short_circuit_means_all_refs_needed() {
        let expr = BoolExpr::parse("a || b").unwrap();
        // Even though `a` is true, a missing entry for `b` is an error: the
        // engine is expected to have run every instance.
        let err = expr.evaluate(&results(&[("a", true)])).unwrap_err();
        assert_eq!(err, ExprError::UnknownReference("b".into()));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(BoolExpr::parse("").is_err());
        assert!(BoolExpr::parse("a &&").is_err());
        assert!(BoolExpr::parse("a & b").is_err());
        assert!(BoolExpr::parse("(a").is_err());
        assert!(BoolExpr::parse("a b").is_err());
        assert!(BoolExpr::parse("a-b").is_err());
    }
}
