// SPDX-License-Identifier: MIT

//! Parser for the textual expression form emitted by `Expr::to_string()`.
//!
//! Grammar:
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := NUMBER | IDENT | IDENT '(' expr ',' expr ')' | '(' expr ')'
//! ```
//!
//! The only recognized functions are `Min` and `Max`; `inf` and `oo` are
//! accepted as the infinite constant. Division requires a constant divisor.

use crate::expr::{Expr, Number};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Number),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn lex(src: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push((i, Token::Plus));
                i += 1;
            }
            '-' => {
                tokens.push((i, Token::Minus));
                i += 1;
            }
            '*' => {
                tokens.push((i, Token::Star));
                i += 1;
            }
            '/' => {
                tokens.push((i, Token::Slash));
                i += 1;
            }
            '(' => {
                tokens.push((i, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((i, Token::RParen));
                i += 1;
            }
            ',' => {
                tokens.push((i, Token::Comma));
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                let mut is_float = false;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'.' {
                    is_float = true;
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    is_float = true;
                    i += 1;
                    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                        i += 1;
                    }
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = &src[start..i];
                let num = if is_float {
                    text.parse::<f64>().map(Number::Float)
                } else {
                    text.parse::<i64>()
                        .map(Number::Int)
                        .or_else(|_| text.parse::<f64>().map(Number::Float))
                }
                .map_err(|_| Error::Parse {
                    offset: start,
                    message: format!("invalid numeric literal '{text}'"),
                })?;
                tokens.push((start, Token::Num(num)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push((start, Token::Ident(src[start..i].to_string())));
            }
            c => {
                return Err(Error::Parse {
                    offset: i,
                    message: format!("unexpected character '{c}'"),
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        match self.next() {
            Some(ref t) if t == expected => Ok(()),
            _ => Err(Error::Parse {
                offset: self.offset(),
                message: format!("expected {what}"),
            }),
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    acc = Expr::add(acc, rhs);
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    acc = Expr::add(acc, Expr::scale(rhs, -1));
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut acc = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    acc = Expr::mul(acc, rhs);
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    let divisor = match rhs {
                        Expr::Const(n) => n,
                        _ => return Err(self.error("divisor must be a constant")),
                    };
                    if divisor.is_zero() {
                        return Err(self.error("division by zero"));
                    }
                    acc = Expr::scale(acc, Number::Float(1.0 / divisor.to_f64()));
                }
                _ => return Ok(acc),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::scale(self.unary()?, -1))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Const(n)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "inf" | "oo" | "Infinity" => Ok(Expr::infinity()),
                "Min" | "Max" if self.peek() == Some(&Token::LParen) => {
                    self.pos += 1;
                    let a = self.expr()?;
                    self.expect(&Token::Comma, "','")?;
                    let b = self.expr()?;
                    self.expect(&Token::RParen, "')'")?;
                    Ok(if name == "Min" {
                        Expr::min(a, b)
                    } else {
                        Expr::max(a, b)
                    })
                }
                _ if self.peek() == Some(&Token::LParen) => {
                    Err(self.error(format!("unknown function '{name}'")))
                }
                _ => Ok(Expr::param(name)),
            },
            _ => Err(self.error("expected a number, parameter or '('")),
        }
    }
}

/// Parse the textual form of an expression back into an [`Expr`].
pub fn parse_expr(src: &str) -> Result<Expr> {
    let tokens = lex(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
    };
    let expr = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("trailing input after expression"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_expr("5").unwrap(), Expr::from(5));
        assert_eq!(parse_expr("2.5").unwrap(), Expr::from(2.5));
        assert_eq!(parse_expr("1e9").unwrap(), Expr::from(1e9));
        assert_eq!(parse_expr("-3").unwrap(), Expr::from(-3));
        assert_eq!(parse_expr("inf").unwrap(), Expr::infinity());
        assert_eq!(parse_expr("-oo").unwrap(), Expr::neg_infinity());
    }

    #[test]
    fn test_parse_arithmetic() {
        let expected = Expr::scale(Expr::param("amp"), 2) + Expr::from(0.5);
        assert_eq!(parse_expr("2*amp + 0.5").unwrap(), expected);

        let expected = Expr::param("x") - Expr::param("y");
        assert_eq!(parse_expr("x - y").unwrap(), expected);

        let expected = Expr::scale(Expr::param("a") + Expr::param("b"), 2);
        assert_eq!(parse_expr("2*(a + b)").unwrap(), expected);

        assert_eq!(
            parse_expr("x/2").unwrap(),
            Expr::scale(Expr::param("x"), 0.5)
        );
    }

    #[test]
    fn test_parse_min_max() {
        let expected = Expr::min(Expr::param("a"), Expr::from(2));
        assert_eq!(parse_expr("Min(a, 2)").unwrap(), expected);
        let expected = Expr::max(Expr::param("a"), Expr::param("b"));
        assert_eq!(parse_expr("Max(a, b)").unwrap(), expected);
    }

    #[test]
    fn test_display_round_trip() {
        let exprs = [
            Expr::scale(Expr::param("amp"), 2) + Expr::from(0.5),
            Expr::param("x") - Expr::param("y"),
            -Expr::param("x"),
            Expr::param("a") * Expr::param("b"),
            Expr::scale(Expr::param("a") + Expr::param("b"), -2),
            Expr::from(1.5e-9),
            Expr::infinity(),
        ];
        for expr in exprs {
            let text = expr.to_string();
            assert_eq!(parse_expr(&text).unwrap(), expr, "round trip of '{text}'");
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_expr("x/0").is_err());
        assert!(parse_expr("1/x").is_err());
        assert!(parse_expr("Sin(x)").is_err());
        assert!(parse_expr("x +").is_err());
        assert!(parse_expr("x ?").is_err());
    }
}
