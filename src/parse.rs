//! Parser for presence conditions written in C preprocessor syntax.
//!
//! Grammar:
//!
//! ```text
//! or      := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | "(" or ")" | "defined" "(" IDENT ")" | atom
//! atom    := IDENT | "1" | "0" | "true" | "false"
//! ```

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::formula::Formula;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '&' | '|' => {
                chars.next();
                match chars.next() {
                    Some((_, d)) if d == c => {
                        tokens.push(if c == '&' { Token::And } else { Token::Or });
                    }
                    _ => return Err(format!("expected `{}{}` at offset {}", c, c, i)),
                }
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected character `{}` at offset {}", other, i)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> std::result::Result<(), String> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {:?}, found {:?}", expected, token)),
            None => Err(format!("expected {:?}, found end of input", expected)),
        }
    }

    fn parse_or(&mut self) -> std::result::Result<Formula, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = Formula::disjoin(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> std::result::Result<Formula, String> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.parse_unary()?;
            lhs = Formula::conjoin(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> std::result::Result<Formula, String> {
        match self.next() {
            Some(Token::Not) => Ok(Formula::negate(self.parse_unary()?)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(ident)) => match ident.as_str() {
                "1" | "true" => Ok(Formula::True),
                "0" | "false" => Ok(Formula::False),
                "defined" => {
                    self.expect(Token::LParen)?;
                    let name = match self.next() {
                        Some(Token::Ident(name)) => name,
                        other => return Err(format!("expected a feature name, found {:?}", other)),
                    };
                    self.expect(Token::RParen)?;
                    Ok(Formula::var(name))
                }
                name if name.starts_with(|c: char| c.is_ascii_digit()) => {
                    Err(format!("`{}` is not a feature name", name))
                }
                name => Ok(Formula::var(name)),
            },
            Some(token) => Err(format!("unexpected {:?}", token)),
            None => Err("unexpected end of input".to_string()),
        }
    }
}

impl Formula {
    /// Parses a presence condition such as `A && !(B || defined(C))`.
    pub fn parse(input: &str) -> Result<Formula> {
        let fail = |message: String| Error::Parse {
            input: input.to_string(),
            message,
        };

        let tokens = tokenize(input).map_err(fail)?;
        let mut parser = Parser { tokens, pos: 0 };
        let formula = parser.parse_or().map_err(fail)?;
        if let Some(token) = parser.peek() {
            return Err(fail(format!("trailing {:?}", token)));
        }
        Ok(formula)
    }
}

impl FromStr for Formula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Formula::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_parse_precedence() {
        let f = Formula::parse("A || B && !C").unwrap();
        let expected = Formula::var("A") | (Formula::var("B") & !Formula::var("C"));
        assert_eq!(f, expected);
    }

    #[test]
    fn test_parse_parentheses_and_defined() {
        let f = Formula::parse("defined(A) && !(B || C)").unwrap();
        assert_eq!(f.to_string(), "A && !(B || C)");
    }

    #[test]
    fn test_parse_constants_simplify() {
        assert_eq!(Formula::parse("1 && F").unwrap(), Formula::var("F"));
        assert_eq!(Formula::parse("F && false").unwrap(), Formula::False);
        assert_eq!(Formula::parse("0 || 1").unwrap(), Formula::True);
    }

    #[test]
    fn test_display_round_trips_through_parser() {
        for text in ["A && !(B || C)", "(A || B) && !C", "!A || B && C"] {
            let f = Formula::parse(text).unwrap();
            assert_eq!(Formula::parse(&f.to_string()).unwrap(), f);
        }
    }

    #[test]
    fn test_parse_errors() {
        for text in ["", "A &&", "A & B", "(A", "A B", "2X", "A # B"] {
            let err = Formula::parse(text).unwrap_err();
            assert!(matches!(err, Error::Parse { .. }), "{}: {:?}", text, err);
        }
    }
}
