//! Expression language used inside `{{ ... }}`, `{% if ... %}` and
//! `{% for ... %}`.

use crate::ast::{BinOp, Expr};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    True,
    False,
    And,
    Or,
    Not,

    EqEq,     // ==
    NotEq,    // !=
    Dot,      // .
    LBracket, // [
    RBracket, // ]
    LParen,   // (
    RParen,   // )

    Ident(String),
    StringLit(String),
}

/// Tokenize an expression. `offset` is the byte position of `src` in the
/// template and is only used for error reporting.
fn tokenize(src: &str, offset: usize) -> Result<Vec<ExprToken>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while cursor < src.len() {
        let rest = &src[cursor..];
        let Some(first) = rest.chars().next() else {
            break;
        };

        if first.is_whitespace() {
            cursor += first.len_utf8();
            continue;
        }

        let symbol = match rest.get(..2) {
            Some("==") => Some((ExprToken::EqEq, 2)),
            Some("!=") => Some((ExprToken::NotEq, 2)),
            _ => match first {
                '.' => Some((ExprToken::Dot, 1)),
                '[' => Some((ExprToken::LBracket, 1)),
                ']' => Some((ExprToken::RBracket, 1)),
                '(' => Some((ExprToken::LParen, 1)),
                ')' => Some((ExprToken::RParen, 1)),
                _ => None,
            },
        };
        if let Some((token, len)) = symbol {
            tokens.push(token);
            cursor += len;
            continue;
        }

        if first == '\'' || first == '"' {
            let (lit, len) = lex_string(rest, first)
                .ok_or_else(|| Error::syntax("unterminated string literal", offset + cursor))?;
            tokens.push(ExprToken::StringLit(lit));
            cursor += len;
            continue;
        }

        if first.is_alphabetic() || first == '_' {
            let ident: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            cursor += ident.len();
            tokens.push(match ident.as_str() {
                "true" | "True" => ExprToken::True,
                "false" | "False" => ExprToken::False,
                "and" => ExprToken::And,
                "or" => ExprToken::Or,
                "not" => ExprToken::Not,
                _ => ExprToken::Ident(ident),
            });
            continue;
        }

        // Bare digits are only meaningful as index keys, keep them as strings.
        if first.is_ascii_digit() {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            cursor += digits.len();
            tokens.push(ExprToken::StringLit(digits));
            continue;
        }

        return Err(Error::syntax(
            format!("unexpected character {:?} in expression", first),
            offset + cursor,
        ));
    }

    Ok(tokens)
}

/// Lex a quoted literal starting at `rest[0]`. Returns the unescaped text and
/// the number of bytes consumed, quotes included.
fn lex_string(rest: &str, quote: char) -> Option<(String, usize)> {
    let mut s = String::new();
    let mut chars = rest.char_indices().skip(1);
    while let Some((idx, c)) = chars.next() {
        if c == quote {
            return Some((s, idx + c.len_utf8()));
        }
        if c == '\\' {
            let (_, esc) = chars.next()?;
            match esc {
                'n' => s.push('\n'),
                't' => s.push('\t'),
                _ => s.push(esc),
            }
        } else {
            s.push(c);
        }
    }
    None
}

/// Parse a complete expression; trailing tokens are an error.
pub fn parse_expr(src: &str, offset: usize) -> Result<Expr> {
    let tokens = tokenize(src, offset)?;
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        offset,
    };
    let expr = parser.parse_or()?;
    if let Some(t) = parser.peek() {
        return Err(parser.error(format!("unexpected {:?} after expression", t)));
    }
    Ok(expr)
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
    offset: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<ExprToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: String) -> Error {
        Error::syntax(message, self.offset)
    }

    fn expect(&mut self, token: ExprToken) -> Result<()> {
        match self.consume() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(self.error(format!("expected {:?}, got {:?}", token, t))),
            None => Err(self.error(format!("expected {:?}, got end of expression", token))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while let Some(ExprToken::Or) = self.peek() {
            self.consume();
            let rhs = self.parse_and()?;
            lhs = Expr::BinOp(Box::new(lhs), BinOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        while let Some(ExprToken::And) = self.peek() {
            self.consume();
            let rhs = self.parse_not()?;
            lhs = Expr::BinOp(Box::new(lhs), BinOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if let Some(ExprToken::Not) = self.peek() {
            self.consume();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_eq()
    }

    fn parse_eq(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_primary()?;
        loop {
            let op = match self.peek() {
                Some(ExprToken::EqEq) => BinOp::Eq,
                Some(ExprToken::NotEq) => BinOp::NotEq,
                _ => break,
            };
            self.consume();
            let rhs = self.parse_primary()?;
            lhs = Expr::BinOp(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let mut expr = match self.consume() {
            Some(ExprToken::StringLit(s)) => Expr::StringLit(s),
            Some(ExprToken::True) => Expr::BoolLit(true),
            Some(ExprToken::False) => Expr::BoolLit(false),
            Some(ExprToken::Ident(s)) => Expr::Var(s),
            Some(ExprToken::LParen) => {
                let e = self.parse_or()?;
                self.expect(ExprToken::RParen)?;
                e
            }
            Some(t) => return Err(self.error(format!("expected expression, got {:?}", t))),
            None => return Err(self.error("expected expression".to_string())),
        };

        // Handle suffixes: .attr, ['key']
        loop {
            match self.peek() {
                Some(ExprToken::Dot) => {
                    self.consume();
                    match self.consume() {
                        Some(ExprToken::Ident(attr)) => {
                            expr = Expr::Attribute(Box::new(expr), attr);
                        }
                        Some(ExprToken::StringLit(idx)) => {
                            expr = Expr::Index(Box::new(expr), Box::new(Expr::StringLit(idx)));
                        }
                        t => {
                            return Err(
                                self.error(format!("expected identifier after dot, got {:?}", t))
                            )
                        }
                    }
                }
                Some(ExprToken::LBracket) => {
                    self.consume();
                    let idx = self.parse_or()?;
                    self.expect(ExprToken::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(idx));
                }
                _ => break,
            }
        }

        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_string()))
    }

    #[test]
    fn attribute_and_index_suffixes() {
        assert_eq!(
            parse_expr("team.lead['name']", 0).unwrap(),
            Expr::Index(
                Box::new(Expr::Attribute(var("team"), "lead".into())),
                Box::new(Expr::StringLit("name".into())),
            )
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(
            parse_expr("a or b and not c", 0).unwrap(),
            Expr::BinOp(
                var("a"),
                BinOp::Or,
                Box::new(Expr::BinOp(
                    var("b"),
                    BinOp::And,
                    Box::new(Expr::Not(var("c")))
                )),
            )
        );
    }

    #[test]
    fn numeric_index_is_kept_as_string_key() {
        assert_eq!(
            parse_expr("items.0", 0).unwrap(),
            Expr::Index(var("items"), Box::new(Expr::StringLit("0".into())))
        );
    }

    #[test]
    fn unterminated_string_reports_offset() {
        let err = parse_expr("'abc", 10).unwrap_err();
        assert_eq!(err, Error::syntax("unterminated string literal", 10));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert!(parse_expr("a b", 0).is_err());
        assert!(parse_expr("", 0).is_err());
        assert!(parse_expr("a ~ b", 0).is_err());
    }
}
