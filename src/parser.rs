use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::ast::*;
use crate::error::{Error, Result};
use crate::expr::parse_expr;
use crate::lexer::{split_contents, Token, TokenKind, Tokenizer};

/// A block tag contributed from outside the engine, such as `ifusergroup`.
///
/// `parse` receives the split contents of the opening tag (the tag name is
/// `bits[0]`), the opening token itself, and the parser positioned right
/// after it. It consumes whatever markup it owns and returns the node.
pub trait TagParser: Send + Sync {
    fn name(&self) -> &str;

    fn parse(&self, bits: Vec<String>, token: &Token, parser: &mut Parser<'_>) -> Result<Node>;
}

pub type TagRegistry = HashMap<String, Arc<dyn TagParser>>;

pub struct Parser<'a> {
    lexer: Tokenizer<'a>,
    buffer: VecDeque<Token>,
    tags: &'a TagRegistry,
    source_len: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, tags: &'a TagRegistry) -> Self {
        Self {
            lexer: Tokenizer::new(input),
            buffer: VecDeque::new(),
            tags,
            source_len: input.len(),
        }
    }

    pub fn with_trim_blocks(mut self, trim_blocks: bool) -> Self {
        self.lexer = self.lexer.with_trim_blocks(trim_blocks);
        self
    }

    pub fn peek(&mut self) -> Result<Option<&Token>> {
        if self.buffer.is_empty() {
            if let Some(token) = self.lexer.next_token() {
                self.buffer.push_back(token?);
            }
        }
        Ok(self.buffer.front())
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        match self.buffer.pop_front() {
            Some(token) => Ok(Some(token)),
            None => self.lexer.next_token().transpose(),
        }
    }

    /// Byte offset where the next unconsumed token starts.
    pub fn position(&mut self) -> Result<usize> {
        let end = self.source_len;
        Ok(self.peek()?.map_or(end, |t| t.span.start))
    }

    /// Parse the whole input as a top-level program.
    pub fn parse(&mut self) -> Result<Program> {
        self.parse_until(&[])
    }

    /// Parse nodes until a block tag whose name is in `stop`. The stop tag is
    /// left unconsumed. With a non-empty `stop`, running out of input is an
    /// unclosed-tag error.
    pub fn parse_until(&mut self, stop: &[&str]) -> Result<Program> {
        let start = self.position()?;
        let source_len = self.source_len;
        let mut nodes = Vec::new();

        loop {
            let at_stop = match self.peek()? {
                None if stop.is_empty() => break,
                None => {
                    return Err(Error::syntax(
                        format!("unclosed tag, expected one of: {}", stop.join(", ")),
                        source_len,
                    ))
                }
                Some(token) => token.block_name().is_some_and(|name| stop.contains(&name)),
            };
            if at_stop {
                break;
            }

            let Some(token) = self.next_token()? else {
                break;
            };
            match &token.kind {
                TokenKind::Text(s) => nodes.push(Node::Text(s.clone())),
                TokenKind::Var(contents) => {
                    nodes.push(Node::Var(parse_expr(contents, token.span.start + 2)?));
                }
                TokenKind::Block(_) => nodes.push(self.parse_tag(&token)?),
            }
        }

        let end = self.position()?;
        Ok(Program {
            nodes,
            span: start..end,
        })
    }

    /// Consume the next token, which must be a block tag named `name` with no
    /// arguments.
    pub fn expect_block(&mut self, name: &str) -> Result<Token> {
        let offset = self.position()?;
        match self.next_token()? {
            Some(token) if token.contents() == name => Ok(token),
            Some(token) => Err(Error::syntax(
                format!("expected `{{% {} %}}`, got {:?}", name, token.contents()),
                token.span.start,
            )),
            None => Err(Error::syntax(format!("expected `{{% {} %}}`, got end of input", name), offset)),
        }
    }

    fn parse_tag(&mut self, token: &Token) -> Result<Node> {
        let bits = split_contents(token.contents());
        let Some(name) = bits.first().cloned() else {
            return Err(Error::syntax("empty block tag", token.span.start));
        };

        match name.as_str() {
            "if" => self.parse_if(token),
            "for" => self.parse_for(bits, token),
            _ => match self.tags.get(&name).cloned() {
                Some(tag) => tag.parse(bits, token, self),
                None => Err(Error::syntax(
                    format!("unknown or unexpected tag '{}'", name),
                    token.span.start,
                )),
            },
        }
    }

    fn parse_for(&mut self, bits: Vec<String>, token: &Token) -> Result<Node> {
        if bits.len() < 4 || bits[2] != "in" {
            return Err(Error::syntax(
                "'for' tag expects `for <name> in <expression>`",
                token.span.start,
            ));
        }
        let target = bits[1].clone();
        let iterable = parse_expr(&bits[3..].join(" "), token.span.start)?;

        let body = self.parse_until(&["endfor"])?;
        self.expect_block("endfor")?;

        Ok(Node::For {
            target,
            iterable,
            body,
        })
    }

    fn parse_if(&mut self, token: &Token) -> Result<Node> {
        let condition = parse_expr(tag_arguments(token.contents()), token.span.start)?;
        let body = self.parse_until(&["elif", "else", "endif"])?;
        let mut cases = vec![(condition, body)];
        let mut else_body = None;

        loop {
            let Some(next) = self.next_token()? else {
                return Err(Error::syntax("unclosed 'if' tag", self.source_len));
            };
            match next.block_name() {
                Some("elif") => {
                    let cond = parse_expr(tag_arguments(next.contents()), next.span.start)?;
                    let block = self.parse_until(&["elif", "else", "endif"])?;
                    cases.push((cond, block));
                }
                Some("else") if next.contents() == "else" => {
                    else_body = Some(self.parse_until(&["endif"])?);
                    self.expect_block("endif")?;
                    break;
                }
                Some("endif") if next.contents() == "endif" => break,
                _ => {
                    return Err(Error::syntax(
                        format!("malformed tag {:?} inside 'if'", next.contents()),
                        next.span.start,
                    ))
                }
            }
        }

        Ok(Node::If { cases, else_body })
    }
}

/// Everything after the tag name, e.g. `a == b` for `if a == b`.
fn tag_arguments(contents: &str) -> &str {
    contents
        .split_once(char::is_whitespace)
        .map_or("", |(_, rest)| rest.trim())
}
