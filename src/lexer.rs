use std::ops::Range;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text(String),
    /// Trimmed contents of `{{ ... }}`.
    Var(String),
    /// Trimmed contents of `{% ... %}`.
    Block(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte range of the whole token in the source, delimiters included.
    pub span: Range<usize>,
}

impl Token {
    /// First word of a block tag, e.g. `endif` for `{% endif %}`.
    pub fn block_name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Block(contents) => contents.split_whitespace().next(),
            _ => None,
        }
    }

    pub fn contents(&self) -> &str {
        match &self.kind {
            TokenKind::Text(s) | TokenKind::Var(s) | TokenKind::Block(s) => s,
        }
    }
}

#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
    trim_blocks: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: 0,
            trim_blocks: false,
        }
    }

    /// Drop a single newline directly after `%}`. The newline is folded into
    /// the block token's span so spans still tile the source.
    pub fn with_trim_blocks(mut self, trim_blocks: bool) -> Self {
        self.trim_blocks = trim_blocks;
        self
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) -> Range<usize> {
        let start = self.cursor;
        self.cursor += n;
        start..self.cursor
    }

    pub fn next_token(&mut self) -> Option<Result<Token>> {
        let rest = self.remaining();
        if rest.is_empty() {
            return None;
        }

        // Find next `{{` or `{%`
        let next_tag = rest.find("{%").into_iter().chain(rest.find("{{")).min();

        match next_tag {
            Some(0) => Some(self.lex_tag()),
            Some(idx) => {
                let text = rest[..idx].to_string();
                let span = self.advance(idx);
                Some(Ok(Token {
                    kind: TokenKind::Text(text),
                    span,
                }))
            }
            None => {
                let text = rest.to_string();
                let span = self.advance(rest.len());
                Some(Ok(Token {
                    kind: TokenKind::Text(text),
                    span,
                }))
            }
        }
    }

    fn lex_tag(&mut self) -> Result<Token> {
        let rest = self.remaining();
        let is_block = rest.starts_with("{%");
        let close = if is_block { "%}" } else { "}}" };

        let Some(end) = rest[2..].find(close) else {
            let offset = self.cursor;
            // Nothing after an unterminated tag can be tokenized reliably.
            self.cursor = self.input.len();
            return Err(Error::syntax(
                format!("unterminated tag, expected `{}`", close),
                offset,
            ));
        };

        let contents = rest[2..2 + end].trim().to_string();
        let mut len = 2 + end + 2;

        if is_block && self.trim_blocks {
            let after = &rest[len..];
            if after.starts_with('\n') {
                len += 1;
            } else if after.starts_with("\r\n") {
                len += 2;
            }
        }

        let span = self.advance(len);
        let kind = if is_block {
            TokenKind::Block(contents)
        } else {
            TokenKind::Var(contents)
        };
        Ok(Token { kind, span })
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Split tag contents on whitespace, keeping quoted substrings (quotes
/// included) together as a single bit.
///
/// `ifusergroup 'Store Keeper' Admins` yields
/// `["ifusergroup", "'Store Keeper'", "Admins"]`. A quote that is never
/// closed does not start a quoted run: `O'Brien Admins` is two bits.
pub fn split_contents(contents: &str) -> Vec<String> {
    let mut bits = Vec::new();
    let mut rest = contents.trim_start();

    while !rest.is_empty() {
        let end = quoted_bit_len(rest)
            .unwrap_or_else(|| rest.find(char::is_whitespace).unwrap_or(rest.len()));
        bits.push(rest[..end].to_string());
        rest = rest[end..].trim_start();
    }

    bits
}

/// Length of the bit at the start of `s` when it contains at least one
/// closed quoted run, e.g. `'a b'`, `x"y z"w`. Plain characters around the
/// runs belong to the bit; a run may span whitespace.
fn quoted_bit_len(s: &str) -> Option<usize> {
    let is_plain = |c: char| !c.is_whitespace() && c != '"' && c != '\'';
    let mut pos = 0;
    let mut runs = 0;

    loop {
        let plain = s[pos..].find(|c: char| !is_plain(c)).unwrap_or(s.len() - pos);
        let at = pos + plain;

        let closed = match s[at..].chars().next() {
            Some(q @ ('"' | '\'')) => closing_quote(&s[at + 1..], q).map(|end| at + 1 + end + 1),
            _ => None,
        };

        match closed {
            Some(next) => {
                runs += 1;
                pos = next;
            }
            None if runs > 0 => return Some(at),
            None => return None,
        }
    }
}

/// Byte offset of the unescaped `quote` closing a run, if any.
fn closing_quote(s: &str, quote: char) -> Option<usize> {
    let mut chars = s.char_indices();
    while let Some((idx, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            return Some(idx);
        }
    }
    None
}
