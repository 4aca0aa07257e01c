//! Depth-tracking scanner for Cypher text.
//!
//! Classifies every character as code or non-code (string literal, quoted
//! identifier, comment) and records the bracket nesting it sits at, so
//! callers can look for keywords and pattern elements at the top level only.

use nom::{
    branch::alt,
    bytes::complete::{escaped, is_not, tag, tag_no_case, take_until, take_while},
    character::complete::{anychar, char, multispace1, satisfy},
    combinator::{opt, recognize},
    sequence::{delimited, pair},
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharInfo {
    /// Byte offset of the character in the scanned text
    pub offset: usize,
    pub ch: char,
    /// `false` inside string literals, backtick identifiers and comments
    pub code: bool,
    pub parens: usize,
    pub brackets: usize,
    pub braces: usize,
}

impl CharInfo {
    pub fn depth(&self) -> usize {
        self.parens + self.brackets + self.braces
    }
}

/// A scanned query. Bracket characters report the depth outside of
/// themselves: `(` and its matching `)` share the same depth.
pub struct ScannedText<'a> {
    text: &'a str,
    chars: Vec<CharInfo>,
}

impl<'a> ScannedText<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut chars = Vec::with_capacity(text.len());
        let (mut parens, mut brackets, mut braces) = (0usize, 0usize, 0usize);
        let mut rest = text;

        while let Some(ch) = rest.chars().next() {
            let offset = text.len() - rest.len();

            // literals and comments swallow everything up to their end
            let skipped = match non_code(rest) {
                Ok((_, token)) => Some(token.len()),
                Err(_) if opens_non_code(rest) => Some(rest.len()),
                Err(_) => None,
            };
            if let Some(len) = skipped {
                for (i, c) in rest[..len].char_indices() {
                    chars.push(CharInfo {
                        offset: offset + i,
                        ch: c,
                        code: false,
                        parens,
                        brackets,
                        braces,
                    });
                }
                rest = &rest[len..];
                continue;
            }

            let mut info = CharInfo {
                offset,
                ch,
                code: true,
                parens,
                brackets,
                braces,
            };
            match ch {
                '(' => parens += 1,
                '[' => brackets += 1,
                '{' => braces += 1,
                ')' => {
                    parens = parens.saturating_sub(1);
                    info.parens = parens;
                }
                ']' => {
                    brackets = brackets.saturating_sub(1);
                    info.brackets = brackets;
                }
                '}' => {
                    braces = braces.saturating_sub(1);
                    info.braces = braces;
                }
                _ => {}
            }
            chars.push(info);
            rest = &rest[ch.len_utf8()..];
        }

        Self { text, chars }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&CharInfo> {
        self.chars.get(idx)
    }

    /// Byte offset of character `idx`; `len()` maps to the end of the text
    pub fn byte_offset(&self, idx: usize) -> usize {
        self.chars.get(idx).map(|c| c.offset).unwrap_or(self.text.len())
    }

    /// Code character outside any bracket
    pub fn is_top_level(&self, idx: usize) -> bool {
        self.chars
            .get(idx)
            .map(|c| c.code && c.depth() == 0)
            .unwrap_or(false)
    }

    /// Index of the first non-whitespace character at or after `idx`
    pub fn skip_whitespace(&self, mut idx: usize) -> usize {
        while idx < self.chars.len() && self.chars[idx].ch.is_whitespace() {
            idx += 1;
        }
        idx
    }

    /// Character index of the character starting at byte `offset`
    pub fn char_index(&self, offset: usize) -> usize {
        self.chars.partition_point(|c| c.offset < offset)
    }

    /// Match a (possibly multi-word) keyword at character `idx`.
    ///
    /// Words are compared case-insensitively, may be separated by any run of
    /// whitespace, and must sit at the top level with word boundaries on both
    /// sides. Returns the character index just past the keyword.
    pub fn keyword_at(&self, idx: usize, words: &[&str]) -> Option<usize> {
        if !self.is_top_level(idx) {
            return None;
        }
        if idx > 0 && !is_boundary(self.chars[idx - 1].ch) {
            return None;
        }

        let input = &self.text[self.byte_offset(idx)..];
        let (remaining, _) = keyword_phrase(input, words).ok()?;
        match remaining.chars().next() {
            Some(c) if is_ident_char(c) => None,
            _ => Some(self.char_index(self.text.len() - remaining.len())),
        }
    }

    /// Index of the bracket closing the one opened at `open`
    pub fn matching_close(&self, open: usize) -> Option<usize> {
        let opener = self.chars.get(open)?;
        if !opener.code {
            return None;
        }
        let closer = match opener.ch {
            '(' => ')',
            '[' => ']',
            '{' => '}',
            _ => return None,
        };
        let depth = opener.depth();
        self.chars[open + 1..]
            .iter()
            .position(|c| c.code && c.ch == closer && c.depth() == depth)
            .map(|p| open + 1 + p)
    }
}

/// Case-insensitive keyword words separated by whitespace
fn keyword_phrase<'a>(input: &'a str, words: &[&str]) -> IResult<&'a str, &'a str> {
    let mut rest = input;
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            let (r, _) = multispace1(rest)?;
            rest = r;
        }
        let (r, _) = tag_no_case(*word)(rest)?;
        rest = r;
    }
    Ok((rest, &input[..input.len() - rest.len()]))
}

/// Single- or double-quoted string literal with backslash escapes
fn string_literal<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    let stop = if quote == '"' { "\\\"" } else { "\\'" };
    recognize(delimited(
        char(quote),
        opt(escaped(is_not(stop), '\\', anychar)),
        char(quote),
    ))
}

fn backtick_identifier(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('`'), take_while(|c: char| c != '`'), char('`')))(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("//"), take_while(|c: char| c != '\n')))(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(delimited(tag("/*"), take_until("*/"), tag("*/")))(input)
}

/// A complete string literal, quoted identifier or comment
fn non_code(input: &str) -> IResult<&str, &str> {
    alt((
        string_literal('\''),
        string_literal('"'),
        backtick_identifier,
        line_comment,
        block_comment,
    ))(input)
}

/// Opener of a literal or comment that never closes
fn opens_non_code(input: &str) -> bool {
    input.starts_with(|c: char| matches!(c, '\'' | '"' | '`')) || input.starts_with("/*")
}

/// Variable name at the start of `input`: a backtick-quoted name, or a
/// letter or underscore followed by identifier characters
pub fn identifier(input: &str) -> IResult<&str, &str> {
    alt((
        backtick_identifier,
        recognize(pair(
            satisfy(|c: char| c.is_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
    ))(input)
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether a keyword may start right after `prev`
fn is_boundary(prev: char) -> bool {
    !(is_ident_char(prev) || matches!(prev, '.' | '$' | '`' | ':'))
}

/// Replace the body of every top-level `{...}` with nothing, keeping the
/// braces, so text inside property maps cannot look like pattern syntax.
pub fn blank_property_maps(text: &str) -> String {
    let scanned = ScannedText::new(text);
    let mut out = String::with_capacity(text.len());
    let mut idx = 0;
    while idx < scanned.len() {
        let info = scanned.chars[idx];
        out.push(info.ch);
        if info.code && info.ch == '{' && info.braces == 0 {
            if let Some(close) = scanned.matching_close(idx) {
                out.push('}');
                idx = close + 1;
                continue;
            }
        }
        idx += 1;
    }
    out
}
