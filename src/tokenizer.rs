//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! Rules are tried in a fixed order at every scan position and the first
//! one that matches wins; there is no longest-match arbitration between
//! rules. Whitespace and `//` comments are consumed here and never reach
//! the parser.

use std::fmt;

use snafu::OptionExt;
use tracing::debug;

use crate::error::{CompileResult, LexSnafu};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Number,
  Identifier,
  Operator,
  Semicolon,
}

impl TokenKind {
  pub fn describe(self) -> &'static str {
    match self {
      Self::Number => "number",
      Self::Identifier => "identifier",
      Self::Operator => "operator",
      Self::Semicolon => "semicolon",
    }
  }
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.describe())
  }
}

/// A classified slice of the source; `loc` is its character offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub loc: usize,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, loc: usize) -> Self {
    Self {
      kind,
      text: text.into(),
      loc,
    }
  }

  /// Whether this token is the given operator.
  pub fn is_operator(&self, op: &str) -> bool {
    self.kind == TokenKind::Operator && self.text == op
  }
}

/// What a rule matched at the current position.
enum Lexeme {
  Token(TokenKind),
  Skip,
}

/// Lex the input into a flat vector of significant tokens.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let mut i = 0;
  let mut position = 0;

  while i < input.len() {
    let rest = &input[i..];
    let (lexeme, len) = match_rule(rest).with_context(|| LexSnafu {
      position,
      found: rest.chars().next().unwrap_or('\0'),
    })?;

    let lexeme_text = &rest[..len];
    if let Lexeme::Token(kind) = lexeme {
      tokens.push(Token::new(kind, lexeme_text, position));
    }
    i += len;
    position += lexeme_text.chars().count();
  }

  debug!(tokens = tokens.len(), chars = position, "tokenized source");
  Ok(tokens)
}

/// Try each rule in priority order and return the first match with its byte length.
fn match_rule(rest: &str) -> Option<(Lexeme, usize)> {
  if let Some(len) = match_number(rest) {
    return Some((Lexeme::Token(TokenKind::Number), len));
  }
  if let Some(len) = match_identifier(rest) {
    return Some((Lexeme::Token(TokenKind::Identifier), len));
  }
  if let Some(len) = match_whitespace(rest) {
    return Some((Lexeme::Skip, len));
  }
  if let Some(len) = match_comment(rest) {
    return Some((Lexeme::Skip, len));
  }
  if let Some(len) = match_operator(rest) {
    return Some((Lexeme::Token(TokenKind::Operator), len));
  }
  if rest.starts_with(';') {
    return Some((Lexeme::Token(TokenKind::Semicolon), 1));
  }
  None
}

fn count_digits(bytes: &[u8]) -> usize {
  bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Digits, optionally followed by `.` and at least one more digit.
fn match_number(rest: &str) -> Option<usize> {
  let bytes = rest.as_bytes();
  let int_len = count_digits(bytes);
  if int_len == 0 {
    return None;
  }

  if bytes.get(int_len) == Some(&b'.') {
    let frac_len = count_digits(&bytes[int_len + 1..]);
    if frac_len > 0 {
      return Some(int_len + 1 + frac_len);
    }
  }
  Some(int_len)
}

/// A letter or underscore followed by letters, digits or underscores.
fn match_identifier(rest: &str) -> Option<usize> {
  let bytes = rest.as_bytes();
  let first = *bytes.first()?;
  if !(first.is_ascii_alphabetic() || first == b'_') {
    return None;
  }

  let tail = bytes[1..]
    .iter()
    .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
    .count();
  Some(1 + tail)
}

/// Unicode whitespace plus the byte order mark.
fn match_whitespace(rest: &str) -> Option<usize> {
  let len: usize = rest
    .chars()
    .take_while(|c| c.is_whitespace() || *c == '\u{feff}')
    .map(char::len_utf8)
    .sum();
  (len > 0).then_some(len)
}

/// `//` up to, but not including, the end of the line.
fn match_comment(rest: &str) -> Option<usize> {
  if !rest.starts_with("//") {
    return None;
  }
  Some(rest.find(['\n', '\r']).unwrap_or(rest.len()))
}

fn match_operator(rest: &str) -> Option<usize> {
  match rest.as_bytes().first()? {
    // `//` never reaches this point; the comment rule runs first.
    b'-' | b'+' | b'*' | b'/' | b'=' | b'(' | b')' => Some(1),
    _ => None,
  }
}
