//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage fails fast with a single `CompileError`. Lexical and syntax
//! errors carry the character offset they were detected at, which `render`
//! turns into a caret diagnostic in the style of chibicc.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  /// No lexical rule matched at character `position`.
  #[snafu(display("cannot tokenize at position {position}: unexpected '{found}'"))]
  Lex { position: usize, found: char },

  /// The parser required a token the stream did not provide.
  #[snafu(display(
    "expected {expected_kind}{}, found {found_kind}{} at position {position}",
    quoted(expected_value.as_deref()),
    quoted(found_value.as_deref())
  ))]
  Syntax {
    expected_kind: String,
    expected_value: Option<String>,
    found_kind: String,
    found_value: Option<String>,
    position: usize,
  },

  /// Parentheses nested deeper than `limit`; `position` is the `(` that
  /// crossed it.
  #[snafu(display("parentheses nested deeper than {limit} at position {position}"))]
  NestingTooDeep { limit: usize, position: usize },

  /// The left side of `=` did not lower to a named register.
  #[snafu(display("cannot assign to a {node_kind}"))]
  AssignmentTarget { node_kind: &'static str },
}

fn quoted(value: Option<&str>) -> String {
  value.map(|v| format!(" \"{v}\"")).unwrap_or_default()
}

impl CompileError {
  /// Character offset in the source the error points at, if it has one.
  pub fn position(&self) -> Option<usize> {
    match self {
      Self::Lex { position, .. }
      | Self::Syntax { position, .. }
      | Self::NestingTooDeep { position, .. } => Some(*position),
      Self::AssignmentTarget { .. } => None,
    }
  }

  /// Format the error against the source it came from.
  ///
  /// Located errors quote the offending line and point at the character with a
  /// caret; the rest fall back to the plain message.
  pub fn render(&self, source: &str) -> String {
    let Some(position) = self.position() else {
      return self.to_string();
    };

    let safe_loc = source
      .char_indices()
      .nth(position)
      .map_or(source.len(), |(byte, _)| byte);
    let line_start = source[..safe_loc].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |i| safe_loc + i);
    let line = &source[line_start..line_end];
    let char_offset = source[line_start..safe_loc].chars().count() + 1; // account for opening quote
    let marker = format!("{}^", " ".repeat(char_offset));
    format!("'{line}'\n{marker} {self}")
  }
}
