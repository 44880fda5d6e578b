//! Recursive-descent parser producing a statement list and expression AST.
//!
//! One function per non-terminal:
//!
//! ```text
//! program    := statement*
//! statement  := expression ';'
//! expression := assignment
//! assignment := add ( '=' assignment )?
//! add        := mul ( ('+' | '-') add )?
//! mul        := value ( ('*' | '/') mul )?
//! value      := number | identifier | '(' expression ')'
//! ```
//!
//! `add` and `mul` take themselves as the right operand, so all four
//! arithmetic operators group to the right: `2-3-4` is `2-(3-4)`. This is the
//! language's defined behaviour and lowering depends on it. Chains are read
//! in a loop and folded from the right, and parenthesis nesting is capped at
//! `MAX_NESTING`, so call depth stays bounded whatever the input.

use std::fmt;

use snafu::ensure;
use tracing::debug;

use crate::error::{CompileResult, NestingTooDeepSnafu, SyntaxSnafu};
use crate::tokenizer::{Token, TokenKind};

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Assign,
}

impl BinaryOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    match symbol {
      "+" => Some(Self::Add),
      "-" => Some(Self::Sub),
      "*" => Some(Self::Mul),
      "/" => Some(Self::Div),
      "=" => Some(Self::Assign),
      _ => None,
    }
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Assign => "=",
    }
  }
}

impl fmt::Display for BinaryOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  Number {
    text: String,
  },
  Identifier {
    name: String,
  },
  BinaryOp {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
}

impl Expr {
  pub fn number(text: impl Into<String>) -> Self {
    Self::Number { text: text.into() }
  }

  pub fn identifier(name: impl Into<String>) -> Self {
    Self::Identifier { name: name.into() }
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
    Self::BinaryOp {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }
}

/// Fully parenthesised rendering; grouping is always explicit.
impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number { text } => f.write_str(text),
      Self::Identifier { name } => f.write_str(name),
      Self::BinaryOp { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
    }
  }
}

/// Chain trees are as deep as the chain is long; children are detached onto
/// a heap worklist rather than dropped recursively.
impl Drop for Expr {
  fn drop(&mut self) {
    let mut pending = Vec::new();
    detach_children(self, &mut pending);
    while let Some(mut node) = pending.pop() {
      detach_children(&mut node, &mut pending);
    }
  }
}

fn detach_children(node: &mut Expr, pending: &mut Vec<Expr>) {
  if let Expr::BinaryOp { lhs, rhs, .. } = node {
    for child in [lhs, rhs] {
      if matches!(**child, Expr::BinaryOp { .. }) {
        pending.push(std::mem::replace(&mut **child, Expr::number("")));
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Expression { body: Expr },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
  pub statements: Vec<Stmt>,
}

/// Deepest parenthesis nesting accepted before parsing gives up.
pub const MAX_NESTING: usize = 256;

/// Parse a sequence of statements from the token stream.
///
/// `source_chars` is the source length in characters; it only positions
/// errors that hit the end of input.
pub fn parse(tokens: Vec<Token>, source_chars: usize) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens, source_chars);
  let mut statements = Vec::new();

  while !stream.is_eof() {
    statements.push(parse_stmt(&mut stream)?);
  }

  debug!(statements = statements.len(), "parsed program");
  Ok(Program { statements })
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let body = parse_expr(stream)?;
  stream.skip(TokenKind::Semicolon, None)?;
  Ok(Stmt::Expression { body })
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_chain(stream, &["="], parse_add)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_chain(stream, &["+", "-"], parse_mul)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_chain(stream, &["*", "/"], parse_value)
}

/// `operand ( op operand )*`, grouped to the right.
///
/// Equivalent to `operand ( op chain )?` but collects the chain in a loop,
/// so long chains cost heap rather than call depth.
fn parse_chain(
  stream: &mut TokenStream,
  symbols: &[&str],
  operand: fn(&mut TokenStream) -> CompileResult<Expr>,
) -> CompileResult<Expr> {
  let first = operand(stream)?;
  let mut rest = Vec::new();

  while let Some(op) = symbols
    .iter()
    .find(|symbol| stream.equal(symbol))
    .and_then(|symbol| BinaryOp::from_symbol(symbol))
  {
    rest.push((op, operand(stream)?));
  }

  let Some((mut op, mut node)) = rest.pop() else {
    return Ok(first);
  };
  while let Some((prev_op, lhs)) = rest.pop() {
    node = Expr::binary(op, lhs, node);
    op = prev_op;
  }
  Ok(Expr::binary(op, first, node))
}

fn parse_value(stream: &mut TokenStream) -> CompileResult<Expr> {
  if let Some(text) = stream.take(TokenKind::Number) {
    return Ok(Expr::number(text));
  }

  if let Some(name) = stream.take(TokenKind::Identifier) {
    return Ok(Expr::identifier(name));
  }

  stream.open_paren()?;
  let node = parse_expr(stream)?;
  stream.skip(TokenKind::Operator, Some(")"))?;
  stream.depth -= 1;
  Ok(node)
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  source_chars: usize,
  pos: usize,
  depth: usize,
}

impl TokenStream {
  fn new(tokens: Vec<Token>, source_chars: usize) -> Self {
    Self {
      tokens,
      source_chars,
      pos: 0,
      depth: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Consume the current token if it is the given operator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.is_operator(op)
    {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume the current token if it has the given kind, returning its text.
  fn take(&mut self, kind: TokenKind) -> Option<String> {
    if let Some(token) = self.peek()
      && token.kind == kind
    {
      let text = token.text.clone();
      self.pos += 1;
      return Some(text);
    }
    None
  }

  /// Require the current token to have `kind` (and `value`, when given).
  fn skip(&mut self, kind: TokenKind, value: Option<&str>) -> CompileResult<()> {
    if let Some(token) = self.peek()
      && token.kind == kind
      && value.is_none_or(|v| token.text == v)
    {
      self.pos += 1;
      return Ok(());
    }

    let (found_kind, found_value, position) = match self.peek() {
      Some(token) => (
        token.kind.describe(),
        Some(token.text.clone()),
        token.loc,
      ),
      None => ("end of input", None, self.source_chars),
    };
    SyntaxSnafu {
      expected_kind: kind.describe(),
      expected_value: value.map(str::to_owned),
      found_kind,
      found_value,
      position,
    }
    .fail()
  }

  /// Consume `(` and enter one more nesting level.
  fn open_paren(&mut self) -> CompileResult<()> {
    let position = self.peek().map_or(self.source_chars, |token| token.loc);
    self.skip(TokenKind::Operator, Some("("))?;
    self.depth += 1;
    ensure!(
      self.depth <= MAX_NESTING,
      NestingTooDeepSnafu {
        limit: MAX_NESTING,
        position
      }
    );
    Ok(())
  }

  fn is_eof(&self) -> bool {
    self.pos >= self.tokens.len()
  }
}
