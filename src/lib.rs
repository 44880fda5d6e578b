//! Crate root: wires together the compilation pipeline.
//!
//! Each stage consumes the previous one's output and nothing flows back:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the program AST.
//! - `lower` flattens the AST into three-address instructions over virtual
//!   registers.
//! - `codegen` renders those instructions as a textual listing.
//! - `error` holds the error type shared by the other modules.
//!
//! All per-compilation state lives inside a single `compile` call, so
//! independent compilations can run concurrently.

pub mod codegen;
pub mod error;
pub mod lower;
pub mod parser;
pub mod tokenizer;

pub use error::{CompileError, CompileResult};

/// Compile a source string into a register-level listing.
pub fn compile(source: &str) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens, source.chars().count())?;
  let code = lower::lower(&program)?;
  Ok(codegen::render(&code))
}
