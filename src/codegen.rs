//! Code generation: render the lowered instruction list as text.
//!
//! One line per instruction, joined by `\n` with no trailing newline:
//! `r2 := r0 + r1` for a computation and `r1 := 5` for a copy.

use tracing::debug;

use crate::lower::Instruction;

/// Render instructions in the order they were emitted.
pub fn render(code: &[Instruction]) -> String {
  let listing = code
    .iter()
    .map(Instruction::to_string)
    .collect::<Vec<_>>()
    .join("\n");

  debug!(lines = code.len(), bytes = listing.len(), "rendered listing");
  listing
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lower::{ArithOp, Operand, Register};

  #[test]
  fn renders_copy_and_compute() {
    let code = vec![
      Instruction::Copy {
        from: Operand::Number("2.5".into()),
        to: Register { id: 0 },
      },
      Instruction::Compute {
        op: ArithOp::Div,
        lhs: Operand::Register(Register { id: 0 }),
        rhs: Operand::Number("7".into()),
        to: Register { id: 12 },
      },
    ];
    assert_eq!(render(&code), "r0 := 2.5\nr12 := r0 / 7");
  }

  #[test]
  fn empty_listing_is_empty_text() {
    assert_eq!(render(&[]), "");
  }
}
