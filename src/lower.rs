//! Lowering: flatten the AST into three-address instructions over virtual
//! registers.
//!
//! Registers come from one monotonically increasing counter per compilation.
//! Each distinct identifier is bound to a register the first time lowering
//! reaches it; every arithmetic node gets a fresh register for its result.
//! Binary nodes always lower their left operand before their right one, so
//! binding order follows the source left to right.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace};

use crate::error::{AssignmentTargetSnafu, CompileResult};
use crate::parser::{BinaryOp, Expr, Program, Stmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
  pub id: usize,
}

impl fmt::Display for Register {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "r{}", self.id)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
  /// Literal text of a number, kept exactly as written.
  Number(String),
  Register(Register),
}

impl fmt::Display for Operand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number(value) => f.write_str(value),
      Self::Register(reg) => write!(f, "{reg}"),
    }
  }
}

/// Arithmetic operators that produce a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl ArithOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
    }
  }
}

impl fmt::Display for ArithOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
  Copy {
    from: Operand,
    to: Register,
  },
  Compute {
    op: ArithOp,
    lhs: Operand,
    rhs: Operand,
    to: Register,
  },
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Copy { from, to } => write!(f, "{to} := {from}"),
      Self::Compute { op, lhs, rhs, to } => write!(f, "{to} := {lhs} {op} {rhs}"),
    }
  }
}

/// Result of lowering one expression node.
enum Value {
  Immediate(String),
  /// Register bound to an identifier; the only assignable location.
  Named(Register),
  /// Fresh register holding an arithmetic result.
  Temporary(Register),
}

impl Value {
  fn into_operand(self) -> Operand {
    match self {
      Self::Immediate(text) => Operand::Number(text),
      Self::Named(reg) | Self::Temporary(reg) => Operand::Register(reg),
    }
  }

  fn kind(&self) -> &'static str {
    match self {
      Self::Immediate(_) => "number literal",
      Self::Named(_) => "variable",
      Self::Temporary(_) => "arithmetic result",
    }
  }
}

enum Step<'a> {
  Visit(&'a Expr),
  Combine(BinaryOp),
}

/// Per-compilation lowering state. Never shared between compilations.
#[derive(Debug, Default)]
struct Lowering {
  next_register: usize,
  bindings: HashMap<String, Register>,
  code: Vec<Instruction>,
}

impl Lowering {
  fn fresh_register(&mut self) -> Register {
    let reg = Register {
      id: self.next_register,
    };
    self.next_register += 1;
    reg
  }

  fn bind(&mut self, name: &str) -> Register {
    if let Some(reg) = self.bindings.get(name) {
      return *reg;
    }
    let reg = self.fresh_register();
    trace!(name, register = %reg, "bound identifier");
    self.bindings.insert(name.to_owned(), reg);
    reg
  }

  fn lower_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      // The statement's value is discarded; only its instructions matter.
      Stmt::Expression { body } => self.lower_expr(body).map(drop),
    }
  }

  /// Post-order walk driven by an explicit work stack, so tree depth costs
  /// heap rather than call depth.
  fn lower_expr(&mut self, root: &Expr) -> CompileResult<Value> {
    let mut work = vec![Step::Visit(root)];
    let mut values: Vec<Value> = Vec::new();

    while let Some(step) = work.pop() {
      match step {
        Step::Visit(Expr::Number { text }) => values.push(Value::Immediate(text.clone())),
        Step::Visit(Expr::Identifier { name }) => {
          let reg = self.bind(name);
          values.push(Value::Named(reg));
        }
        Step::Visit(Expr::BinaryOp { op, lhs, rhs }) => {
          // Popped in reverse: left operand first, then right, then the node.
          work.push(Step::Combine(*op));
          work.push(Step::Visit(rhs));
          work.push(Step::Visit(lhs));
        }
        Step::Combine(op) => {
          let (Some(rhs), Some(lhs)) = (values.pop(), values.pop()) else {
            unreachable!("both operands are lowered before their operator");
          };
          let value = self.combine(op, lhs, rhs)?;
          values.push(value);
        }
      }
    }

    let Some(value) = values.pop() else {
      unreachable!("an expression always lowers to one value");
    };
    Ok(value)
  }

  fn combine(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> CompileResult<Value> {
    let arith = match op {
      BinaryOp::Assign => return self.lower_assign(lhs, rhs),
      BinaryOp::Add => ArithOp::Add,
      BinaryOp::Sub => ArithOp::Sub,
      BinaryOp::Mul => ArithOp::Mul,
      BinaryOp::Div => ArithOp::Div,
    };

    let to = self.fresh_register();
    self.code.push(Instruction::Compute {
      op: arith,
      lhs: lhs.into_operand(),
      rhs: rhs.into_operand(),
      to,
    });
    Ok(Value::Temporary(to))
  }

  fn lower_assign(&mut self, target: Value, value: Value) -> CompileResult<Value> {
    let node_kind = target.kind();
    let Value::Named(to) = target else {
      return AssignmentTargetSnafu { node_kind }.fail();
    };

    self.code.push(Instruction::Copy {
      from: value.into_operand(),
      to,
    });
    Ok(Value::Named(to))
  }
}

/// Lower a whole program into a flat instruction list in evaluation order.
///
/// Register numbering and identifier bindings are shared by every statement.
pub fn lower(program: &Program) -> CompileResult<Vec<Instruction>> {
  let mut lowering = Lowering::default();
  for stmt in &program.statements {
    lowering.lower_stmt(stmt)?;
  }

  debug!(
    instructions = lowering.code.len(),
    registers = lowering.next_register,
    variables = lowering.bindings.len(),
    "lowered program"
  );
  Ok(lowering.code)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn lower_str(source: &str) -> CompileResult<Vec<Instruction>> {
    let program = parse(tokenize(source)?, source.chars().count())?;
    lower(&program)
  }

  fn reg(id: usize) -> Register {
    Register { id }
  }

  fn r(id: usize) -> Operand {
    Operand::Register(reg(id))
  }

  fn n(text: &str) -> Operand {
    Operand::Number(text.into())
  }

  #[test]
  fn assignment_target_is_bound_before_right_side() {
    assert_eq!(
      lower_str("a=2; c=1; b=a+c;").unwrap(),
      vec![
        Instruction::Copy {
          from: n("2"),
          to: reg(0)
        },
        Instruction::Copy {
          from: n("1"),
          to: reg(1)
        },
        Instruction::Compute {
          op: ArithOp::Add,
          lhs: r(0),
          rhs: r(1),
          to: reg(3)
        },
        Instruction::Copy {
          from: r(3),
          to: reg(2)
        },
      ]
    );
  }

  #[test]
  fn right_associative_subtraction_computes_inner_first() {
    assert_eq!(
      lower_str("a=2-3-4;").unwrap(),
      vec![
        Instruction::Compute {
          op: ArithOp::Sub,
          lhs: n("3"),
          rhs: n("4"),
          to: reg(1)
        },
        Instruction::Compute {
          op: ArithOp::Sub,
          lhs: n("2"),
          rhs: r(1),
          to: reg(2)
        },
        Instruction::Copy {
          from: r(2),
          to: reg(0)
        },
      ]
    );
  }

  #[test]
  fn chained_assignment_propagates_target() {
    assert_eq!(
      lower_str("a=b=1;").unwrap(),
      vec![
        Instruction::Copy {
          from: n("1"),
          to: reg(1)
        },
        Instruction::Copy {
          from: r(1),
          to: reg(0)
        },
      ]
    );
  }

  #[test]
  fn repeated_identifier_reuses_register() {
    let code = lower_str("x=x+x;").unwrap();
    assert_eq!(
      code[0],
      Instruction::Compute {
        op: ArithOp::Add,
        lhs: r(0),
        rhs: r(0),
        to: reg(1)
      }
    );
  }

  #[test]
  fn bare_expression_statement_still_emits_code() {
    let code = lower_str("1*2;").unwrap();
    assert_eq!(code.len(), 1);
    assert_eq!(code[0].to_string(), "r0 := 1 * 2");
  }

  #[test]
  fn bare_identifier_statement_binds_without_code() {
    let code = lower_str("a; b=1;").unwrap();
    assert_eq!(
      code,
      vec![Instruction::Copy {
        from: n("1"),
        to: reg(1)
      }]
    );
  }

  #[test]
  fn rejects_number_target() {
    assert_eq!(
      lower_str("2=3;").unwrap_err(),
      CompileError::AssignmentTarget {
        node_kind: "number literal"
      }
    );
  }

  #[test]
  fn rejects_arithmetic_target() {
    assert_eq!(
      lower_str("(a+b)=3;").unwrap_err(),
      CompileError::AssignmentTarget {
        node_kind: "arithmetic result"
      }
    );
  }

  #[test]
  fn assignment_result_is_assignable() {
    let code = lower_str("(a=1)=2;").unwrap();
    assert_eq!(code[1].to_string(), "r0 := 2");
  }

  #[test]
  fn long_chain_lowers_innermost_first() {
    let source = format!("a={};", vec!["1"; 100_000].join("+"));
    let code = lower_str(&source).unwrap();
    assert_eq!(code.len(), 100_000);
    assert_eq!(code[0].to_string(), "r1 := 1 + 1");
    assert_eq!(code[1].to_string(), "r2 := 1 + r1");
    assert_eq!(code[99_998].to_string(), "r99999 := 1 + r99998");
    assert_eq!(code[99_999].to_string(), "r0 := r99999");
  }

  #[test]
  fn long_assignment_chain_copies_through_every_target() {
    let code = lower_str(&format!("{}7;", "v=".repeat(50_000))).unwrap();
    assert_eq!(code.len(), 50_000);
    assert_eq!(code[0].to_string(), "r0 := 7");
    assert!(code[1..].iter().all(|i| i.to_string() == "r0 := r0"));
  }

  #[test]
  fn state_does_not_leak_between_programs() {
    let first = lower_str("a=1;").unwrap();
    let second = lower_str("a=1;").unwrap();
    assert_eq!(first, second);
  }
}
