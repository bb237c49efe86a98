use crate::op::Op;

/// A decoded instruction. `arg` is zero for opcodes without an immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub arg: i64,
}

impl Instruction {
    pub const fn new(op: Op) -> Self {
        Self { op, arg: 0 }
    }

    pub const fn with_arg(op: Op, arg: i64) -> Self {
        Self { op, arg }
    }

    /// Number of code words the instruction occupies.
    pub const fn width(self) -> usize {
        if self.op.has_argument() { 2 } else { 1 }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.op.has_argument() {
            write!(f, "{} {}", self.op, self.arg)
        } else {
            write!(f, "{}", self.op)
        }
    }
}
