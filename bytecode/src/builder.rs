use crate::{image::CodeBlock, op::Op};

/// A forward jump whose target has not yet been resolved.
///
/// Created by [`CodeBuilder::jump`]. Resolve it with [`CodeBuilder::bind`].
#[derive(Debug)]
#[must_use]
pub struct Label {
    /// Position of the argument word to patch.
    arg_pos: usize,
}

/// Assembles a [`CodeBlock`] word by word.
pub struct CodeBuilder {
    block: CodeBlock,
}

impl CodeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            block: CodeBlock::new(name, Vec::new()),
        }
    }

    /// Current word offset, usable as an absolute jump target.
    pub fn current_offset(&self) -> i64 {
        self.block.code.len() as i64
    }

    pub fn build(self) -> CodeBlock {
        self.block
    }

    // ── emit helpers ───────────────────────────────────────────────

    pub fn op(&mut self, op: Op) -> &mut Self {
        debug_assert!(!op.has_argument(), "{op} needs an argument");
        self.block.code.push(op.code());
        self
    }

    pub fn op_arg(&mut self, op: Op, arg: i64) -> &mut Self {
        debug_assert!(op.has_argument(), "{op} takes no argument");
        self.block.code.push(op.code());
        self.block.code.push(arg);
        self
    }

    /// Emits a raw word, for malformed-code tests and custom encodings.
    pub fn word(&mut self, word: i64) -> &mut Self {
        self.block.code.push(word);
        self
    }

    /// `PUSH value`
    pub fn push(&mut self, value: i64) -> &mut Self {
        self.op_arg(Op::Push, value)
    }

    /// `PUSH` with the bit pattern of `value`.
    pub fn push_float(&mut self, value: f64) -> &mut Self {
        self.op_arg(Op::Push, value.to_bits() as i64)
    }

    // ── constants ──────────────────────────────────────────────────

    /// Adds a string to the pool and returns its index.
    pub fn string_constant(&mut self, value: impl Into<Vec<u8>>) -> i64 {
        self.block.strings.push(value.into());
        self.block.strings.len() as i64 - 1
    }

    pub fn float_constant(&mut self, value: f64) -> i64 {
        self.block.floats.push(value);
        self.block.floats.len() as i64 - 1
    }

    /// `CREATE_STRING` for a fresh pool entry.
    pub fn create_string(&mut self, value: impl Into<Vec<u8>>) -> &mut Self {
        let index = self.string_constant(value);
        self.op_arg(Op::CreateString, index)
    }

    // ── jumps ──────────────────────────────────────────────────────

    /// Emits a jump-like instruction (`JZ`, `JNZ`, `JMP` or
    /// `CREATE_EXCEPTION_HANDLER`) whose target is bound later.
    pub fn jump(&mut self, op: Op) -> Label {
        self.op_arg(op, -1);
        Label {
            arg_pos: self.block.code.len() - 1,
        }
    }

    /// Points `label` at the current offset.
    pub fn bind(&mut self, label: Label) {
        self.block.code[label.arg_pos] = self.current_offset();
    }
}
