use crate::{instruction::Instruction, op::Op};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnknownOpcode { opcode: i64, offset: usize },
    /// A has-argument opcode is the last word of the block.
    MissingArgument { op: Op, offset: usize },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnknownOpcode { opcode, offset } => {
                write!(f, "Unknown opcode {opcode} at offset {offset}")
            }
            DecodeError::MissingArgument { op, offset } => {
                write!(f, "Missing argument of {op} at offset {offset}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes the instruction starting at `offset` and returns it together
/// with the offset of the following instruction.
///
/// Returns `None` when `offset` is at or past the end of the block.
#[inline(always)]
pub fn decode_at(
    code: &[i64],
    offset: usize,
) -> Option<Result<(Instruction, usize), DecodeError>> {
    let word = *code.get(offset)?;
    let op = match Op::try_from(word) {
        Ok(op) => op,
        Err(opcode) => return Some(Err(DecodeError::UnknownOpcode { opcode, offset })),
    };
    if !op.has_argument() {
        return Some(Ok((Instruction::new(op), offset + 1)));
    }
    Some(match code.get(offset + 1) {
        Some(&arg) => Ok((Instruction::with_arg(op, arg), offset + 2)),
        None => Err(DecodeError::MissingArgument { op, offset }),
    })
}

/// Sequential decoder over a block, used for listings.
pub struct CodeDecoder<'a> {
    code: &'a [i64],
    pos: usize,
}

impl<'a> CodeDecoder<'a> {
    pub fn new(code: &'a [i64]) -> Self {
        Self { code, pos: 0 }
    }

    /// Current word offset.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl Iterator for CodeDecoder<'_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match decode_at(self.code, self.pos)? {
            Ok((instr, next)) => {
                self.pos = next;
                Some(Ok(instr))
            }
            Err(err) => {
                self.pos = self.code.len();
                Some(Err(err))
            }
        }
    }
}
