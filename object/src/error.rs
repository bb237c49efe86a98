use crate::ObjectKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// The variant does not support the requested capability.
    InvalidOperation {
        kind: ObjectKind,
        operation: &'static str,
    },
    InvalidOffset {
        kind: ObjectKind,
        offset: i64,
        size: usize,
    },
    /// A scalar was stored where a handle is required, or the reverse.
    SlotMismatch {
        kind: ObjectKind,
        offset: usize,
    },
}

impl std::fmt::Display for ObjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectError::InvalidOperation { kind, operation } => {
                write!(f, "Invalid operation {operation} on {kind}")
            }
            ObjectError::InvalidOffset { kind, offset, size } => {
                write!(f, "Offset {offset} out of bound for {kind} of size {size}")
            }
            ObjectError::SlotMismatch { kind, offset } => {
                write!(f, "Slot {offset} of {kind} has the wrong tag")
            }
        }
    }
}

impl std::error::Error for ObjectError {}

/// Converts a stack-provided offset into an index below `size`.
pub(crate) fn checked_offset(
    kind: ObjectKind,
    offset: i64,
    size: usize,
) -> Result<usize, ObjectError> {
    usize::try_from(offset)
        .ok()
        .filter(|&index| index < size)
        .ok_or(ObjectError::InvalidOffset { kind, offset, size })
}
