use object::{HandleId, ObjectError, ObjectKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// The handle is out of range or names a freed slot.
    InvalidHandle { handle: HandleId },
    WrongVariant {
        handle: HandleId,
        expected: ObjectKind,
        found: ObjectKind,
    },
    Object(ObjectError),
}

impl HeapError {
    /// Stable kind name used when reporting fatal errors.
    pub fn kind(&self) -> &'static str {
        match self {
            HeapError::InvalidHandle { .. } => "InvalidRefId",
            HeapError::WrongVariant { .. } => "InvalidRefType",
            HeapError::Object(ObjectError::InvalidOperation { .. }) => "InvalidOperation",
            HeapError::Object(ObjectError::InvalidOffset { .. }) => "InvalidOffset",
            HeapError::Object(ObjectError::SlotMismatch { .. }) => "InvalidOffset",
        }
    }
}

impl std::fmt::Display for HeapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeapError::InvalidHandle { handle } => write!(f, "Invalid ref id {handle}"),
            HeapError::WrongVariant {
                handle,
                expected,
                found,
            } => write!(f, "Ref id {handle} is a {found}, expected {expected}"),
            HeapError::Object(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for HeapError {}

impl From<ObjectError> for HeapError {
    fn from(err: ObjectError) -> Self {
        HeapError::Object(err)
    }
}
