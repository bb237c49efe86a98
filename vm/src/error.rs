use bytecode::ImageError;
use heap::HeapError;
use object::{HandleId, ObjectError};

/// Fatal errors. Any of these aborts the current `execute` call.
#[derive(Debug)]
pub enum RuntimeError {
    StackAccessOutOfBound,
    CodeAccessOutOfBound {
        offset: i64,
        block: String,
    },
    CodeBlockAccessOutOfBound {
        id: i64,
    },
    NativeAccessOutOfBound {
        id: i64,
    },
    /// The count word passed to a native does not match its arity.
    NativeArgumentCount {
        name: &'static str,
        expected: usize,
        found: i64,
    },
    /// A native returned a value when it has no output, or the reverse.
    NativeResultCount {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    InvalidFuncId {
        func_id: i64,
        handle: HandleId,
    },
    UnknownOpcode {
        opcode: i64,
    },
    DivisionByZero,
    /// A raised error code that no handler caught.
    UnhandledException {
        code: i64,
    },
    ConstAccessOutOfBound {
        index: i64,
        block: usize,
    },
    NotImplemented {
        name: &'static str,
    },
    UnsuitableArch,
    /// A program asked for more elements than can be allocated.
    OutOfMemory {
        count: usize,
    },
    Heap(HeapError),
    Image(ImageError),
    Io(std::io::Error),
}

impl RuntimeError {
    /// Stable kind name, printed before the message.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::StackAccessOutOfBound => "StackAccessOutOfBound",
            RuntimeError::CodeAccessOutOfBound { .. } => "CodeAccessOutOfBound",
            RuntimeError::CodeBlockAccessOutOfBound { .. } => "CodeBlockAccessOutOfBound",
            RuntimeError::NativeAccessOutOfBound { .. } => "NativeAccessOutOfBound",
            RuntimeError::NativeArgumentCount { .. } => "StackAccessOutOfBound",
            RuntimeError::NativeResultCount { .. } => "StackAccessOutOfBound",
            RuntimeError::InvalidFuncId { .. } => "InvalidFuncId",
            RuntimeError::UnknownOpcode { .. } => "UnknownOpcode",
            RuntimeError::DivisionByZero => "DivisionByZero",
            RuntimeError::UnhandledException { .. } => "Exception",
            RuntimeError::ConstAccessOutOfBound { .. } => "ConstAccessOutOfBound",
            RuntimeError::NotImplemented { .. } => "NotImplemented",
            RuntimeError::UnsuitableArch => "UnsuitableArch",
            RuntimeError::OutOfMemory { .. } => "OutOfMem",
            RuntimeError::Heap(err) => err.kind(),
            RuntimeError::Image(err) => err.kind(),
            RuntimeError::Io(_) => "IoError",
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::StackAccessOutOfBound => write!(f, "Stack access out of bound"),
            RuntimeError::CodeAccessOutOfBound { offset, block } => {
                write!(f, "Offset {offset} of block {block} out of bound")
            }
            RuntimeError::CodeBlockAccessOutOfBound { id } => {
                write!(f, "Code block id {id} out of bound")
            }
            RuntimeError::NativeAccessOutOfBound { id } => write!(f, "Native id {id} out of bound"),
            RuntimeError::NativeArgumentCount {
                name,
                expected,
                found,
            } => write!(f, "Native {name} takes {expected} arguments, got {found}"),
            RuntimeError::NativeResultCount {
                name,
                expected,
                found,
            } => write!(f, "Native {name} should produce {expected} results, produced {found}"),
            RuntimeError::InvalidFuncId { func_id, handle } => {
                write!(f, "Invalid func id {func_id} in ref id {handle}")
            }
            RuntimeError::UnknownOpcode { opcode } => write!(f, "Unknown opcode {opcode}"),
            RuntimeError::DivisionByZero => write!(f, "Division by zero"),
            RuntimeError::UnhandledException { code } => write!(f, "Exception {code}"),
            RuntimeError::ConstAccessOutOfBound { index, block } => {
                write!(f, "String constant {index} in code block {block} does not exist")
            }
            RuntimeError::NotImplemented { name } => {
                write!(f, "Native function {name} is not implemented")
            }
            RuntimeError::UnsuitableArch => {
                write!(f, "Integers and floats must both be 64 bits wide")
            }
            RuntimeError::OutOfMemory { count } => write!(f, "Can't alloc {count} elements"),
            RuntimeError::Heap(err) => write!(f, "{err}"),
            RuntimeError::Image(err) => write!(f, "{err}"),
            RuntimeError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Heap(err) => Some(err),
            RuntimeError::Image(err) => Some(err),
            RuntimeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HeapError> for RuntimeError {
    fn from(err: HeapError) -> Self {
        RuntimeError::Heap(err)
    }
}

impl From<ObjectError> for RuntimeError {
    fn from(err: ObjectError) -> Self {
        RuntimeError::Heap(HeapError::Object(err))
    }
}

impl From<ImageError> for RuntimeError {
    fn from(err: ImageError) -> Self {
        RuntimeError::Image(err)
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::Io(err)
    }
}
