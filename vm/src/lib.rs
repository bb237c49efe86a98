mod error;
mod generator;
mod interpreter;
mod lang;
mod natives;
mod stack;

pub use error::RuntimeError;
pub use generator::SuspendedFrame;
pub use interpreter::{Interpreter, InterpreterCreateInfo};
pub use natives::{NATIVES, Native, NativeContext, NativeFunction, native_index};
pub use stack::{ExecutionStack, ExecutionStackInfo};
