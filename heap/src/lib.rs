mod error;
mod heap;

pub use error::HeapError;
pub use heap::*;
