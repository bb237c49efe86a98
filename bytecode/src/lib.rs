mod builder;
mod decoder;
mod image;
mod instruction;
mod loader;
mod op;

pub use builder::{CodeBuilder, Label};
pub use decoder::{CodeDecoder, DecodeError, decode_at};
pub use image::{CodeBlock, CodeImage};
pub use instruction::Instruction;
pub use loader::{ImageError, load_image, parse_image};
pub use op::{OPCODE_NO_ARG_MAX, Op};
