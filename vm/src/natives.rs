use std::io::{Read, Write};

use heap::Heap;
use object::{Array, BasicArray, HandleId, HeapObject, Slot, Str};

use crate::RuntimeError;

mod array;
mod io;
mod math;
mod text;

pub type NativeFunction = fn(&mut NativeContext) -> Result<Option<Slot>, RuntimeError>;

// the count word on top of the stack does not count as input
#[derive(Debug, Copy, Clone)]
pub struct Native {
    pub name: &'static str,
    pub inputs: usize,
    pub outputs: usize,
    pub ptr: NativeFunction,
}

impl Native {
    pub const fn new(
        name: &'static str,
        inputs: usize,
        outputs: usize,
        ptr: NativeFunction,
    ) -> Self {
        Self {
            name,
            inputs,
            outputs,
            ptr,
        }
    }
}

/// What a native sees while it runs.
///
/// The arguments stay on the stack and remain owned by it: a native only
/// borrows them, and whatever it returns must be an owned slot (a handle it
/// created or retained).
pub struct NativeContext<'a> {
    pub heap: &'a mut Heap,
    pub args: &'a [Slot],
    pub output: &'a mut dyn Write,
    pub input: &'a mut dyn Read,
}

impl NativeContext<'_> {
    fn arg(&self, index: usize) -> Result<Slot, RuntimeError> {
        self.args
            .get(index)
            .copied()
            .ok_or(RuntimeError::StackAccessOutOfBound)
    }

    pub fn scalar(&self, index: usize) -> Result<i64, RuntimeError> {
        self.arg(index)?
            .as_scalar()
            .ok_or(RuntimeError::StackAccessOutOfBound)
    }

    pub fn float(&self, index: usize) -> Result<f64, RuntimeError> {
        self.arg(index)?
            .as_f64()
            .ok_or(RuntimeError::StackAccessOutOfBound)
    }

    pub fn handle(&self, index: usize) -> Result<HandleId, RuntimeError> {
        self.arg(index)?
            .as_handle()
            .ok_or(RuntimeError::StackAccessOutOfBound)
    }

    pub fn string(&self, index: usize) -> Result<&Str, RuntimeError> {
        Ok(self.heap.string(self.handle(index)?)?)
    }

    pub fn basic_array(&self, index: usize) -> Result<&BasicArray, RuntimeError> {
        Ok(self.heap.basic_array(self.handle(index)?)?)
    }

    pub fn array(&self, index: usize) -> Result<&Array, RuntimeError> {
        Ok(self.heap.array(self.handle(index)?)?)
    }

    /// Allocates a string result.
    pub fn new_string(&mut self, bytes: impl Into<Vec<u8>>) -> Slot {
        Slot::Handle(self.heap.add(HeapObject::Str(Str::new(bytes))))
    }

    /// Returns an argument handle as the result, which needs its own count.
    pub fn retained(&mut self, handle: HandleId) -> Result<Slot, RuntimeError> {
        self.heap.inc(handle)?;
        Ok(Slot::Handle(handle))
    }
}

/// Default native table, addressed by index from `CALL_NATIVE`.
pub const NATIVES: &[Native] = &[
    Native::new("GetChar_Char", 0, 1, io::get_char),
    Native::new("Write_Text", 1, 0, io::write_text),
    Native::new("Print_Text", 1, 0, io::print_text),
    Native::new("Print_Text_Func", 1, 1, io::print_text_func),
    Native::new("Text_Integer", 1, 1, text::text_integer),
    Native::new("Text_Real", 1, 1, text::text_real),
    Native::new("Text_Char", 1, 1, text::text_char),
    Native::new("Text_Boolean", 1, 1, text::text_boolean),
    Native::new("Length_BasicArray", 1, 1, array::length_basic_array),
    Native::new("LastIndex_BasicArray", 1, 1, array::last_index_basic_array),
    Native::new("Length_Array", 1, 1, array::length_array),
    Native::new("LastIndex_Array", 1, 1, array::last_index_array),
    Native::new("Length_Text", 1, 1, text::length_text),
    Native::new("IndexOfArray_Ref_Ref", 2, 1, array::index_of_array),
    Native::new("IndexOfBasicArray_Integer_Ref", 2, 1, array::index_of_basic_array),
    Native::new("Text_ArrayOfChar", 1, 1, text::text_array_of_char),
    Native::new("Text_ArrayOfInteger", 1, 1, text::text_array_of_integer),
    Native::new("Text_ArrayOfBoolean", 1, 1, text::text_array_of_integer),
    Native::new("Text_ArrayOfText", 1, 1, text::text_array_of_text),
    Native::new("Concat_Text_Text", 2, 1, text::concat_text),
    Native::new("Subtext_Text_Integer_Integer", 3, 1, text::subtext),
    Native::new("Subtext_Text_Integer", 2, 1, text::subtext_to_end),
    Native::new("Trim_Integer", 1, 1, text::trim_integer),
    Native::new("CharCode_Text_Integer", 2, 1, text::char_code),
    Native::new("CharAt_Text_Integer", 2, 1, text::char_code),
    Native::new("IndexOf_Char_Text", 2, 1, text::index_of_char),
    Native::new("IndexOf_Text_Text", 2, 1, text::index_of_text),
    Native::new("Split_Text_Text", 2, 1, text::split_text),
    Native::new("SliceBasicArray", 3, 1, array::slice_basic_array),
    Native::new("SliceArray", 3, 1, array::slice_array),
    Native::new("InBasicArray", 2, 1, array::in_basic_array),
    Native::new("InArray", 2, 1, array::in_array),
    Native::new("ConcatBasicArray", 2, 1, array::concat_basic_array),
    Native::new("ConcatArray", 2, 1, array::concat_array),
    Native::new("Abs_Integer", 1, 1, math::abs_integer),
    Native::new("Real_Integer", 1, 1, math::real_integer),
    Native::new("Sqrt_Real", 1, 1, math::sqrt_real),
    Native::new("Log_Real", 1, 1, math::log_real),
    Native::new("Now", 0, 1, math::now),
    Native::new("Random_Integer_Integer", 2, 1, math::random_integer),
    Native::new("Integer_Text", 1, 1, text::integer_text),
    Native::new("Ceil_Real", 1, 1, math::ceil_real),
    Native::new("Floor_Real", 1, 1, math::floor_real),
];

/// Looks a native up by name, mostly for assembling test programs.
#[must_use]
pub fn native_index(natives: &[Native], name: &str) -> Option<usize> {
    natives.iter().position(|native| native.name == name)
}
