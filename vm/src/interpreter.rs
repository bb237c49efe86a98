use std::io::{Read, Write};

use bytecode::{CodeBlock, CodeImage, DecodeError, Instruction, Op, decode_at};
use heap::{Heap, HeapSettings};
use log::{debug, info, trace, warn};
use object::{
    Array, BasicArray, ExceptionHandler, HandleId, HeapObject, Record, Slot, Str,
};

use crate::{
    ExecutionStack, ExecutionStackInfo, NATIVES, Native, NativeContext, RuntimeError,
};

/// Construction parameters for an [`Interpreter`].
#[derive(Debug, Clone)]
pub struct InterpreterCreateInfo {
    pub stack_size: usize,
    pub heap: HeapSettings,
    pub natives: &'static [Native],
}

impl Default for InterpreterCreateInfo {
    fn default() -> Self {
        Self {
            stack_size: 1024,
            heap: HeapSettings::default(),
            natives: NATIVES,
        }
    }
}

/// One machine: a stack, a heap and the registers that walk a code image.
pub struct Interpreter<'img> {
    image: &'img CodeImage,
    pub heap: Heap,
    pub stack: ExecutionStack,
    natives: &'static [Native],
    pub(crate) code_block: usize,
    pub(crate) ip: usize,
    output: Box<dyn Write>,
    input: Box<dyn Read>,
}

impl<'img> Interpreter<'img> {
    pub fn new(image: &'img CodeImage, info: &InterpreterCreateInfo) -> Result<Self, RuntimeError> {
        if size_of::<i64>() != 8 || size_of::<f64>() != 8 {
            return Err(RuntimeError::UnsuitableArch);
        }
        Ok(Self {
            image,
            heap: Heap::new(&info.heap),
            stack: ExecutionStack::new(&ExecutionStackInfo {
                stack_size: info.stack_size,
            }),
            natives: info.natives,
            code_block: image.entry,
            ip: 0,
            output: Box::new(std::io::stdout()),
            input: Box::new(std::io::stdin()),
        })
    }

    /// Redirects native text output.
    #[must_use]
    pub fn with_output(mut self, output: Box<dyn Write>) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_input(mut self, input: Box<dyn Read>) -> Self {
        self.input = input;
        self
    }

    #[inline(always)]
    pub fn code_block(&self) -> usize {
        self.code_block
    }

    #[inline(always)]
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Runs `block` from its first instruction until the instruction
    /// pointer leaves whichever block is current.
    pub fn execute(&mut self, block: usize) -> Result<(), RuntimeError> {
        let name = &self.block(block as i64)?.name;
        info!("execute block {block} ({name})");
        self.code_block = block;
        self.ip = 0;
        let result = self.run();
        if let Err(err) = &result {
            warn!(
                "{}: {err} (block {}, ip {}, sp {}, bp {})",
                err.kind(),
                self.code_block,
                self.ip,
                self.stack.sp(),
                self.stack.bp()
            );
        }
        result
    }

    pub(crate) fn block(&self, id: i64) -> Result<&'img CodeBlock, RuntimeError> {
        usize::try_from(id)
            .ok()
            .and_then(|id| self.image.block(id))
            .ok_or(RuntimeError::CodeBlockAccessOutOfBound { id })
    }

    #[inline(always)]
    fn current_block(&self) -> Result<&'img CodeBlock, RuntimeError> {
        self.block(self.code_block as i64)
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let block = self.current_block()?;
            let (instruction, next) = match decode_at(&block.code, self.ip) {
                None => return Ok(()),
                Some(Ok(decoded)) => decoded,
                Some(Err(DecodeError::UnknownOpcode { opcode, .. })) => {
                    return Err(RuntimeError::UnknownOpcode { opcode });
                }
                Some(Err(DecodeError::MissingArgument { offset, .. })) => {
                    return Err(RuntimeError::CodeAccessOutOfBound {
                        offset: offset as i64 + 1,
                        block: block.name.clone(),
                    });
                }
            };
            trace!(
                "sp: {}, bp: {}, block: {}, ip: {}, live: {}   {instruction}",
                self.stack.sp(),
                self.stack.bp(),
                self.code_block,
                self.ip,
                self.heap.live_count()
            );
            self.ip = next;
            self.dispatch(instruction)?;
        }
    }

    fn dispatch(&mut self, instruction: Instruction) -> Result<(), RuntimeError> {
        let arg = instruction.arg;
        match instruction.op {
            Op::Debug => {
                debug!(
                    "sp: {}, bp: {}, block: {}, ip: {}, live: {}, stack handles: {}",
                    self.stack.sp(),
                    self.stack.bp(),
                    self.code_block,
                    self.ip,
                    self.heap.live_count(),
                    self.stack.handle_count()
                );
            }
            Op::Dup => {
                let top = self.stack.peek(0)?;
                self.heap.retain(top)?;
                self.stack.push(top);
            }
            Op::Swap => {
                let a = self.stack.index_of(1)?;
                let upper = self.stack.peek(0)?;
                let lower = self.stack.set(a, upper)?;
                self.stack.set_nth(0, lower)?;
            }

            // ── Integer arithmetic ─────────────────────────────────
            Op::Add => self.binary(|a, b| Slot::Scalar(a.wrapping_add(b)))?,
            Op::Sub => self.binary(|a, b| Slot::Scalar(a.wrapping_sub(b)))?,
            Op::Mul => self.binary(|a, b| Slot::Scalar(a.wrapping_mul(b)))?,
            Op::Div => {
                self.stack.require(2)?;
                if self.stack.peek_scalar(0)? == 0 {
                    return self.raise_division_by_zero();
                }
                self.binary(|a, b| Slot::Scalar(a.wrapping_div(b)))?;
            }
            Op::Rem => {
                self.stack.require(2)?;
                if self.stack.peek_scalar(0)? == 0 {
                    return self.raise_division_by_zero();
                }
                self.binary(|a, b| Slot::Scalar(a.wrapping_rem(b)))?;
            }
            Op::Neg => self.unary(|a| Slot::Scalar(a.wrapping_neg()))?,
            Op::Gt => self.binary(|a, b| Slot::from_bool(a > b))?,
            Op::Lt => self.binary(|a, b| Slot::from_bool(a < b))?,
            Op::Gte => self.binary(|a, b| Slot::from_bool(a >= b))?,
            Op::Lte => self.binary(|a, b| Slot::from_bool(a <= b))?,
            Op::Eq => self.binary(|a, b| Slot::from_bool(a == b))?,
            Op::Ne => self.binary(|a, b| Slot::from_bool(a != b))?,
            Op::And => self.binary(|a, b| Slot::from_bool(a != 0 && b != 0))?,
            Op::Or => self.binary(|a, b| Slot::from_bool(a != 0 || b != 0))?,
            Op::Not => self.unary(|a| Slot::from_bool(a == 0))?,

            // ── Float arithmetic ───────────────────────────────────
            Op::AddF => self.binary_f(|a, b| Slot::from_f64(a + b))?,
            Op::SubF => self.binary_f(|a, b| Slot::from_f64(a - b))?,
            Op::MulF => self.binary_f(|a, b| Slot::from_f64(a * b))?,
            Op::DivF => self.binary_f(|a, b| Slot::from_f64(a / b))?,
            Op::NegF => self.unary(|a| Slot::from_f64(-f64::from_bits(a as u64)))?,
            Op::GtF => self.binary_f(|a, b| Slot::from_bool(a > b))?,
            Op::LtF => self.binary_f(|a, b| Slot::from_bool(a < b))?,
            Op::GteF => self.binary_f(|a, b| Slot::from_bool(a >= b))?,
            Op::LteF => self.binary_f(|a, b| Slot::from_bool(a <= b))?,
            Op::EqF => self.binary_f(|a, b| Slot::from_bool(a == b))?,
            Op::NeF => self.binary_f(|a, b| Slot::from_bool(a != b))?,

            Op::EqRef => {
                let b = self.stack.peek_handle(0)?;
                let a = self.stack.peek_handle(1)?;
                let equal = self.heap.compare(a, b)?;
                self.heap.dec(a)?;
                self.heap.dec(b)?;
                self.stack.pop()?;
                self.stack.set_nth(0, Slot::from_bool(equal))?;
            }

            // ── Element access ─────────────────────────────────────
            Op::PushPtrOffset => self.push_ptr_offset(false)?,
            Op::PushPtrOffsetForMutate => self.push_ptr_offset(true)?,
            Op::PopPtrOffset => {
                let value = self.stack.peek(0)?;
                let offset = self.stack.peek_scalar(1)?;
                let container = self.stack.peek_handle(2)?;
                self.heap.set_offset(container, offset, value)?;
                self.stack.set_sp(self.stack.sp() - 3)?;
                self.heap.dec(container)?;
            }

            // ── Control ────────────────────────────────────────────
            Op::Raise => {
                let code = self.stack.peek_scalar(0)?;
                if !self.raise(code)? {
                    return Err(RuntimeError::UnhandledException { code });
                }
            }
            Op::RetVal => {
                let arg_count = self.arg_count()?;
                self.leave_frame(1 + arg_count, 1)?;
            }
            Op::Ret => {
                let arg_count = self.arg_count()?;
                self.leave_frame(1 + arg_count, 0)?;
            }
            Op::Yield => self.yield_value()?,
            Op::YieldDone => self.yield_done()?,
            Op::Next => self.resume_generator()?,
            Op::Ended => self.generator_ended()?,
            Op::Jz => {
                let target = self.jump_target(arg)?;
                let condition = self.stack.peek_scalar(0)?;
                self.stack.pop()?;
                if condition == 0 {
                    self.ip = target;
                }
            }
            Op::Jnz => {
                let target = self.jump_target(arg)?;
                let condition = self.stack.peek_scalar(0)?;
                self.stack.pop()?;
                if condition != 0 {
                    self.ip = target;
                }
            }
            Op::Jmp => self.ip = self.jump_target(arg)?,
            Op::Call => {
                let target = self.block(arg)?;
                self.call(arg as usize, &target.name);
            }
            Op::CallAbstract => self.call_abstract(arg)?,
            Op::CallNative => self.call_native(arg)?,
            Op::InitGenerator => self.init_generator(arg)?,
            Op::CreateExceptionHandler => {
                let target = self.jump_target(arg)?;
                let handler = ExceptionHandler::new(self.code_block, target, self.stack.bp());
                let handle = self.heap.add(HeapObject::ExceptionHandler(handler));
                self.stack.push(Slot::Handle(handle));
            }

            // ── Stack addressing ───────────────────────────────────
            Op::Push => self.stack.push(Slot::Scalar(arg)),
            Op::PushGlobal => self.push_copy(self.stack.absolute(arg)?)?,
            Op::PushGlobalForMutate => self.push_mutable(self.stack.absolute(arg)?)?,
            Op::PushLocal => self.push_copy(self.stack.local(arg)?)?,
            Op::PushLocalForMutate => self.push_mutable(self.stack.local(arg)?)?,
            Op::PushIndirection => {
                let index = (self.stack.bp() as i64).wrapping_add(arg);
                self.stack.push(Slot::Scalar(index));
            }
            Op::PushIndirect => {
                let index = self.indirect(arg)?;
                self.push_copy(index)?;
            }
            Op::PushIndirectForMutate => {
                let index = self.indirect(arg)?;
                self.push_mutable(index)?;
            }
            Op::PopGlobal => {
                let index = self.stack.absolute(arg)?;
                self.pop_into(index)?;
            }
            Op::PopLocal => {
                let index = self.stack.local(arg)?;
                self.pop_into(index)?;
            }
            Op::PopIndirect => {
                let index = self.indirect(arg)?;
                self.pop_into(index)?;
            }
            Op::PopVoid => {
                let count = self.count(arg)?;
                let sp = self.stack.sp();
                self.release_range(sp - count, sp)?;
                self.stack.set_sp(sp - count)?;
            }

            // ── Object creation ────────────────────────────────────
            Op::CreateString => {
                let bytes = usize::try_from(arg)
                    .ok()
                    .and_then(|index| self.current_block().ok()?.strings.get(index))
                    .ok_or(RuntimeError::ConstAccessOutOfBound {
                        index: arg,
                        block: self.code_block,
                    })?;
                let handle = self.heap.add(HeapObject::Str(Str::new(bytes.clone())));
                self.stack.push(Slot::Handle(handle));
            }
            Op::CreateRecord => {
                let count = self.count(arg)?;
                let base = self.stack.sp() - count;
                let record = Record::from_slots(self.stack.range(base, base + count)?);
                self.replace_top(count, HeapObject::Record(record))?;
            }
            Op::CreateBasicArray => {
                let count = self.count(arg)?;
                let base = self.stack.sp() - count;
                let items = (base..base + count)
                    .map(|index| self.stack.scalar_at(index))
                    .collect::<Result<Vec<_>, _>>()?;
                self.replace_top(count, HeapObject::BasicArray(BasicArray::new(items)))?;
            }
            Op::CreateArray => {
                let count = self.count(arg)?;
                let base = self.stack.sp() - count;
                let items = (base..base + count)
                    .map(|index| self.stack.handle_at(index))
                    .collect::<Result<Vec<_>, _>>()?;
                self.replace_top(count, HeapObject::Array(Array::new(items)))?;
            }
            Op::BasicArrayTimes => {
                let count = self.stack.peek_scalar(0)?.max(0) as usize;
                let value = self.stack.peek_scalar(1)?;
                let mut items = reserve(count)?;
                items.resize(count, value);
                let handle = self.heap.add(HeapObject::BasicArray(BasicArray::new(items)));
                self.stack.pop()?;
                self.stack.set_nth(0, Slot::Handle(handle))?;
            }
            Op::ArrayTimes => {
                let count = self.stack.peek_scalar(0)?.max(0) as usize;
                let item = self.stack.peek_handle(1)?;
                self.heap.get(item)?;
                let mut items = reserve(count)?;
                items.resize(count, item);
                // the stack's count moves into the first element
                match count {
                    0 => self.heap.dec(item)?,
                    n => self.heap.add_count(item, n - 1)?,
                }
                let handle = self.heap.add(HeapObject::Array(Array::new(items)));
                self.stack.pop()?;
                self.stack.set_nth(0, Slot::Handle(handle))?;
            }

            Op::ConcatString => self.concat_string()?,
            Op::CreateBlob => self.create_blob()?,
            Op::ReadBlob => self.read_blob()?,
            Op::WriteBlob => self.write_blob()?,
            Op::ConcatBlob => self.concat_blob()?,
            Op::GetBlobMutableOffset => self.get_blob_mutable_offset()?,
            Op::GetBlobSize => self.get_blob_size()?,
            Op::GetBlobIndexOfItem => self.get_blob_index_of_item()?,
            Op::SliceBlob => self.slice_blob()?,
            Op::CreateBlobRepeatItem => self.create_blob_repeat_item()?,
        }
        Ok(())
    }

    // ── Operand helpers ────────────────────────────────────────────

    #[inline(always)]
    fn binary(&mut self, f: impl FnOnce(i64, i64) -> Slot) -> Result<(), RuntimeError> {
        let b = self.stack.peek_scalar(0)?;
        let a = self.stack.peek_scalar(1)?;
        self.stack.pop()?;
        self.stack.set_nth(0, f(a, b))?;
        Ok(())
    }

    #[inline(always)]
    fn binary_f(&mut self, f: impl FnOnce(f64, f64) -> Slot) -> Result<(), RuntimeError> {
        self.binary(|a, b| f(f64::from_bits(a as u64), f64::from_bits(b as u64)))
    }

    #[inline(always)]
    fn unary(&mut self, f: impl FnOnce(i64) -> Slot) -> Result<(), RuntimeError> {
        let a = self.stack.peek_scalar(0)?;
        self.stack.set_nth(0, f(a))?;
        Ok(())
    }

    /// A count operand that must fit in the live stack.
    pub(crate) fn count(&self, count: i64) -> Result<usize, RuntimeError> {
        let count = usize::try_from(count).map_err(|_| RuntimeError::StackAccessOutOfBound)?;
        self.stack.require(count)?;
        Ok(count)
    }

    fn jump_target(&self, target: i64) -> Result<usize, RuntimeError> {
        usize::try_from(target).map_err(|_| RuntimeError::CodeAccessOutOfBound {
            offset: target,
            block: self
                .current_block()
                .map(|block| block.name.clone())
                .unwrap_or_default(),
        })
    }

    /// Absolute index stored in local `offset`.
    fn indirect(&self, offset: i64) -> Result<usize, RuntimeError> {
        let holder = self.stack.local(offset)?;
        self.stack.absolute(self.stack.scalar_at(holder)?)
    }

    /// Releases every handle in `[start, end)` and leaves zeros behind.
    pub(crate) fn release_range(&mut self, start: usize, end: usize) -> Result<(), RuntimeError> {
        for index in start..end {
            let slot = self.stack.take(index)?;
            self.heap.release(slot)?;
        }
        Ok(())
    }

    /// Replaces the top `count` slots, whose ownership has moved into
    /// `object`, with a handle to it.
    pub(crate) fn replace_top(&mut self, count: usize, object: HeapObject) -> Result<(), RuntimeError> {
        let handle = self.heap.add(object);
        self.stack.set_sp(self.stack.sp() - count)?;
        self.stack.push(Slot::Handle(handle));
        Ok(())
    }

    fn push_copy(&mut self, index: usize) -> Result<(), RuntimeError> {
        let slot = self.stack.get(index)?;
        self.heap.retain(slot)?;
        self.stack.push(slot);
        Ok(())
    }

    /// Makes the handle at `index` exclusively owned before pushing a copy.
    fn push_mutable(&mut self, index: usize) -> Result<(), RuntimeError> {
        let handle = self.stack.handle_at(index)?;
        let mutable = self.heap.make_mutable(handle)?;
        self.stack.set(index, Slot::Handle(mutable))?;
        self.push_copy(index)
    }

    fn pop_into(&mut self, index: usize) -> Result<(), RuntimeError> {
        if index + 1 >= self.stack.sp() {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        let value = self.stack.pop()?;
        let old = self.stack.set(index, value)?;
        self.heap.release(old)?;
        Ok(())
    }

    fn push_ptr_offset(&mut self, for_mutate: bool) -> Result<(), RuntimeError> {
        let offset = self.stack.peek_scalar(0)?;
        let container = self.stack.peek_handle(1)?;
        let element = self.heap.get_offset(container, offset, for_mutate)?;
        self.heap.retain(element)?;
        self.stack.pop()?;
        self.stack.set_nth(0, element)?;
        self.heap.dec(container)?;
        Ok(())
    }

    // ── Frames ─────────────────────────────────────────────────────

    /// Pushes the linkage of the current frame and enters `target` at 0.
    pub(crate) fn call(&mut self, target: usize, name: &str) {
        debug!("call block {target} ({name}) from {}:{}", self.code_block, self.ip);
        self.push_linkage();
        self.code_block = target;
        self.ip = 0;
    }

    pub(crate) fn push_linkage(&mut self) {
        self.stack.ensure(3);
        self.stack.push(Slot::Scalar(self.code_block as i64));
        self.stack.push(Slot::Scalar(self.ip as i64));
        self.stack.push(Slot::Scalar(self.stack.bp() as i64));
        self.stack.set_bp(self.stack.sp());
    }

    /// Argument count stored right below the frame linkage.
    fn arg_count(&self) -> Result<usize, RuntimeError> {
        let bp = self.stack.bp();
        if bp < 4 {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        let count = self.stack.scalar_at(bp - 4)?;
        usize::try_from(count).map_err(|_| RuntimeError::StackAccessOutOfBound)
    }

    /// Unwinds the current frame.
    ///
    /// `below` counts the slots under the linkage that belong to the frame
    /// (arguments and the count word, or the generator handle). Everything
    /// from there up to the `results` on top is released, the results move
    /// down to take its place and the caller's registers are restored.
    pub(crate) fn leave_frame(&mut self, below: usize, results: usize) -> Result<(), RuntimeError> {
        let bp = self.stack.bp();
        let sp = self.stack.sp();
        if bp < 3 + below || bp > sp || sp - bp < results {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        let code_block = self.stack.scalar_at(bp - 3)?;
        let ip = self.stack.scalar_at(bp - 2)?;
        let previous_bp = self.stack.scalar_at(bp - 1)?;
        let (Ok(code_block), Ok(ip), Ok(previous_bp)) = (
            usize::try_from(code_block),
            usize::try_from(ip),
            usize::try_from(previous_bp),
        ) else {
            return Err(RuntimeError::StackAccessOutOfBound);
        };

        let start = bp - 3 - below;
        self.release_range(start, sp - results)?;
        for k in 0..results {
            let result = self.stack.take(sp - results + k)?;
            self.stack.set(start + k, result)?;
        }
        self.stack.set_sp(start + results)?;
        self.stack.set_bp(previous_bp);
        self.code_block = code_block;
        self.ip = ip;
        debug!("return to {code_block}:{ip} with {results} results");
        Ok(())
    }

    fn call_abstract(&mut self, func_id: i64) -> Result<(), RuntimeError> {
        let handle = self.stack.peek_handle(1)?;
        let record = self.heap.record(handle)?;
        let invalid = RuntimeError::InvalidFuncId { func_id, handle };
        let slot = match func_id.checked_mul(2).and_then(|n| n.checked_add(1)) {
            Some(slot) if func_id >= 0 && (slot as usize) < record.total_size() => slot,
            _ => return Err(invalid),
        };
        let Slot::Scalar(target) = record.get(slot)? else {
            return Err(invalid);
        };
        let block = self.block(target)?;
        let concrete = record.get(0)?;

        self.heap.retain(concrete)?;
        self.heap.dec(handle)?;
        self.stack.set_nth(1, concrete)?;
        self.call(target as usize, &block.name);
        Ok(())
    }

    fn call_native(&mut self, id: i64) -> Result<(), RuntimeError> {
        let native = usize::try_from(id)
            .ok()
            .and_then(|id| self.natives.get(id))
            .ok_or(RuntimeError::NativeAccessOutOfBound { id })?;
        let found = self.stack.peek_scalar(0)?;
        if found != native.inputs as i64 {
            return Err(RuntimeError::NativeArgumentCount {
                name: native.name,
                expected: native.inputs,
                found,
            });
        }
        let sp = self.stack.sp();
        let base = sp - self.count(found + 1)?;
        trace!("native {} with {} args", native.name, native.inputs);

        let result = {
            let mut ctx = NativeContext {
                heap: &mut self.heap,
                args: self.stack.range(base, sp - 1)?,
                output: &mut *self.output,
                input: &mut *self.input,
            };
            (native.ptr)(&mut ctx)?
        };
        let produced = usize::from(result.is_some());
        if produced != native.outputs {
            if let Some(result) = result {
                self.heap.release(result)?;
            }
            return Err(RuntimeError::NativeResultCount {
                name: native.name,
                expected: native.outputs,
                found: produced,
            });
        }
        self.release_range(base, sp)?;
        self.stack.set_sp(base)?;
        if let Some(result) = result {
            self.stack.push(result);
        }
        Ok(())
    }

    // ── Exceptions ─────────────────────────────────────────────────

    /// Unwinds to the nearest exception handler, releasing every handle on
    /// the way. Returns `false` when the stack ran out first.
    pub fn raise(&mut self, code: i64) -> Result<bool, RuntimeError> {
        debug!("raise {code}");
        while self.stack.sp() > 0 {
            let Slot::Handle(handle) = self.stack.pop()? else {
                continue;
            };
            if let HeapObject::ExceptionHandler(handler) = self.heap.get(handle)? {
                let handler = *handler;
                self.heap.dec(handle)?;
                self.stack.set_bp(handler.bp);
                self.code_block = handler.code_block;
                self.ip = handler.ip;
                self.stack.push(Slot::Scalar(code));
                debug!("caught {code} at {}:{}", handler.code_block, handler.ip);
                return Ok(true);
            }
            self.heap.dec(handle)?;
        }
        Ok(false)
    }

    fn raise_division_by_zero(&mut self) -> Result<(), RuntimeError> {
        if self.raise(0)? {
            Ok(())
        } else {
            Err(RuntimeError::DivisionByZero)
        }
    }

    pub(crate) fn release_handle(&mut self, handle: HandleId) -> Result<(), RuntimeError> {
        Ok(self.heap.dec(handle)?)
    }
}

/// An empty vector with room for `count` elements. Fails instead of
/// aborting when the request cannot be met.
pub(crate) fn reserve<T>(count: usize) -> Result<Vec<T>, RuntimeError> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(count)
        .map_err(|_| RuntimeError::OutOfMemory { count })?;
    Ok(items)
}

impl Drop for Interpreter<'_> {
    fn drop(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use bytecode::CodeBuilder;
    use heap::HeapError;
    use object::ObjectError;

    use super::*;
    use crate::native_index;

    /// Output sink the test keeps a handle to after the interpreter takes it.
    #[derive(Clone, Default)]
    struct SharedOutput(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn image(blocks: Vec<CodeBuilder>) -> CodeImage {
        CodeImage::new(blocks.into_iter().map(CodeBuilder::build).collect(), 0)
    }

    fn interpreter(image: &CodeImage) -> Interpreter<'_> {
        Interpreter::new(image, &InterpreterCreateInfo::default()).expect("interpreter")
    }

    fn native(name: &str) -> i64 {
        native_index(NATIVES, name).expect("native") as i64
    }

    fn handle(vm: &Interpreter<'_>, index: usize) -> HandleId {
        vm.stack.handle_at(index).expect("handle")
    }

    // ── Calls ──────────────────────────────────────────────────────

    #[test]
    fn call_and_return_value() {
        let mut main = CodeBuilder::new("main");
        main.push(40).push(2).push(2).op_arg(Op::Call, 1);
        let mut add = CodeBuilder::new("add");
        add.op_arg(Op::PushLocal, -6)
            .op_arg(Op::PushLocal, -5)
            .op(Op::Add)
            .op(Op::RetVal);
        let image = image(vec![main, add]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.active(), [Slot::Scalar(42)]);
        assert_eq!(vm.stack.bp(), 0);
        assert_eq!(vm.code_block(), 0);
        assert_eq!(vm.ip(), image.blocks[0].len());
    }

    #[test]
    fn procedure_return_releases_arguments() {
        let mut main = CodeBuilder::new("main");
        main.create_string("arg").push(1).op_arg(Op::Call, 1);
        let mut proc = CodeBuilder::new("proc");
        proc.create_string("local").op(Op::Ret);
        let image = image(vec![main, proc]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.sp(), 0);
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn closed_sequence_keeps_live_count() {
        let mut main = CodeBuilder::new("main");
        main.create_string("abcd")
            .push(1)
            .op_arg(Op::Call, 1)
            .op_arg(Op::PopVoid, 1);
        let mut length = CodeBuilder::new("length");
        length
            .op_arg(Op::PushLocal, -5)
            .push(1)
            .op_arg(Op::CallNative, native("Length_Text"))
            .op(Op::RetVal);
        let image = image(vec![main, length]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.sp(), 0);
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn call_abstract_dispatches_on_record() {
        let mut main = CodeBuilder::new("main");
        main.create_string("self")
            .push(1)
            .op_arg(Op::CreateRecord, 2)
            .push(1)
            .op_arg(Op::CallAbstract, 0);
        let mut method = CodeBuilder::new("method");
        method
            .op_arg(Op::PushLocal, -5)
            .push(1)
            .op_arg(Op::CallNative, native("Length_Text"))
            .op(Op::RetVal);
        let image = image(vec![main, method]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.active(), [Slot::Scalar(4)]);
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn call_abstract_rejects_unknown_func() {
        let mut main = CodeBuilder::new("main");
        main.create_string("self")
            .push(1)
            .op_arg(Op::CreateRecord, 2)
            .push(0)
            .op_arg(Op::CallAbstract, 3);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("func id out of range");
        assert!(matches!(err, RuntimeError::InvalidFuncId { func_id: 3, .. }));
    }

    #[test]
    fn call_to_missing_block_fails() {
        let mut main = CodeBuilder::new("main");
        main.push(0).op_arg(Op::Call, 9);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("no block 9");
        assert!(matches!(err, RuntimeError::CodeBlockAccessOutOfBound { id: 9 }));
    }

    // ── Copy on write ──────────────────────────────────────────────

    #[test]
    fn shared_element_is_copied_before_mutation() {
        let mut main = CodeBuilder::new("main");
        main.push(1)
            .push(2)
            .op_arg(Op::CreateBasicArray, 2)
            .op(Op::Dup)
            .op_arg(Op::CreateArray, 1)
            .op(Op::Swap)
            .op_arg(Op::CreateArray, 1)
            .op_arg(Op::PushGlobalForMutate, 0)
            .push(0)
            .op(Op::PushPtrOffsetForMutate)
            .push(0)
            .push(99)
            .op(Op::PopPtrOffset);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.sp(), 2);
        let first = vm.heap.array(handle(&vm, 0)).expect("array").items()[0];
        let second = vm.heap.array(handle(&vm, 1)).expect("array").items()[0];
        assert_ne!(first, second);
        assert_eq!(vm.heap.basic_array(first).expect("copy").items(), [99, 2]);
        assert_eq!(vm.heap.basic_array(second).expect("original").items(), [1, 2]);
        assert_eq!(vm.heap.ref_count(first).expect("count"), 1);
        assert_eq!(vm.heap.ref_count(second).expect("count"), 1);
    }

    #[test]
    fn exclusive_handle_is_mutated_in_place() {
        let mut main = CodeBuilder::new("main");
        main.push(1)
            .push(2)
            .op_arg(Op::CreateBasicArray, 2)
            .op_arg(Op::PushGlobalForMutate, 0)
            .push(0)
            .push(7)
            .op(Op::PopPtrOffset);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.heap.live_count(), 1);
        let array = handle(&vm, 0);
        assert_eq!(vm.heap.basic_array(array).expect("array").items(), [7, 2]);
        assert_eq!(vm.heap.ref_count(array).expect("count"), 1);
    }

    #[test]
    fn pop_local_replaces_and_releases() {
        let mut main = CodeBuilder::new("main");
        main.create_string("old")
            .create_string("new")
            .op_arg(Op::PopLocal, 0);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.heap.live_count(), 1);
        let text = vm.heap.string(handle(&vm, 0)).expect("string");
        assert_eq!(text.as_bytes(), b"new");
    }

    // ── Strings ────────────────────────────────────────────────────

    #[test]
    fn concat_string_frees_inputs() {
        let mut main = CodeBuilder::new("main");
        main.create_string("ab")
            .create_string("cd")
            .create_string("e")
            .push(3)
            .op(Op::ConcatString);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.sp(), 1);
        assert_eq!(vm.heap.live_count(), 1);
        let text = vm.heap.string(handle(&vm, 0)).expect("string");
        assert_eq!(text.as_bytes(), b"abcde");
    }

    #[test]
    fn eq_ref_compares_structurally() {
        let mut main = CodeBuilder::new("main");
        main.create_string("same")
            .create_string("same")
            .op(Op::EqRef)
            .create_string("same")
            .create_string("other")
            .op(Op::EqRef);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.active(), [Slot::Scalar(1), Slot::Scalar(0)]);
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn missing_string_constant() {
        let mut main = CodeBuilder::new("main");
        main.op_arg(Op::CreateString, 4);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("no constant 4");
        assert!(matches!(
            err,
            RuntimeError::ConstAccessOutOfBound { index: 4, block: 0 }
        ));
    }

    // ── Exceptions ─────────────────────────────────────────────────

    #[test]
    fn raise_unwinds_to_outer_handler() {
        let mut main = CodeBuilder::new("main");
        main.push(1).push(2).op_arg(Op::CreateBasicArray, 2);
        let catch = main.jump(Op::CreateExceptionHandler);
        main.push(0).op_arg(Op::Call, 1).push(100);
        main.bind(catch);
        let catch_ip = main.current_offset() as usize;
        let mut outer = CodeBuilder::new("outer");
        outer.push(0).op_arg(Op::Call, 2).op(Op::Ret);
        let mut inner = CodeBuilder::new("inner");
        inner
            .op_arg(Op::PushGlobal, 0)
            .create_string("temp")
            .push(7)
            .op(Op::Raise);
        let image = image(vec![main, outer, inner]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        let array = handle(&vm, 0);
        assert_eq!(vm.stack.active(), [Slot::Handle(array), Slot::Scalar(7)]);
        assert_eq!(vm.heap.ref_count(array).expect("count"), 1);
        assert_eq!(vm.heap.live_count(), 1);
        assert_eq!(vm.stack.bp(), 0);
        assert_eq!(vm.code_block(), 0);
        assert_eq!(vm.ip(), catch_ip);
    }

    #[test]
    fn unhandled_raise_is_fatal() {
        let mut main = CodeBuilder::new("main");
        main.create_string("x").push(3).op(Op::Raise);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("nobody catches");
        assert!(matches!(err, RuntimeError::UnhandledException { code: 3 }));
        assert_eq!(err.kind(), "Exception");
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn division_by_zero_without_handler() {
        let mut main = CodeBuilder::new("main");
        main.create_string("x").push(5).push(0).op(Op::Div);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("5 / 0");
        assert!(matches!(err, RuntimeError::DivisionByZero));
        assert_eq!(vm.stack.sp(), 0);
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn division_by_zero_is_catchable() {
        let mut main = CodeBuilder::new("main");
        let catch = main.jump(Op::CreateExceptionHandler);
        main.push(5).push(0).op(Op::Rem).push(100);
        main.bind(catch);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.active(), [Slot::Scalar(0)]);
        assert_eq!(vm.heap.live_count(), 0);
    }

    // ── Generators ─────────────────────────────────────────────────

    #[test]
    fn generator_yields_then_ends() {
        let mut main = CodeBuilder::new("main");
        main.push(0).op_arg(Op::InitGenerator, 1);
        for _ in 0..3 {
            main.op_arg(Op::PushGlobal, 0)
                .op(Op::Next)
                .op_arg(Op::PushGlobal, 0)
                .op(Op::Ended);
        }
        main.op_arg(Op::PushGlobal, 0)
            .op(Op::Next)
            .op_arg(Op::PushGlobal, 0)
            .op(Op::Ended);
        let mut counter = CodeBuilder::new("counter");
        counter
            .push(1)
            .op(Op::Yield)
            .push(2)
            .op(Op::Yield)
            .push(3)
            .op(Op::Yield)
            .op(Op::YieldDone);
        let image = image(vec![main, counter]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        let generator = handle(&vm, 0);
        let values: Vec<_> = vm.stack.active()[1..].to_vec();
        assert_eq!(
            values,
            [1, 0, 2, 0, 3, 0, 0, 1].map(Slot::Scalar).to_vec()
        );
        assert_eq!(vm.heap.ref_count(generator).expect("count"), 1);
        assert_eq!(vm.stack.bp(), 0);

        vm.stack.pop_all(&mut vm.heap).expect("pop");
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn generator_keeps_locals_between_yields() {
        let mut main = CodeBuilder::new("main");
        main.create_string("tag")
            .push(5)
            .push(2)
            .op_arg(Op::InitGenerator, 1);
        for _ in 0..3 {
            main.op_arg(Op::PushGlobal, 0).op(Op::Next);
        }
        let mut count_up = CodeBuilder::new("count_up");
        count_up
            .op_arg(Op::PushLocal, 1)
            .op(Op::Yield)
            .op_arg(Op::PushLocal, 1)
            .push(1)
            .op(Op::Add)
            .op_arg(Op::PopLocal, 1)
            .op_arg(Op::Jmp, 0);
        let image = image(vec![main, count_up]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.active()[1..], [5, 6, 7].map(Slot::Scalar));
        let generator = handle(&vm, 0);
        let blob = vm.heap.blob(generator).expect("blob");
        assert_eq!(blob.len(), 4);
        assert_eq!(blob.slots()[3], Slot::Scalar(7));
        // the parameter string is owned by the suspended frame only
        let tag = blob.slots()[2].as_handle().expect("tag");
        assert_eq!(vm.heap.ref_count(tag).expect("count"), 1);

        vm.stack.pop_all(&mut vm.heap).expect("pop");
        assert_eq!(vm.heap.live_count(), 0);
    }

    // ── Natives ────────────────────────────────────────────────────

    #[test]
    fn print_text_writes_to_output() {
        let output = SharedOutput::default();
        let mut main = CodeBuilder::new("main");
        main.create_string("hello")
            .push(1)
            .op_arg(Op::CallNative, native("Print_Text"))
            .push(42)
            .push(1)
            .op_arg(Op::CallNative, native("Text_Integer"))
            .push(1)
            .op_arg(Op::CallNative, native("Write_Text"));
        let image = image(vec![main]);
        let mut vm = interpreter(&image).with_output(Box::new(output.clone()));

        vm.execute(0).expect("run");
        assert_eq!(output.0.borrow().as_slice(), b"hello\n42");
        assert_eq!(vm.stack.sp(), 0);
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn concat_text_result_replaces_arguments() {
        let mut main = CodeBuilder::new("main");
        main.create_string("ab")
            .create_string("cd")
            .push(2)
            .op_arg(Op::CallNative, native("Concat_Text_Text"));
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.sp(), 1);
        assert_eq!(vm.heap.live_count(), 1);
        let result = handle(&vm, 0);
        assert_eq!(vm.heap.string(result).expect("string").as_bytes(), b"abcd");
        assert_eq!(vm.heap.ref_count(result).expect("count"), 1);
    }

    #[test]
    fn get_char_reads_input() {
        let mut main = CodeBuilder::new("main");
        main.push(0)
            .op_arg(Op::CallNative, native("GetChar_Char"))
            .push(0)
            .op_arg(Op::CallNative, native("GetChar_Char"));
        let image = image(vec![main]);
        let mut vm = interpreter(&image).with_input(Box::new(&b"z"[..]));

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.active(), [Slot::Scalar(b'z' as i64), Slot::Scalar(-1)]);
    }

    #[test]
    fn native_arity_must_match() {
        let mut main = CodeBuilder::new("main");
        main.create_string("x")
            .push(2)
            .op_arg(Op::CallNative, native("Print_Text"));
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("arity");
        assert!(matches!(
            err,
            RuntimeError::NativeArgumentCount {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn unknown_native_id() {
        let mut main = CodeBuilder::new("main");
        main.push(0).op_arg(Op::CallNative, NATIVES.len() as i64);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("no such native");
        assert!(matches!(err, RuntimeError::NativeAccessOutOfBound { .. }));
    }

    #[test]
    fn unimplemented_native() {
        let mut main = CodeBuilder::new("main");
        main.push(3)
            .push(1)
            .op_arg(Op::CallNative, native("Trim_Integer"));
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("trim");
        assert!(matches!(
            err,
            RuntimeError::NotImplemented { name: "Trim_Integer" }
        ));
    }

    // ── Blobs ──────────────────────────────────────────────────────

    #[test]
    fn read_blob_retains_values() {
        let mut main = CodeBuilder::new("main");
        main.push(1)
            .create_string("s")
            .push(3)
            .push(3)
            .op(Op::CreateBlob)
            .op(Op::Dup)
            .push(1)
            .push(2)
            .op(Op::ReadBlob);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        let blob = handle(&vm, 0);
        let text = handle(&vm, 1);
        assert_eq!(vm.stack.active()[2], Slot::Scalar(3));
        assert_eq!(vm.heap.ref_count(blob).expect("count"), 1);
        assert_eq!(vm.heap.ref_count(text).expect("count"), 2);

        vm.stack.pop_all(&mut vm.heap).expect("pop");
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn write_blob_stores_and_checks_bounds() {
        let mut main = CodeBuilder::new("main");
        main.push(1)
            .push(2)
            .push(2)
            .op(Op::CreateBlob)
            .op(Op::Dup)
            .push(0)
            .create_string("x")
            .push(1)
            .op(Op::WriteBlob)
            .op(Op::Dup)
            .push(1)
            .push(8)
            .push(9)
            .push(2)
            .op(Op::WriteBlob);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("past the end");
        assert!(matches!(
            err,
            RuntimeError::Heap(HeapError::Object(ObjectError::InvalidOffset { offset: 1, .. }))
        ));
        let blob = vm.heap.blob(handle(&vm, 0)).expect("blob");
        assert!(blob.slots()[0].is_handle());
        assert_eq!(blob.slots()[1], Slot::Scalar(2));
    }

    #[test]
    fn blob_search_slice_and_size() {
        let mut main = CodeBuilder::new("main");
        for value in 1..=4 {
            main.push(value);
        }
        main.push(4)
            .op(Op::CreateBlob)
            .push(3)
            .push(4)
            .op_arg(Op::PushGlobal, 0)
            .push(2)
            .op(Op::GetBlobIndexOfItem)
            .op_arg(Op::PushGlobal, 0)
            .push(1)
            .push(3)
            .op(Op::SliceBlob)
            .op(Op::GetBlobSize);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.active()[1..], [Slot::Scalar(1), Slot::Scalar(2)]);
        assert_eq!(vm.heap.live_count(), 1);
    }

    #[test]
    fn repeat_item_shares_handles() {
        let mut main = CodeBuilder::new("main");
        main.create_string("x")
            .push(7)
            .push(3)
            .push(2)
            .op(Op::CreateBlobRepeatItem);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.sp(), 1);
        let blob = vm.heap.blob(handle(&vm, 0)).expect("blob");
        assert_eq!(blob.len(), 6);
        let text = blob.slots()[0].as_handle().expect("text");
        assert_eq!(blob.slots()[4], Slot::Handle(text));
        assert_eq!(blob.slots()[5], Slot::Scalar(7));
        assert_eq!(vm.heap.ref_count(text).expect("count"), 3);

        vm.stack.pop_all(&mut vm.heap).expect("pop");
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn concat_blob_and_mutable_offset() {
        let mut main = CodeBuilder::new("main");
        main.create_string("x")
            .op(Op::Dup)
            .push(1)
            .op(Op::CreateBlob)
            .push(5)
            .push(1)
            .op(Op::CreateBlob)
            .push(2)
            .op(Op::ConcatBlob)
            .op(Op::Dup)
            .push(0)
            .op(Op::GetBlobMutableOffset);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        let original = handle(&vm, 0);
        let blob = handle(&vm, 1);
        let copy = handle(&vm, 2);
        assert_ne!(original, copy);
        let slots = vm.heap.blob(blob).expect("blob").slots();
        assert_eq!(slots, [Slot::Handle(copy), Slot::Scalar(5)]);
        assert_eq!(vm.heap.ref_count(original).expect("count"), 1);
        assert_eq!(vm.heap.ref_count(copy).expect("count"), 2);
    }

    fn answer(_ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
        Ok(Some(Slot::Scalar(42)))
    }

    fn new_text(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
        Ok(Some(ctx.new_string("leaked?")))
    }

    const MISDECLARED: &[Native] = &[
        Native::new("Answer", 0, 1, answer),
        Native::new("AnswerProc", 0, 0, answer),
        Native::new("NewTextProc", 0, 0, new_text),
    ];

    fn run_misdeclared(id: i64) -> (Result<(), RuntimeError>, usize) {
        let mut main = CodeBuilder::new("main");
        main.push(0).op_arg(Op::CallNative, id);
        let image = image(vec![main]);
        let info = InterpreterCreateInfo {
            natives: MISDECLARED,
            ..Default::default()
        };
        let mut vm = Interpreter::new(&image, &info).expect("interpreter");
        let result = vm.execute(0);
        (result, vm.heap.live_count())
    }

    #[test]
    fn native_result_must_match_outputs() {
        let (result, _) = run_misdeclared(0);
        result.expect("declared function");

        let (result, _) = run_misdeclared(1);
        let err = result.expect_err("procedure returned a value");
        assert!(matches!(
            err,
            RuntimeError::NativeResultCount {
                name: "AnswerProc",
                expected: 0,
                found: 1
            }
        ));

        let (result, live) = run_misdeclared(2);
        assert!(matches!(result, Err(RuntimeError::NativeResultCount { .. })));
        assert_eq!(live, 0);
    }

    #[test]
    fn default_natives_declare_at_most_one_result() {
        assert!(NATIVES.iter().all(|native| native.outputs <= 1));
    }

    // ── Allocation ─────────────────────────────────────────────────

    #[test]
    fn basic_array_times_fails_on_huge_count() {
        let mut main = CodeBuilder::new("main");
        main.push(1).push(i64::MAX).op(Op::BasicArrayTimes);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("too large");
        assert!(matches!(err, RuntimeError::OutOfMemory { .. }));
        assert_eq!(err.kind(), "OutOfMem");
        assert_eq!(vm.heap.live_count(), 0);
    }

    #[test]
    fn array_times_failure_leaves_counts_alone() {
        let mut main = CodeBuilder::new("main");
        main.create_string("x").push(i64::MAX).op(Op::ArrayTimes);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("too large");
        assert!(matches!(err, RuntimeError::OutOfMemory { .. }));
        let text = handle(&vm, 0);
        assert_eq!(vm.heap.ref_count(text).expect("count"), 1);
        assert_eq!(vm.heap.live_count(), 1);
    }

    #[test]
    fn repeat_item_fails_on_huge_count() {
        let mut main = CodeBuilder::new("main");
        main.push(7)
            .push(8)
            .push(i64::MAX)
            .push(2)
            .op(Op::CreateBlobRepeatItem);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);
        let err = vm.execute(0).expect_err("too large");
        assert!(matches!(err, RuntimeError::OutOfMemory { .. }));

        // item size times count does not fit a usize
        let mut main = CodeBuilder::new("main");
        main.create_string("x")
            .push(1)
            .push(2)
            .push(i64::MAX)
            .push(3)
            .op(Op::CreateBlobRepeatItem);
        let image = self::image(vec![main]);
        let mut vm = interpreter(&image);
        let err = vm.execute(0).expect_err("overflow");
        assert!(matches!(err, RuntimeError::OutOfMemory { count: usize::MAX }));
        let text = handle(&vm, 0);
        assert_eq!(vm.heap.ref_count(text).expect("count"), 1);
    }

    // ── Decoding ───────────────────────────────────────────────────

    #[test]
    fn unknown_opcode_is_fatal() {
        let mut main = CodeBuilder::new("main");
        main.push(1).word(77);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("77 is unassigned");
        assert!(matches!(err, RuntimeError::UnknownOpcode { opcode: 77 }));
    }

    #[test]
    fn truncated_argument_is_fatal() {
        let mut main = CodeBuilder::new("main");
        main.word(Op::Push.code());
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("missing immediate");
        assert!(matches!(err, RuntimeError::CodeAccessOutOfBound { offset: 1, .. }));
    }

    #[test]
    fn stack_underflow_is_fatal() {
        let mut main = CodeBuilder::new("main");
        main.push(1).op(Op::Add);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        let err = vm.execute(0).expect_err("one operand");
        assert!(matches!(err, RuntimeError::StackAccessOutOfBound));
    }

    #[test]
    fn float_arithmetic_uses_bits() {
        let mut main = CodeBuilder::new("main");
        main.push_float(1.5)
            .push_float(2.25)
            .op(Op::AddF)
            .push_float(3.0)
            .op(Op::GtF);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.active(), [Slot::Scalar(1)]);
    }

    #[test]
    fn conditional_jumps() {
        let mut main = CodeBuilder::new("main");
        main.push(0);
        let skip = main.jump(Op::Jz);
        main.push(100);
        main.bind(skip);
        main.push(1);
        let taken = main.jump(Op::Jnz);
        main.push(200);
        main.bind(taken);
        main.push(3);
        let image = image(vec![main]);
        let mut vm = interpreter(&image);

        vm.execute(0).expect("run");
        assert_eq!(vm.stack.active(), [Slot::Scalar(3)]);
    }
}
