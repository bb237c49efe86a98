use log::debug;
use object::{Blob, HeapObject, Slot};

use crate::{Interpreter, RuntimeError};

/// Blob slots before the locals: code block, resume ip.
const HEADER: usize = 2;

/// A generator frame while it is not on the stack.
///
/// Lives in a blob as `[code_block, ip, locals..]`. Resuming moves the
/// locals onto the stack and suspending moves them back, so at any time
/// exactly one side owns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendedFrame {
    pub code_block: usize,
    pub ip: usize,
    pub locals: Vec<Slot>,
}

impl SuspendedFrame {
    /// Reads the resume point without touching the locals.
    pub fn resume_point(blob: &Blob) -> Result<(usize, usize), RuntimeError> {
        let code_block = blob.scalar(0)?;
        let ip = blob.scalar(1)?;
        match (usize::try_from(code_block), usize::try_from(ip)) {
            (Ok(code_block), Ok(ip)) => Ok((code_block, ip)),
            _ => Err(RuntimeError::CodeBlockAccessOutOfBound { id: code_block }),
        }
    }

    /// Moves the locals out of `blob`, leaving zeros behind.
    pub fn take_from(blob: &mut Blob) -> Result<Self, RuntimeError> {
        let (code_block, ip) = Self::resume_point(blob)?;
        let locals = (HEADER..blob.len())
            .filter_map(|index| blob.take(index))
            .collect();
        Ok(Self {
            code_block,
            ip,
            locals,
        })
    }

    /// Writes the frame into `blob`, resizing it to fit. Returns whatever
    /// the blob held in the overwritten or dropped slots so the caller can
    /// release it.
    pub fn store_into(self, blob: &mut Blob) -> Vec<Slot> {
        let mut displaced = blob.resize(HEADER + self.locals.len());
        let slots = blob.slots_mut();
        slots[0] = Slot::Scalar(self.code_block as i64);
        slots[1] = Slot::Scalar(self.ip as i64);
        for (slot, local) in slots[HEADER..].iter_mut().zip(self.locals) {
            displaced.push(std::mem::replace(slot, local));
        }
        displaced
    }
}

impl Interpreter<'_> {
    /// `[p1..pn, n] -> [generator]`
    pub(crate) fn init_generator(&mut self, code_block: i64) -> Result<(), RuntimeError> {
        self.block(code_block)?;
        let count = usize::try_from(self.stack.peek_scalar(0)?)
            .map_err(|_| RuntimeError::StackAccessOutOfBound)?;
        self.stack.require(count + 1)?;
        let base = self.stack.sp() - 1 - count;

        let mut slots = Vec::with_capacity(HEADER + count);
        slots.push(Slot::Scalar(code_block));
        slots.push(Slot::Scalar(0));
        slots.extend_from_slice(self.stack.range(base, base + count)?);
        self.replace_top(count + 1, HeapObject::Blob(Blob::new(slots)))?;
        debug!("init generator on block {code_block} with {count} params");
        Ok(())
    }

    /// Enters the generator on top of the stack. Its handle stays below
    /// the new frame's linkage, where a call would keep its argument count.
    pub(crate) fn resume_generator(&mut self) -> Result<(), RuntimeError> {
        let generator = self.stack.peek_handle(0)?;
        let (code_block, _) = SuspendedFrame::resume_point(self.heap.blob(generator)?)?;
        self.block(code_block as i64)?;

        let frame = SuspendedFrame::take_from(self.heap.blob_mut(generator)?)?;
        self.stack.ensure(3 + frame.locals.len());
        self.push_linkage();
        for local in frame.locals {
            self.stack.push(local);
        }
        debug!("resume generator {generator:?} at {}:{}", frame.code_block, frame.ip);
        self.code_block = frame.code_block;
        self.ip = frame.ip;
        Ok(())
    }

    /// Suspends the running generator and hands the top value to whoever
    /// resumed it, in place of the generator handle.
    pub(crate) fn yield_value(&mut self) -> Result<(), RuntimeError> {
        let bp = self.stack.bp();
        let sp = self.stack.sp();
        if bp < 4 || bp >= sp {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        let generator = self.stack.handle_at(bp - 4)?;
        self.heap.blob(generator)?;

        let locals = (bp..sp - 1)
            .map(|index| self.stack.take(index))
            .collect::<Result<Vec<_>, _>>()?;
        let frame = SuspendedFrame {
            code_block: self.code_block,
            ip: self.ip,
            locals,
        };
        debug!("yield from {}:{}", frame.code_block, frame.ip);
        let displaced = frame.store_into(self.heap.blob_mut(generator)?);
        for slot in displaced {
            self.heap.release(slot)?;
        }
        self.leave_frame(1, 1)
    }

    /// Final exit. The generator is marked exhausted and the caller gets a
    /// zero placeholder in place of the generator handle.
    pub(crate) fn yield_done(&mut self) -> Result<(), RuntimeError> {
        let bp = self.stack.bp();
        if bp < 4 || bp > self.stack.sp() {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        let generator = self.stack.handle_at(bp - 4)?;
        let end = self.block(self.code_block as i64)?.len();

        let blob = self.heap.blob_mut(generator)?;
        let dropped = blob.resize(HEADER);
        blob.set(1, Slot::Scalar(end as i64))?;
        for slot in dropped {
            self.heap.release(slot)?;
        }
        debug!("generator {generator:?} done");
        self.leave_frame(1, 0)?;
        self.stack.push(Slot::ZERO);
        Ok(())
    }

    /// `[generator] -> [ended]`
    pub(crate) fn generator_ended(&mut self) -> Result<(), RuntimeError> {
        let generator = self.stack.peek_handle(0)?;
        let (code_block, ip) = SuspendedFrame::resume_point(self.heap.blob(generator)?)?;
        let ended = ip >= self.block(code_block as i64)?.len();
        self.release_handle(generator)?;
        self.stack.set_nth(0, Slot::from_bool(ended))?;
        Ok(())
    }
}
