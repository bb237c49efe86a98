//! String and blob instructions.

use object::{Blob, HeapObject, ObjectError, ObjectKind, Slot, Str};

use crate::interpreter::reserve;
use crate::{Interpreter, RuntimeError};

fn blob_range(blob: &Blob, offset: i64, count: i64) -> Result<std::ops::Range<usize>, ObjectError> {
    let invalid = ObjectError::InvalidOffset {
        kind: ObjectKind::Blob,
        offset,
        size: blob.len(),
    };
    let (Ok(start), Ok(count)) = (usize::try_from(offset), usize::try_from(count)) else {
        return Err(invalid);
    };
    match start.checked_add(count) {
        Some(end) if end <= blob.len() => Ok(start..end),
        _ => Err(invalid),
    }
}

impl Interpreter<'_> {
    /// Item count on top of the stack, with that many slots below it.
    fn counted(&self, extra: usize) -> Result<usize, RuntimeError> {
        let count = usize::try_from(self.stack.peek_scalar(0)?)
            .map_err(|_| RuntimeError::StackAccessOutOfBound)?;
        self.stack.require(count + 1 + extra)?;
        Ok(count)
    }

    /// `[s1..sn, n] -> [s]`
    pub(crate) fn concat_string(&mut self) -> Result<(), RuntimeError> {
        let count = self.counted(0)?;
        let sp = self.stack.sp();
        let base = sp - 1 - count;
        let mut bytes = Vec::new();
        for index in base..sp - 1 {
            let part = self.heap.string(self.stack.handle_at(index)?)?;
            bytes.extend_from_slice(part.as_bytes());
        }
        self.release_range(base, sp)?;
        self.replace_top(count + 1, HeapObject::Str(Str::new(bytes)))
    }

    /// `[v1..vn, n] -> [blob]`
    pub(crate) fn create_blob(&mut self) -> Result<(), RuntimeError> {
        let count = self.counted(0)?;
        let sp = self.stack.sp();
        let slots = self.stack.range(sp - 1 - count, sp - 1)?.to_vec();
        self.replace_top(count + 1, HeapObject::Blob(Blob::new(slots)))
    }

    /// `[blob, offset, n] -> [v1..vn]`
    pub(crate) fn read_blob(&mut self) -> Result<(), RuntimeError> {
        let count = self.stack.peek_scalar(0)?;
        let offset = self.stack.peek_scalar(1)?;
        let handle = self.stack.peek_handle(2)?;
        let blob = self.heap.blob(handle)?;
        let values = blob.slots()[blob_range(blob, offset, count)?].to_vec();
        for &value in &values {
            self.heap.retain(value)?;
        }
        self.stack.set_sp(self.stack.sp() - 3)?;
        self.stack.ensure(values.len());
        for value in values {
            self.stack.push(value);
        }
        self.release_handle(handle)
    }

    /// `[blob, offset, v1..vn, n] -> []`
    pub(crate) fn write_blob(&mut self) -> Result<(), RuntimeError> {
        let count = self.counted(2)?;
        let sp = self.stack.sp();
        let offset = self.stack.peek_scalar(count + 1)?;
        let handle = self.stack.peek_handle(count + 2)?;
        let values = self.stack.range(sp - 1 - count, sp - 1)?.to_vec();

        let blob = self.heap.blob_mut(handle)?;
        let range = blob_range(blob, offset, count as i64)?;
        let displaced: Vec<Slot> = blob.slots_mut()[range]
            .iter_mut()
            .zip(values)
            .map(|(slot, value)| std::mem::replace(slot, value))
            .collect();
        for slot in displaced {
            self.heap.release(slot)?;
        }
        self.stack.set_sp(sp - 3 - count)?;
        self.release_handle(handle)
    }

    /// `[b1..bn, n] -> [blob]`
    pub(crate) fn concat_blob(&mut self) -> Result<(), RuntimeError> {
        let count = self.counted(0)?;
        let sp = self.stack.sp();
        let base = sp - 1 - count;
        let mut slots = Vec::new();
        for index in base..sp - 1 {
            slots.extend_from_slice(self.heap.blob(self.stack.handle_at(index)?)?.slots());
        }
        for &slot in &slots {
            self.heap.retain(slot)?;
        }
        self.release_range(base, sp)?;
        self.replace_top(count + 1, HeapObject::Blob(Blob::new(slots)))
    }

    /// `[blob, offset] -> [handle]` with the element made exclusively owned
    /// by the blob first.
    pub(crate) fn get_blob_mutable_offset(&mut self) -> Result<(), RuntimeError> {
        let offset = self.stack.peek_scalar(0)?;
        let handle = self.stack.peek_handle(1)?;
        let blob = self.heap.blob(handle)?;
        let Slot::Handle(_) = blob.get(offset)? else {
            return Err(ObjectError::InvalidOffset {
                kind: ObjectKind::Blob,
                offset,
                size: blob.len(),
            }
            .into());
        };
        let element = self.heap.get_offset(handle, offset, true)?;
        self.heap.retain(element)?;
        self.release_handle(handle)?;
        self.stack.pop()?;
        self.stack.set_nth(0, element)?;
        Ok(())
    }

    /// `[blob] -> [size]`
    pub(crate) fn get_blob_size(&mut self) -> Result<(), RuntimeError> {
        let handle = self.stack.peek_handle(0)?;
        let size = self.heap.blob(handle)?.len();
        self.release_handle(handle)?;
        self.stack.set_nth(0, Slot::Scalar(size as i64))?;
        Ok(())
    }

    /// `[v1..vk, blob, k] -> [index]`
    ///
    /// The blob is read as consecutive items of `k` slots. Pushes the index
    /// of the first item equal to `v1..vk`, or -1.
    pub(crate) fn get_blob_index_of_item(&mut self) -> Result<(), RuntimeError> {
        let size = self.counted(1)?;
        if size == 0 {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        let sp = self.stack.sp();
        let handle = self.stack.peek_handle(1)?;
        let base = sp - 2 - size;
        let item = self.stack.range(base, base + size)?;

        let mut found = -1;
        for (i, candidate) in self.heap.blob(handle)?.slots().chunks_exact(size).enumerate() {
            let mut equal = true;
            for (&wanted, &present) in item.iter().zip(candidate) {
                equal = match (wanted, present) {
                    (Slot::Handle(a), Slot::Handle(b)) => self.heap.compare(a, b)?,
                    (Slot::Scalar(a), Slot::Scalar(b)) => a == b,
                    _ => false,
                };
                if !equal {
                    break;
                }
            }
            if equal {
                found = i as i64;
                break;
            }
        }

        self.release_range(base, sp)?;
        self.stack.set_sp(base)?;
        self.stack.push(Slot::Scalar(found));
        Ok(())
    }

    /// `[blob, begin, end] -> [blob]`, end exclusive, both clamped.
    pub(crate) fn slice_blob(&mut self) -> Result<(), RuntimeError> {
        let end = self.stack.peek_scalar(0)?;
        let begin = self.stack.peek_scalar(1)?;
        let handle = self.stack.peek_handle(2)?;
        let blob = self.heap.blob(handle)?;
        let len = blob.len() as i64;
        let begin = begin.clamp(0, len);
        let end = end.clamp(begin, len);
        let slots = blob.slots()[begin as usize..end as usize].to_vec();
        for &slot in &slots {
            self.heap.retain(slot)?;
        }
        self.release_handle(handle)?;
        self.stack.set_sp(self.stack.sp() - 3)?;
        self.stack.push(Slot::Handle(self.heap.add(HeapObject::Blob(Blob::new(slots)))));
        Ok(())
    }

    /// `[v1..vk, n, k] -> [blob]` holding `n` copies of the item.
    pub(crate) fn create_blob_repeat_item(&mut self) -> Result<(), RuntimeError> {
        let size = self.counted(1)?;
        let repeat = self.stack.peek_scalar(1)?.max(0) as usize;
        let sp = self.stack.sp();
        let base = sp - 2 - size;
        let item = self.stack.range(base, base + size)?.to_vec();

        let total = size
            .checked_mul(repeat)
            .ok_or(RuntimeError::OutOfMemory { count: usize::MAX })?;
        let mut slots = reserve(total)?;
        for _ in 0..repeat {
            slots.extend_from_slice(&item);
        }
        // the stack's counts go to the first copy
        match repeat {
            0 => self.release_range(base, base + size)?,
            n => {
                for &slot in &item {
                    if let Slot::Handle(h) = slot {
                        self.heap.add_count(h, n - 1)?;
                    }
                }
            }
        }
        self.replace_top(size + 2, HeapObject::Blob(Blob::new(slots)))
    }
}
