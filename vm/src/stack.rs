use heap::{Heap, HeapError};
use object::{HandleId, Slot};

use crate::RuntimeError;

#[derive(Debug, Clone)]
pub struct ExecutionStackInfo {
    pub stack_size: usize,
}

impl Default for ExecutionStackInfo {
    fn default() -> Self {
        Self { stack_size: 1024 }
    }
}

/// Value stack shared by every frame.
///
/// `slots.len()` is the capacity; `sp` is the next free slot and `bp` the
/// origin of the current frame's locals. Frames are linked through three
/// scalars right below `bp`: code block, ip, previous bp.
#[derive(Debug, Clone)]
pub struct ExecutionStack {
    slots: Vec<Slot>,
    sp: usize,
    bp: usize,
}

impl ExecutionStack {
    #[must_use]
    pub fn new(info: &ExecutionStackInfo) -> Self {
        Self {
            slots: vec![Slot::ZERO; info.stack_size],
            sp: 0,
            bp: 0,
        }
    }

    #[inline(always)]
    pub fn sp(&self) -> usize {
        self.sp
    }

    #[inline(always)]
    pub fn bp(&self) -> usize {
        self.bp
    }

    #[inline(always)]
    pub fn set_bp(&mut self, bp: usize) {
        self.bp = bp;
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the active portion of the stack
    #[must_use]
    pub fn active(&self) -> &[Slot] {
        &self.slots[..self.sp]
    }

    /// Makes room for `n` more slots. The capacity grows by at least its
    /// current size so repeated pushes stay amortised.
    pub fn ensure(&mut self, n: usize) {
        if self.sp + n <= self.slots.len() {
            return;
        }
        let added = n.max(self.slots.len());
        self.slots.resize(self.slots.len() + added, Slot::ZERO);
    }

    #[inline(always)]
    pub fn push(&mut self, slot: Slot) {
        self.ensure(1);
        self.slots[self.sp] = slot;
        self.sp += 1;
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Result<Slot, RuntimeError> {
        self.require(1)?;
        self.sp -= 1;
        Ok(std::mem::take(&mut self.slots[self.sp]))
    }

    /// Fails unless at least `n` slots are live.
    #[inline(always)]
    pub fn require(&self, n: usize) -> Result<(), RuntimeError> {
        if self.sp < n {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        Ok(())
    }

    /// Moves the top down to `sp` without releasing anything. The slots
    /// above must already have been released or moved elsewhere.
    pub fn set_sp(&mut self, sp: usize) -> Result<(), RuntimeError> {
        if sp > self.slots.len() {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        if sp < self.sp {
            self.slots[sp..self.sp].fill(Slot::ZERO);
        }
        self.sp = sp;
        Ok(())
    }

    // ── Addressing ─────────────────────────────────────────────────

    /// Absolute index of the slot `n` below the top (0 is the top).
    #[inline(always)]
    pub fn index_of(&self, n: usize) -> Result<usize, RuntimeError> {
        self.require(n + 1)?;
        Ok(self.sp - 1 - n)
    }

    /// Validates an absolute index coming from code or from the stack.
    #[inline(always)]
    pub fn absolute(&self, index: i64) -> Result<usize, RuntimeError> {
        usize::try_from(index)
            .ok()
            .filter(|&index| index < self.sp)
            .ok_or(RuntimeError::StackAccessOutOfBound)
    }

    /// Index `bp + offset`, validated.
    #[inline(always)]
    pub fn local(&self, offset: i64) -> Result<usize, RuntimeError> {
        self.absolute((self.bp as i64).wrapping_add(offset))
    }

    #[inline(always)]
    pub fn get(&self, index: usize) -> Result<Slot, RuntimeError> {
        self.active()
            .get(index)
            .copied()
            .ok_or(RuntimeError::StackAccessOutOfBound)
    }

    /// Overwrites a live slot and hands back the previous value.
    #[inline(always)]
    pub fn set(&mut self, index: usize, slot: Slot) -> Result<Slot, RuntimeError> {
        if index >= self.sp {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        Ok(std::mem::replace(&mut self.slots[index], slot))
    }

    /// Moves a live slot out, leaving a zero scalar behind.
    pub fn take(&mut self, index: usize) -> Result<Slot, RuntimeError> {
        self.set(index, Slot::ZERO)
    }

    pub fn scalar_at(&self, index: usize) -> Result<i64, RuntimeError> {
        self.get(index)?
            .as_scalar()
            .ok_or(RuntimeError::StackAccessOutOfBound)
    }

    pub fn handle_at(&self, index: usize) -> Result<HandleId, RuntimeError> {
        self.get(index)?
            .as_handle()
            .ok_or(RuntimeError::StackAccessOutOfBound)
    }

    #[inline(always)]
    pub fn peek(&self, n: usize) -> Result<Slot, RuntimeError> {
        self.get(self.index_of(n)?)
    }

    #[inline(always)]
    pub fn peek_scalar(&self, n: usize) -> Result<i64, RuntimeError> {
        self.scalar_at(self.index_of(n)?)
    }

    #[inline(always)]
    pub fn peek_handle(&self, n: usize) -> Result<HandleId, RuntimeError> {
        self.handle_at(self.index_of(n)?)
    }

    /// Overwrites the slot `n` below the top, returning the old value.
    pub fn set_nth(&mut self, n: usize, slot: Slot) -> Result<Slot, RuntimeError> {
        let index = self.index_of(n)?;
        self.set(index, slot)
    }

    /// Live slots in `[start, end)`.
    pub fn range(&self, start: usize, end: usize) -> Result<&[Slot], RuntimeError> {
        if start > end || end > self.sp {
            return Err(RuntimeError::StackAccessOutOfBound);
        }
        Ok(&self.slots[start..end])
    }

    // ── Teardown ───────────────────────────────────────────────────

    /// Number of live slots holding a handle.
    pub fn handle_count(&self) -> usize {
        self.active().iter().filter(|slot| slot.is_handle()).count()
    }

    /// Releases every live handle and empties the stack.
    pub fn pop_all(&mut self, heap: &mut Heap) -> Result<(), HeapError> {
        while self.sp > 0 {
            self.sp -= 1;
            let slot = std::mem::take(&mut self.slots[self.sp]);
            heap.release(slot)?;
        }
        self.bp = 0;
        Ok(())
    }
}
