use log::{debug, trace};
use object::{
    Array, BasicArray, Blob, ExceptionHandler, HandleId, HeapObject, ObjectKind, Record, Slot, Str,
};

use crate::HeapError;

/// Configuration for the handle table.
#[derive(Debug, Clone)]
pub struct HeapSettings {
    /// Number of table entries reserved up front.
    pub initial_capacity: usize,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            initial_capacity: 256,
        }
    }
}

#[derive(Debug)]
struct Entry {
    count: usize,
    object: HeapObject,
}

/// Reference-counted object table.
///
/// Every lifetime change goes through [`inc`](Heap::inc),
/// [`add_count`](Heap::add_count) and [`dec`](Heap::dec). An object is
/// destroyed as soon as its count reaches zero and its handle goes on the
/// free list for reuse.
#[derive(Debug, Default)]
pub struct Heap {
    entries: Vec<Option<Entry>>,
    free: Vec<usize>,
    live: usize,
}

macro_rules! typed_access {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self, handle: HandleId) -> Result<&$ty, HeapError> {
            match self.get(handle)? {
                HeapObject::$variant(inner) => Ok(inner),
                other => Err(HeapError::WrongVariant {
                    handle,
                    expected: ObjectKind::$variant,
                    found: other.kind(),
                }),
            }
        }

        pub fn $get_mut(&mut self, handle: HandleId) -> Result<&mut $ty, HeapError> {
            match self.get_mut(handle)? {
                HeapObject::$variant(inner) => Ok(inner),
                other => Err(HeapError::WrongVariant {
                    handle,
                    expected: ObjectKind::$variant,
                    found: other.kind(),
                }),
            }
        }
    };
}

impl Heap {
    #[must_use]
    pub fn new(settings: &HeapSettings) -> Self {
        Self {
            entries: Vec::with_capacity(settings.initial_capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Number of live objects.
    #[inline(always)]
    pub fn live_count(&self) -> usize {
        self.live
    }

    // ── Registration ───────────────────────────────────────────────

    /// Registers a fresh object with a count of one.
    pub fn add(&mut self, object: HeapObject) -> HandleId {
        let entry = Some(Entry { count: 1, object });
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.entries[index] = entry;
                HandleId::new(index)
            }
            None => {
                self.entries.push(entry);
                HandleId::new(self.entries.len() - 1)
            }
        }
    }

    fn entry(&self, handle: HandleId) -> Result<&Entry, HeapError> {
        self.entries
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(HeapError::InvalidHandle { handle })
    }

    fn entry_mut(&mut self, handle: HandleId) -> Result<&mut Entry, HeapError> {
        self.entries
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(HeapError::InvalidHandle { handle })
    }

    // ── Access ─────────────────────────────────────────────────────

    pub fn get(&self, handle: HandleId) -> Result<&HeapObject, HeapError> {
        self.entry(handle).map(|entry| &entry.object)
    }

    pub fn get_mut(&mut self, handle: HandleId) -> Result<&mut HeapObject, HeapError> {
        self.entry_mut(handle).map(|entry| &mut entry.object)
    }

    pub fn get_typed(
        &self,
        handle: HandleId,
        expected: ObjectKind,
    ) -> Result<&HeapObject, HeapError> {
        let object = self.get(handle)?;
        if object.kind() != expected {
            return Err(HeapError::WrongVariant {
                handle,
                expected,
                found: object.kind(),
            });
        }
        Ok(object)
    }

    typed_access!(string, string_mut, Str, Str);
    typed_access!(basic_array, basic_array_mut, BasicArray, BasicArray);
    typed_access!(array, array_mut, Array, Array);
    typed_access!(record, record_mut, Record, Record);
    typed_access!(blob, blob_mut, Blob, Blob);
    typed_access!(
        exception_handler,
        exception_handler_mut,
        ExceptionHandler,
        ExceptionHandler
    );

    pub fn ref_count(&self, handle: HandleId) -> Result<usize, HeapError> {
        self.entry(handle).map(|entry| entry.count)
    }

    // ── Counting ───────────────────────────────────────────────────

    pub fn inc(&mut self, handle: HandleId) -> Result<(), HeapError> {
        self.add_count(handle, 1)
    }

    pub fn add_count(&mut self, handle: HandleId, n: usize) -> Result<(), HeapError> {
        self.entry_mut(handle)?.count += n;
        Ok(())
    }

    /// Drops one count. At zero the object is destroyed, which releases
    /// every handle it owns in turn.
    pub fn dec(&mut self, handle: HandleId) -> Result<(), HeapError> {
        let mut pending = vec![handle];
        while let Some(handle) = pending.pop() {
            let entry = self.entry_mut(handle)?;
            entry.count -= 1;
            if entry.count > 0 {
                continue;
            }
            let Some(entry) = self.entries[handle.index()].take() else {
                continue;
            };
            debug!("free {handle:?} ({})", entry.object.kind());
            pending.extend(entry.object.owned_handles());
            self.free.push(handle.index());
            self.live -= 1;
        }
        Ok(())
    }

    /// Retains the slot if it holds a handle.
    #[inline(always)]
    pub fn retain(&mut self, slot: Slot) -> Result<(), HeapError> {
        match slot {
            Slot::Handle(handle) => self.inc(handle),
            Slot::Scalar(_) => Ok(()),
        }
    }

    /// Releases the slot if it holds a handle.
    #[inline(always)]
    pub fn release(&mut self, slot: Slot) -> Result<(), HeapError> {
        match slot {
            Slot::Handle(handle) => self.dec(handle),
            Slot::Scalar(_) => Ok(()),
        }
    }

    // ── Polymorphic operations ─────────────────────────────────────

    /// Structural equality. Identical handles are equal without looking at
    /// the objects; objects of different kinds are never equal.
    ///
    /// Nested objects are walked through a pending list, so arbitrarily
    /// deep graphs compare without growing the host stack.
    pub fn compare(&self, a: HandleId, b: HandleId) -> Result<bool, HeapError> {
        let mut pending = vec![(a, b)];
        while let Some((a, b)) = pending.pop() {
            let left = self.get(a)?;
            let right = self.get(b)?;
            if a == b {
                continue;
            }
            if left.kind() != right.kind() || !left.compare_shallow(right, &mut pending)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Duplicates an object into a new handle, retaining its sub-handles.
    pub fn shallow_copy(&mut self, handle: HandleId) -> Result<HandleId, HeapError> {
        let copy = self.get(handle)?.shallow_copy()?;
        for owned in copy.owned_handles() {
            self.inc(owned)?;
        }
        let copy = self.add(copy);
        trace!("copy {handle:?} -> {copy:?}");
        Ok(copy)
    }

    /// Returns a handle that is safe to mutate in place.
    ///
    /// An exclusively owned handle is returned as is. A shared one is
    /// copied and the caller's count moves from the original to the copy.
    pub fn make_mutable(&mut self, handle: HandleId) -> Result<HandleId, HeapError> {
        if self.ref_count(handle)? == 1 {
            return Ok(handle);
        }
        let copy = self.shallow_copy(handle)?;
        self.dec(handle)?;
        Ok(copy)
    }

    /// Reads an element without retaining it.
    ///
    /// With `for_mutate`, a handle element is first made mutable and the
    /// container updated to point at the result.
    pub fn get_offset(
        &mut self,
        handle: HandleId,
        offset: i64,
        for_mutate: bool,
    ) -> Result<Slot, HeapError> {
        let slot = self.get(handle)?.get_offset(offset)?;
        match slot {
            Slot::Handle(element) if for_mutate => {
                let mutable = self.make_mutable(element)?;
                if mutable != element {
                    self.get_mut(handle)?.set_offset(offset, Slot::Handle(mutable))?;
                }
                Ok(Slot::Handle(mutable))
            }
            slot => Ok(slot),
        }
    }

    /// Stores an owned slot into an element, releasing the previous value.
    pub fn set_offset(&mut self, handle: HandleId, offset: i64, value: Slot) -> Result<(), HeapError> {
        let old = self.get_mut(handle)?.set_offset(offset, value)?;
        self.release(old)
    }

    /// Whole-heap teardown. Payloads are dropped without touching the
    /// counts of their sub-handles since every object goes at once.
    pub fn clear(&mut self) {
        debug!("clear heap with {} live objects", self.live);
        self.entries.clear();
        self.free.clear();
        self.live = 0;
    }
}
