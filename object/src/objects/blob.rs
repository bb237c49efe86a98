use crate::{ObjectError, ObjectKind, Slot, error::checked_offset};

/// Resizable mixed buffer.
///
/// Unlike [`Record`](crate::Record) every slot carries its own tag, so the
/// handle/scalar layout can change over the blob's lifetime. Generator
/// frames live in blobs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob {
    slots: Vec<Slot>,
}

impl Blob {
    pub fn new(slots: Vec<Slot>) -> Self {
        Self { slots }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline(always)]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[inline(always)]
    pub fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.slots
    }

    pub fn get(&self, offset: i64) -> Result<Slot, ObjectError> {
        let index = checked_offset(ObjectKind::Blob, offset, self.slots.len())?;
        Ok(self.slots[index])
    }

    pub fn set(&mut self, offset: i64, value: Slot) -> Result<Slot, ObjectError> {
        let index = checked_offset(ObjectKind::Blob, offset, self.slots.len())?;
        Ok(std::mem::replace(&mut self.slots[index], value))
    }

    /// Reads a slot that must hold a scalar.
    pub fn scalar(&self, index: usize) -> Result<i64, ObjectError> {
        match self.slots.get(index) {
            Some(Slot::Scalar(value)) => Ok(*value),
            Some(Slot::Handle(_)) => Err(ObjectError::SlotMismatch {
                kind: ObjectKind::Blob,
                offset: index,
            }),
            None => Err(ObjectError::InvalidOffset {
                kind: ObjectKind::Blob,
                offset: index as i64,
                size: self.slots.len(),
            }),
        }
    }

    /// Moves a slot out, leaving a zero scalar behind.
    pub fn take(&mut self, index: usize) -> Option<Slot> {
        self.slots.get_mut(index).map(std::mem::take)
    }

    /// Resizes to `len` slots. Growth doubles the capacity at least and
    /// zero-fills; shrinking returns the dropped slots so the caller can
    /// release any handles among them.
    pub fn resize(&mut self, len: usize) -> Vec<Slot> {
        if len <= self.slots.len() {
            return self.slots.split_off(len);
        }
        let capacity = self.slots.capacity();
        if len > capacity {
            let target = len.max(capacity * 2);
            self.slots.reserve_exact(target - self.slots.len());
        }
        self.slots.resize(len, Slot::ZERO);
        Vec::new()
    }

    pub fn extend_from_slice(&mut self, slots: &[Slot]) {
        self.slots.extend_from_slice(slots);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HandleId;

    #[test]
    fn grow_zero_fills() {
        let mut blob = Blob::new(vec![Slot::Scalar(7)]);
        assert!(blob.resize(4).is_empty());
        assert_eq!(blob.slots(), &[Slot::Scalar(7), Slot::ZERO, Slot::ZERO, Slot::ZERO]);
        assert!(blob.slots.capacity() >= 4);
    }

    #[test]
    fn shrink_returns_dropped_slots() {
        let handle = Slot::Handle(HandleId::new(3));
        let mut blob = Blob::new(vec![Slot::Scalar(1), Slot::Scalar(2), handle]);
        let dropped = blob.resize(2);
        assert_eq!(dropped, vec![handle]);
        assert_eq!(blob.len(), 2);
    }

    #[test]
    fn take_leaves_scalar() {
        let handle = Slot::Handle(HandleId::new(1));
        let mut blob = Blob::new(vec![handle]);
        assert_eq!(blob.take(0), Some(handle));
        assert_eq!(blob.get(0), Ok(Slot::ZERO));
        assert_eq!(blob.take(1), None);
    }

    #[test]
    fn scalar_rejects_handles() {
        let blob = Blob::new(vec![Slot::Handle(HandleId::new(0))]);
        assert!(matches!(blob.scalar(0), Err(ObjectError::SlotMismatch { .. })));
        assert!(matches!(blob.scalar(1), Err(ObjectError::InvalidOffset { .. })));
    }
}
