use crate::{HandleId, ObjectError, ObjectKind, Slot, error::checked_offset};

/// Fixed-size mixed record.
///
/// Offsets `0..ref_size` address handles, the remaining offsets address
/// scalars. The partition is chosen at creation and never moves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    handles: Vec<HandleId>,
    scalars: Vec<i64>,
}

impl Record {
    pub fn new(handles: Vec<HandleId>, scalars: Vec<i64>) -> Self {
        Self { handles, scalars }
    }

    /// Builds a record from stack slots, handles first and scalars after,
    /// each group keeping its relative order.
    pub fn from_slots(slots: &[Slot]) -> Self {
        let mut handles = Vec::new();
        let mut scalars = Vec::new();
        for slot in slots {
            match *slot {
                Slot::Handle(handle) => handles.push(handle),
                Slot::Scalar(value) => scalars.push(value),
            }
        }
        Self { handles, scalars }
    }

    #[inline(always)]
    pub fn ref_size(&self) -> usize {
        self.handles.len()
    }

    #[inline(always)]
    pub fn total_size(&self) -> usize {
        self.handles.len() + self.scalars.len()
    }

    #[inline(always)]
    pub fn handles(&self) -> &[HandleId] {
        &self.handles
    }

    #[inline(always)]
    pub fn scalars(&self) -> &[i64] {
        &self.scalars
    }

    pub fn get(&self, offset: i64) -> Result<Slot, ObjectError> {
        let index = checked_offset(ObjectKind::Record, offset, self.total_size())?;
        Ok(match self.handles.get(index) {
            Some(&handle) => Slot::Handle(handle),
            None => Slot::Scalar(self.scalars[index - self.handles.len()]),
        })
    }

    /// Stores `value`, which must match the partition of `offset`.
    pub fn set(&mut self, offset: i64, value: Slot) -> Result<Slot, ObjectError> {
        let index = checked_offset(ObjectKind::Record, offset, self.total_size())?;
        let ref_size = self.handles.len();
        match value {
            Slot::Handle(handle) if index < ref_size => {
                Ok(Slot::Handle(std::mem::replace(&mut self.handles[index], handle)))
            }
            Slot::Scalar(scalar) if index >= ref_size => Ok(Slot::Scalar(std::mem::replace(
                &mut self.scalars[index - ref_size],
                scalar,
            ))),
            _ => Err(ObjectError::SlotMismatch {
                kind: ObjectKind::Record,
                offset: index,
            }),
        }
    }
}
