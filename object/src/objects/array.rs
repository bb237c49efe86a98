use crate::{HandleId, ObjectError, ObjectKind, error::checked_offset};

/// Flat array of owned handles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Array {
    items: Vec<HandleId>,
}

impl Array {
    pub fn new(items: Vec<HandleId>) -> Self {
        Self { items }
    }

    #[inline(always)]
    pub fn items(&self) -> &[HandleId] {
        &self.items
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, offset: i64) -> Result<HandleId, ObjectError> {
        let index = checked_offset(ObjectKind::Array, offset, self.items.len())?;
        Ok(self.items[index])
    }

    /// Replaces an element and hands back the previous one, whose count the
    /// caller now owns.
    pub fn set(&mut self, offset: i64, value: HandleId) -> Result<HandleId, ObjectError> {
        let index = checked_offset(ObjectKind::Array, offset, self.items.len())?;
        Ok(std::mem::replace(&mut self.items[index], value))
    }

    /// Appended handles must already carry a count for this array.
    pub fn extend_from_slice(&mut self, items: &[HandleId]) {
        self.items.extend_from_slice(items);
    }
}
