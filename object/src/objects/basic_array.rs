use crate::{ObjectError, ObjectKind, error::checked_offset};

/// Flat array of raw scalars. Owns no handles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BasicArray {
    items: Vec<i64>,
}

impl BasicArray {
    pub fn new(items: Vec<i64>) -> Self {
        Self { items }
    }

    #[inline(always)]
    pub fn items(&self) -> &[i64] {
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

    pub fn get(&self, offset: i64) -> Result<i64, ObjectError> {
        let index = checked_offset(ObjectKind::BasicArray, offset, self.items.len())?;
        Ok(self.items[index])
    }

    pub fn set(&mut self, offset: i64, value: i64) -> Result<i64, ObjectError> {
        let index = checked_offset(ObjectKind::BasicArray, offset, self.items.len())?;
        Ok(std::mem::replace(&mut self.items[index], value))
    }

    pub fn extend_from_slice(&mut self, items: &[i64]) {
        self.items.extend_from_slice(items);
    }
}
