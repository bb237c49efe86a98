mod array;
mod basic_array;
mod blob;
mod exception_handler;
mod record;
mod string;

pub use array::Array;
pub use basic_array::BasicArray;
pub use blob::Blob;
pub use exception_handler::ExceptionHandler;
pub use record::Record;
pub use string::Str;

use crate::{HandleId, ObjectError, Slot};

/// Discriminant of the closed variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Str,
    BasicArray,
    Array,
    Record,
    Blob,
    ExceptionHandler,
}

impl ObjectKind {
    pub const fn name(self) -> &'static str {
        match self {
            ObjectKind::Str => "String",
            ObjectKind::BasicArray => "BasicArray",
            ObjectKind::Array => "Array",
            ObjectKind::Record => "Record",
            ObjectKind::Blob => "Blob",
            ObjectKind::ExceptionHandler => "ExceptionHandler",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A heap object payload. The reference count lives in the heap table,
/// never in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapObject {
    Str(Str),
    BasicArray(BasicArray),
    Array(Array),
    Record(Record),
    Blob(Blob),
    ExceptionHandler(ExceptionHandler),
}

impl HeapObject {
    pub const fn kind(&self) -> ObjectKind {
        match self {
            HeapObject::Str(_) => ObjectKind::Str,
            HeapObject::BasicArray(_) => ObjectKind::BasicArray,
            HeapObject::Array(_) => ObjectKind::Array,
            HeapObject::Record(_) => ObjectKind::Record,
            HeapObject::Blob(_) => ObjectKind::Blob,
            HeapObject::ExceptionHandler(_) => ObjectKind::ExceptionHandler,
        }
    }

    /// Every handle the payload owns a count of.
    pub fn owned_handles(&self) -> Vec<HandleId> {
        match self {
            HeapObject::Array(array) => array.items().to_vec(),
            HeapObject::Record(record) => record.handles().to_vec(),
            HeapObject::Blob(blob) => blob.slots().iter().filter_map(|s| s.as_handle()).collect(),
            HeapObject::Str(_) | HeapObject::BasicArray(_) | HeapObject::ExceptionHandler(_) => {
                Vec::new()
            }
        }
    }

    /// Duplicates the payload. The copy shares the sub-handles of the
    /// original, so the caller must retain every handle in
    /// [`owned_handles`](Self::owned_handles) of the result.
    pub fn shallow_copy(&self) -> Result<HeapObject, ObjectError> {
        match self {
            HeapObject::ExceptionHandler(_) => Err(ObjectError::InvalidOperation {
                kind: ObjectKind::ExceptionHandler,
                operation: "ShallowCopy",
            }),
            other => Ok(other.clone()),
        }
    }

    /// Structural equality of everything but sub-handles.
    ///
    /// Returns `false` on the first difference. Otherwise the handle pairs
    /// still to be compared are appended to `pending`, so the caller can
    /// walk nested objects without recursion.
    pub fn compare_shallow(
        &self,
        other: &HeapObject,
        pending: &mut Vec<(HandleId, HandleId)>,
    ) -> Result<bool, ObjectError> {
        match (self, other) {
            (HeapObject::ExceptionHandler(_), _) | (_, HeapObject::ExceptionHandler(_)) => {
                Err(ObjectError::InvalidOperation {
                    kind: ObjectKind::ExceptionHandler,
                    operation: "CompareTo",
                })
            }
            (HeapObject::Str(a), HeapObject::Str(b)) => Ok(a.as_bytes() == b.as_bytes()),
            (HeapObject::BasicArray(a), HeapObject::BasicArray(b)) => Ok(a.items() == b.items()),
            (HeapObject::Array(a), HeapObject::Array(b)) => {
                Ok(pair_handles(a.items(), b.items(), pending))
            }
            (HeapObject::Record(a), HeapObject::Record(b)) => {
                if a.ref_size() != b.ref_size() || a.scalars() != b.scalars() {
                    return Ok(false);
                }
                Ok(pair_handles(a.handles(), b.handles(), pending))
            }
            (HeapObject::Blob(a), HeapObject::Blob(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                let start = pending.len();
                for (x, y) in a.slots().iter().zip(b.slots()) {
                    match (*x, *y) {
                        (Slot::Scalar(x), Slot::Scalar(y)) if x == y => {}
                        (Slot::Handle(x), Slot::Handle(y)) => pending.push((x, y)),
                        _ => {
                            pending.truncate(start);
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Element read for offset-addressable variants.
    pub fn get_offset(&self, offset: i64) -> Result<Slot, ObjectError> {
        match self {
            HeapObject::BasicArray(array) => array.get(offset).map(Slot::Scalar),
            HeapObject::Array(array) => array.get(offset).map(Slot::Handle),
            HeapObject::Record(record) => record.get(offset),
            HeapObject::Blob(blob) => blob.get(offset),
            HeapObject::Str(_) | HeapObject::ExceptionHandler(_) => {
                Err(ObjectError::InvalidOperation {
                    kind: self.kind(),
                    operation: "GetOffsetValue",
                })
            }
        }
    }

    /// Element write for offset-addressable variants. Returns the replaced
    /// slot; a returned handle is a count the caller must release.
    pub fn set_offset(&mut self, offset: i64, value: Slot) -> Result<Slot, ObjectError> {
        let kind = self.kind();
        match (self, value) {
            (HeapObject::BasicArray(array), Slot::Scalar(v)) => array.set(offset, v).map(Slot::Scalar),
            (HeapObject::Array(array), Slot::Handle(h)) => array.set(offset, h).map(Slot::Handle),
            (HeapObject::Record(record), value) => record.set(offset, value),
            (HeapObject::Blob(blob), value) => blob.set(offset, value),
            (HeapObject::BasicArray(_) | HeapObject::Array(_), _) => Err(ObjectError::SlotMismatch {
                kind,
                offset: offset.max(0) as usize,
            }),
            (HeapObject::Str(_) | HeapObject::ExceptionHandler(_), _) => {
                Err(ObjectError::InvalidOperation {
                    kind,
                    operation: "SetOffsetValue",
                })
            }
        }
    }
}

fn pair_handles(
    a: &[HandleId],
    b: &[HandleId],
    pending: &mut Vec<(HandleId, HandleId)>,
) -> bool {
    if a.len() != b.len() {
        return false;
    }
    pending.extend(a.iter().copied().zip(b.iter().copied()));
    true
}
