mod error;
mod handle;
mod objects;
mod value;

pub use error::ObjectError;
pub use handle::HandleId;
pub use objects::{
    Array, BasicArray, Blob, ExceptionHandler, HeapObject, ObjectKind, Record, Str,
};
pub use value::Slot;

#[cfg(test)]
mod tests {
    use super::*;

    fn h(index: usize) -> HandleId {
        HandleId::new(index)
    }

    // ── Slots ──────────────────────────────────────────────────────

    #[test]
    fn float_bits_survive_slot() {
        let slot = Slot::from_f64(-2.5);
        assert!(slot.is_scalar());
        assert_eq!(slot.as_f64(), Some(-2.5));
        assert_eq!(slot.as_handle(), None);
    }

    #[test]
    fn handle_slot_is_not_scalar() {
        let slot = Slot::from(h(4));
        assert!(slot.is_handle());
        assert_eq!(slot.as_scalar(), None);
        assert_eq!(slot.as_handle(), Some(h(4)));
    }

    // ── Strings ────────────────────────────────────────────────────

    #[test]
    fn string_stops_at_nul() {
        let s = Str::new(b"ab\0cd".to_vec());
        assert_eq!(s.as_bytes(), b"ab");
        let mut t = Str::from("x");
        t.push_bytes(b"yz\0w");
        assert_eq!(t.to_string_lossy(), "xyz");
    }

    #[test]
    fn string_is_not_offset_addressable() {
        let mut obj = HeapObject::Str(Str::from("abc"));
        assert!(matches!(
            obj.get_offset(0),
            Err(ObjectError::InvalidOperation { kind: ObjectKind::Str, .. })
        ));
        assert!(matches!(
            obj.set_offset(0, Slot::Scalar(1)),
            Err(ObjectError::InvalidOperation { .. })
        ));
    }

    // ── Records ────────────────────────────────────────────────────

    #[test]
    fn record_partitions_handles_first() {
        let record = Record::from_slots(&[Slot::Scalar(1), Slot::Handle(h(9)), Slot::Scalar(2)]);
        assert_eq!(record.ref_size(), 1);
        assert_eq!(record.total_size(), 3);
        assert_eq!(record.get(0), Ok(Slot::Handle(h(9))));
        assert_eq!(record.get(1), Ok(Slot::Scalar(1)));
        assert_eq!(record.get(2), Ok(Slot::Scalar(2)));
        assert!(record.get(3).is_err());
        assert!(record.get(-1).is_err());
    }

    #[test]
    fn record_set_respects_partition() {
        let mut record = Record::new(vec![h(1)], vec![5]);
        assert_eq!(record.set(0, Slot::Handle(h(2))), Ok(Slot::Handle(h(1))));
        assert_eq!(record.set(1, Slot::Scalar(6)), Ok(Slot::Scalar(5)));
        assert!(matches!(
            record.set(0, Slot::Scalar(3)),
            Err(ObjectError::SlotMismatch { offset: 0, .. })
        ));
        assert!(matches!(
            record.set(1, Slot::Handle(h(3))),
            Err(ObjectError::SlotMismatch { offset: 1, .. })
        ));
    }

    // ── Dispatch ───────────────────────────────────────────────────

    #[test]
    fn exception_handler_cannot_be_copied_or_compared() {
        let handler = HeapObject::ExceptionHandler(ExceptionHandler::new(0, 4, 0));
        assert!(matches!(
            handler.shallow_copy(),
            Err(ObjectError::InvalidOperation { kind: ObjectKind::ExceptionHandler, .. })
        ));
        let other = HeapObject::Str(Str::from("x"));
        let mut pending = Vec::new();
        assert!(other.compare_shallow(&handler, &mut pending).is_err());
        assert!(handler.compare_shallow(&handler, &mut pending).is_err());
    }

    #[test]
    fn owned_handles_per_variant() {
        let array = HeapObject::Array(Array::new(vec![h(1), h(2)]));
        assert_eq!(array.owned_handles(), vec![h(1), h(2)]);
        let blob = HeapObject::Blob(Blob::new(vec![Slot::Scalar(0), Slot::Handle(h(5))]));
        assert_eq!(blob.owned_handles(), vec![h(5)]);
        let basic = HeapObject::BasicArray(BasicArray::new(vec![1, 2]));
        assert!(basic.owned_handles().is_empty());
    }

    #[test]
    fn compare_mixed_variants_is_false() {
        let a = HeapObject::BasicArray(BasicArray::new(vec![]));
        let b = HeapObject::Array(Array::new(vec![]));
        assert_eq!(a.compare_shallow(&b, &mut Vec::new()), Ok(false));
    }

    #[test]
    fn compare_blob_checks_tags() {
        let a = HeapObject::Blob(Blob::new(vec![Slot::Scalar(1)]));
        let b = HeapObject::Blob(Blob::new(vec![Slot::Handle(h(1))]));
        let mut pending = Vec::new();
        assert_eq!(a.compare_shallow(&b, &mut pending), Ok(false));
        assert_eq!(a.compare_shallow(&a.clone(), &mut pending), Ok(true));
        assert!(pending.is_empty());
    }

    #[test]
    fn compare_defers_sub_handles() {
        let a = HeapObject::Blob(Blob::new(vec![Slot::Handle(h(1)), Slot::Scalar(2), Slot::Handle(h(3))]));
        let b = HeapObject::Blob(Blob::new(vec![Slot::Handle(h(4)), Slot::Scalar(2), Slot::Handle(h(5))]));
        let mut pending = Vec::new();
        assert_eq!(a.compare_shallow(&b, &mut pending), Ok(true));
        assert_eq!(pending, vec![(h(1), h(4)), (h(3), h(5))]);

        let c = HeapObject::Blob(Blob::new(vec![Slot::Handle(h(1)), Slot::Scalar(9), Slot::Handle(h(3))]));
        pending.clear();
        assert_eq!(a.compare_shallow(&c, &mut pending), Ok(false));
        assert!(pending.is_empty());
    }

    #[test]
    fn array_rejects_scalar_store() {
        let mut array = HeapObject::Array(Array::new(vec![h(0)]));
        assert!(matches!(
            array.set_offset(0, Slot::Scalar(1)),
            Err(ObjectError::SlotMismatch { kind: ObjectKind::Array, .. })
        ));
        assert_eq!(array.set_offset(0, Slot::Handle(h(8))), Ok(Slot::Handle(h(0))));
        assert_eq!(array.get_offset(0), Ok(Slot::Handle(h(8))));
    }
}
