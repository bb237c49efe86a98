use crate::HandleId;

/// A tagged 64-bit stack or blob slot.
///
/// - **Scalar**: a plain integer, or a float stored as its bit pattern.
/// - **Handle**: an owning reference to a heap object. Whoever holds the
///   slot owns one count of the object.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Scalar(i64),
    Handle(HandleId),
}

impl Slot {
    pub const ZERO: Slot = Slot::Scalar(0);

    // ── Scalars ────────────────────────────────────────────────────

    #[inline(always)]
    pub const fn from_bool(value: bool) -> Self {
        Slot::Scalar(value as i64)
    }

    #[inline(always)]
    pub const fn from_f64(value: f64) -> Self {
        Slot::Scalar(value.to_bits() as i64)
    }

    #[inline(always)]
    pub const fn is_scalar(self) -> bool {
        matches!(self, Slot::Scalar(_))
    }

    #[inline(always)]
    pub const fn as_scalar(self) -> Option<i64> {
        match self {
            Slot::Scalar(value) => Some(value),
            Slot::Handle(_) => None,
        }
    }

    /// Reinterprets the scalar bits as a float.
    #[inline(always)]
    pub const fn as_f64(self) -> Option<f64> {
        match self {
            Slot::Scalar(bits) => Some(f64::from_bits(bits as u64)),
            Slot::Handle(_) => None,
        }
    }

    // ── Handles ────────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_handle(self) -> bool {
        matches!(self, Slot::Handle(_))
    }

    #[inline(always)]
    pub const fn as_handle(self) -> Option<HandleId> {
        match self {
            Slot::Handle(handle) => Some(handle),
            Slot::Scalar(_) => None,
        }
    }
}

impl Default for Slot {
    fn default() -> Self {
        Slot::ZERO
    }
}

impl From<HandleId> for Slot {
    fn from(handle: HandleId) -> Self {
        Slot::Handle(handle)
    }
}

impl From<i64> for Slot {
    fn from(value: i64) -> Self {
        Slot::Scalar(value)
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Scalar(value) => write!(f, "{value}"),
            Slot::Handle(handle) => write!(f, "{handle:?}"),
        }
    }
}
