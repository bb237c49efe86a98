use std::borrow::Cow;

/// Immutable-by-default byte string.
///
/// Bytes follow C-string rules: construction stops at the first NUL, so a
/// string never contains one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Str {
    bytes: Vec<u8>,
}

impl Str {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let mut bytes = bytes.into();
        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(nul);
        }
        Self { bytes }
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.bytes.extend_from_slice(&bytes[..end]);
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl From<&str> for Str {
    fn from(value: &str) -> Self {
        Str::new(value.as_bytes())
    }
}

impl From<String> for Str {
    fn from(value: String) -> Self {
        Str::new(value.into_bytes())
    }
}
