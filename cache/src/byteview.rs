//! Immutable byte values.

use bytes::Bytes;
use std::fmt;

/// An immutable view over cached bytes.
///
/// `ByteView` is the value type stored in every cache and returned to
/// callers. Cloning is a reference-count bump; the underlying bytes are
/// never mutated, so a view handed out to a caller cannot be used to
/// corrupt cached state. Callers that need owned, mutable bytes copy out
/// with [`ByteView::to_vec`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Wrap existing bytes without copying.
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Copy `data` into a freshly allocated buffer.
    ///
    /// Use this when the source buffer is borrowed or may be reused by
    /// the producer (e.g. loader output).
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Length of the value in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the underlying bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copy the value out into an owned buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Unwrap into the underlying `Bytes`.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Bytes> for ByteView {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self::new(Bytes::from(data))
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        Self::copy_from_slice(data)
    }
}

impl From<&str> for ByteView {
    fn from(data: &str) -> Self {
        Self::copy_from_slice(data.as_bytes())
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView").field("len", &self.len()).finish()
    }
}

impl fmt::Display for ByteView {
    /// Renders the value as UTF-8 (lossy). Intended for logs and tests.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.data))
    }
}
