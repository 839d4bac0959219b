//! Immutable, cheaply-cloneable view over cached bytes.
//!
//! Backed by `bytes::Bytes` rather than a fixed-size buffer: cached values
//! are arbitrary length and shared read-only between the store, the group's
//! two cache tiers, and outbound peer responses without copying.

use bytes::Bytes;
use std::fmt;

/// An immutable byte value handed in and out of the cache.
///
/// Cloning is O(1) (refcount bump). `ByteView` never exposes a mutable
/// view of its bytes — callers that need to mutate must copy out first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ByteView(Bytes);

impl ByteView {
    /// Builds a view by copying the given slice.
    pub fn copy_from(data: &[u8]) -> Self {
        ByteView(Bytes::copy_from_slice(data))
    }

    /// Builds a view taking ownership of an existing `Vec<u8>` without copying.
    pub fn from_vec(data: Vec<u8>) -> Self {
        ByteView(Bytes::from(data))
    }

    /// Builds a view from an already-refcounted `Bytes` without copying.
    pub fn from_bytes(data: Bytes) -> Self {
        ByteView(data)
    }

    /// Number of bytes held by this view.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns a defensive copy as an owned `Vec<u8>`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Approximate heap footprint of this view, used by the replacement
    /// store for byte-budget accounting.
    pub fn weight(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() <= 32 {
            write!(f, "ByteView({:?})", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "ByteView({} bytes)", self.0.len())
        }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        ByteView::copy_from(s.as_bytes())
    }
}

impl From<String> for ByteView {
    fn from(s: String) -> Self {
        ByteView::from_vec(s.into_bytes())
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(v: Vec<u8>) -> Self {
        ByteView::from_vec(v)
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_cheap_and_equal() {
        let a = ByteView::copy_from(b"hello");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn to_vec_is_a_defensive_copy() {
        let a = ByteView::copy_from(b"hello");
        let mut v = a.to_vec();
        v.push(b'!');
        assert_eq!(a.as_bytes(), b"hello");
        assert_eq!(v, b"hello!");
    }

    #[test]
    fn from_vec_avoids_copy_semantics_still_hold() {
        let v = vec![1u8, 2, 3];
        let view = ByteView::from_vec(v);
        assert_eq!(view.as_bytes(), &[1, 2, 3]);
        assert_eq!(view.weight(), 3);
    }
}
