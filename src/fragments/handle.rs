//! Issued fragment handles

use std::ops::Range;

/// A claim on one fragment of a cache's backing payload
///
/// Carries the byte range the fragment occupies within the backing payload.
/// Handles are move-only and consumed by
/// [`return_fragment`](crate::fragments::FragmentCache::return_fragment), so a
/// fragment cannot be returned twice without unsafe caller gymnastics.
#[derive(Debug, PartialEq, Eq)]
pub struct FragmentHandle {
    cache_id: u64,
    offset: usize,
    len: usize,
}

impl FragmentHandle {
    pub(crate) fn new(cache_id: u64, offset: usize, len: usize) -> Self {
        Self {
            cache_id,
            offset,
            len,
        }
    }

    pub(crate) fn cache_id(&self) -> u64 {
        self.cache_id
    }

    /// Byte offset of this fragment within the backing payload
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Fragment length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the fragment is zero-sized (never true for issued handles)
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The byte range this fragment occupies
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}
