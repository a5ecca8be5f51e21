//! Host collaborator interfaces
//!
//! The lifecycle core never allocates memory or queries hardware itself.
//! Everything it needs from the surrounding runtime (page allocator, NUMA
//! locality) is an explicit dependency passed into constructors, so the core
//! is unit-testable without a host runtime. Deterministic test doubles for
//! both seams live here as well.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

/// Opaque handle to a page owned by the host allocator
///
/// The core treats the payload as an opaque token; only the release policy
/// hands it back to the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(pub usize);

impl PageHandle {
    /// Raw handle value
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Page reclamation seam into the host allocator
///
/// `free_pages` is invoked exactly once per resource lifetime, with the
/// compound order captured at construction. Reclamation failures are the
/// allocator's concern and are opaque to the core.
pub trait PageAllocator: Send + Sync {
    /// Return `2^order` pages to the host
    fn free_pages(&self, page: PageHandle, order: u8);
}

/// NUMA locality and memory-pressure query
///
/// A pure predicate: `true` means the page belongs to the local node and is
/// not earmarked for memory-pressure reclaim, so recycling it for further
/// fragment issuance is worthwhile.
pub trait NodeLocality: Send + Sync {
    /// Whether the page is local and safe to keep recycling
    fn is_local_and_reusable(&self, page: PageHandle) -> bool;
}

/// Test double that records every `free_pages` call
#[derive(Debug, Default)]
pub struct CountingAllocator {
    frees: AtomicU64,
    calls: Mutex<Vec<(PageHandle, u8)>>,
}

impl CountingAllocator {
    /// Create a fresh recording allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `free_pages` calls observed
    pub fn free_count(&self) -> u64 {
        self.frees.load(Ordering::SeqCst)
    }

    /// Every recorded `(page, order)` pair, in call order
    pub fn calls(&self) -> Vec<(PageHandle, u8)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PageAllocator for CountingAllocator {
    fn free_pages(&self, page: PageHandle, order: u8) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push((page, order));
    }
}

/// Test double with a constant locality answer
#[derive(Debug, Clone, Copy)]
pub struct FixedLocality(pub bool);

impl NodeLocality for FixedLocality {
    fn is_local_and_reusable(&self, _page: PageHandle) -> bool {
        self.0
    }
}
