//! Release policies: how a payload is reclaimed once the last owner is gone

use std::fmt;
use std::sync::Arc;

use crate::host::{PageAllocator, PageHandle};

/// Caller-supplied reclamation strategy for a payload
///
/// Invoked exactly once per resource lifetime, by whichever thread observes
/// the terminal zero on the reference count. Implementations must not block;
/// they typically hand the payload straight back to a host allocator or pool.
pub trait ReleasePolicy<P>: Send + Sync {
    /// Reclaim the payload
    fn release(&self, payload: P);
}

/// Adapter turning any closure into a release policy
pub struct FnPolicy<F>(F);

impl<F> FnPolicy<F> {
    /// Wrap a closure as a release policy
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<P, F> ReleasePolicy<P> for FnPolicy<F>
where
    F: Fn(P) + Send + Sync,
{
    fn release(&self, payload: P) {
        (self.0)(payload)
    }
}

impl<F> fmt::Debug for FnPolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPolicy").finish_non_exhaustive()
    }
}

/// Policy that frees a compound page through the host allocator
///
/// Captures the compound order at construction, so release reclaims
/// `2^order` pages in one allocator call.
#[derive(Clone)]
pub struct PageRelease {
    allocator: Arc<dyn PageAllocator>,
    order: u8,
}

impl PageRelease {
    /// Create a policy releasing `2^order` pages through `allocator`
    pub fn new(allocator: Arc<dyn PageAllocator>, order: u8) -> Self {
        Self { allocator, order }
    }

    /// Compound order this policy reclaims
    pub fn order(&self) -> u8 {
        self.order
    }
}

impl ReleasePolicy<PageHandle> for PageRelease {
    fn release(&self, page: PageHandle) {
        self.allocator.free_pages(page, self.order);
    }
}

impl fmt::Debug for PageRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRelease")
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}
