//! Fragment cache over a single backing shared resource

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UnrefError};
use crate::fragments::handle::FragmentHandle;
use crate::fragments::stats::{AtomicFragmentCacheStats, FragmentCacheStats};
use crate::host::{NodeLocality, PageHandle};
use crate::resource::shared::SharedResource;

/// Lifecycle state of a fragment cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheState {
    /// Fragments may still be issued
    Active,
    /// No further issuance; outstanding fragments still in flight
    Draining,
    /// Terminal; the backing resource has been released
    Drained,
}

const STATE_ACTIVE: u8 = 0;
const STATE_DRAINING: u8 = 1;
const STATE_DRAINED: u8 = 2;

impl CacheState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            STATE_ACTIVE => Self::Active,
            STATE_DRAINING => Self::Draining,
            _ => Self::Drained,
        }
    }

    /// State name as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Draining => "Draining",
            Self::Drained => "Drained",
        }
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic cache identity, used to reject foreign fragment handles
fn next_cache_id() -> u64 {
    static CACHE_ID: AtomicU64 = AtomicU64::new(1);
    CACHE_ID.fetch_add(1, Ordering::SeqCst)
}

/// A pool of fixed-size fragments carved out of one backing resource
///
/// Each issued fragment holds one unit of `outstanding` rather than its own
/// backing reference; the cache amortizes every fragment holder into the
/// single reference it took at construction. The backing resource is
/// released exactly once, when the cache is draining and the last fragment
/// comes home, in whichever order those two events arrive.
///
/// All operations are short bounded sequences of atomics and never block.
/// State transitions (`Active` → `Draining` → `Drained`) are CAS-guarded so
/// concurrent drainers and returners cannot double-release the backing page.
pub struct FragmentCache<P: Send + 'static> {
    backing: Arc<SharedResource<P>>,
    fragment_size: usize,
    capacity: usize,
    /// Bump cursor into the backing payload; only ever grows
    cursor: AtomicUsize,
    outstanding: AtomicU32,
    state: AtomicU8,
    cache_id: u64,
    stats: AtomicFragmentCacheStats,
    locality: Option<(PageHandle, Arc<dyn NodeLocality>)>,
}

impl<P: Send + 'static> FragmentCache<P> {
    /// Create a cache carving `capacity` bytes into `fragment_size` pieces
    ///
    /// The cache adopts the caller's reference on `backing` and releases it
    /// when drained.
    pub fn new(
        backing: Arc<SharedResource<P>>,
        fragment_size: usize,
        capacity: usize,
    ) -> Result<Self> {
        if fragment_size == 0 {
            return Err(UnrefError::invalid_parameter(
                "fragment_size",
                "fragment size cannot be zero",
            ));
        }
        if fragment_size > capacity {
            return Err(UnrefError::invalid_parameter(
                "fragment_size",
                "fragment size exceeds backing capacity",
            ));
        }

        Ok(Self {
            backing,
            fragment_size,
            capacity,
            cursor: AtomicUsize::new(0),
            outstanding: AtomicU32::new(0),
            state: AtomicU8::new(STATE_ACTIVE),
            cache_id: next_cache_id(),
            stats: AtomicFragmentCacheStats::new(),
            locality: None,
        })
    }

    /// Create a cache that consults a locality predicate before issuance
    ///
    /// A backing page that has gone remote or come under memory-pressure
    /// reclaim is not recycled: further issuance fails and the caller is
    /// expected to move to a fresh backing resource.
    pub fn with_locality(
        backing: Arc<SharedResource<P>>,
        fragment_size: usize,
        capacity: usize,
        page: PageHandle,
        locality: Arc<dyn NodeLocality>,
    ) -> Result<Self> {
        let mut cache = Self::new(backing, fragment_size, capacity)?;
        cache.locality = Some((page, locality));
        Ok(cache)
    }

    /// Current lifecycle state
    pub fn state(&self) -> CacheState {
        CacheState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Fragments issued and not yet returned
    pub fn outstanding(&self) -> u32 {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Bytes of the backing payload not yet carved up
    pub fn remaining(&self) -> usize {
        self.capacity
            .saturating_sub(self.cursor.load(Ordering::SeqCst))
    }

    /// Configured fragment size in bytes
    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    /// Total capacity of the backing payload in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The backing resource
    pub fn backing(&self) -> &Arc<SharedResource<P>> {
        &self.backing
    }

    /// Activity snapshot
    pub fn stats(&self) -> FragmentCacheStats {
        self.stats.snapshot()
    }

    /// Issue one fragment, claiming the next `fragment_size` byte range
    ///
    /// Fails with [`UnrefError::Exhausted`] when the backing payload has
    /// insufficient space left (or is no longer worth recycling per the
    /// locality predicate), and with [`UnrefError::InvalidState`] once the
    /// cache has begun draining.
    pub fn issue_fragment(&self) -> Result<FragmentHandle> {
        let state = self.state();
        if state != CacheState::Active {
            return Err(UnrefError::invalid_state("Active", state.as_str()));
        }

        // Claim an outstanding unit before re-checking state, so a drain
        // racing with us either sees our claim or we see its state flip.
        let now_outstanding = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;

        let state = self.state();
        if state != CacheState::Active {
            self.release_outstanding(1)?;
            return Err(UnrefError::invalid_state("Active", state.as_str()));
        }

        if let Some((page, locality)) = &self.locality {
            if !locality.is_local_and_reusable(*page) {
                self.stats.record_failure();
                self.release_outstanding(1)?;
                return Err(UnrefError::exhausted(self.fragment_size, 0));
            }
        }

        // Reserve the byte range with a CAS loop; no transient overshoot
        // that could fail a racing legitimate request.
        let mut offset = self.cursor.load(Ordering::SeqCst);
        loop {
            let end = offset + self.fragment_size;
            if end > self.capacity {
                self.stats.record_failure();
                self.release_outstanding(1)?;
                return Err(UnrefError::exhausted(
                    self.fragment_size,
                    self.capacity - offset,
                ));
            }
            match self.cursor.compare_exchange_weak(
                offset,
                end,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => offset = actual,
            }
        }

        self.stats.record_issued(now_outstanding);
        Ok(FragmentHandle::new(
            self.cache_id,
            offset,
            self.fragment_size,
        ))
    }

    /// Return a fragment to the cache, consuming its handle
    ///
    /// When this was the last outstanding fragment and the cache is
    /// draining, the backing resource is released and the cache reaches
    /// `Drained`.
    pub fn return_fragment(&self, handle: FragmentHandle) -> Result<()> {
        if handle.cache_id() != self.cache_id {
            return Err(UnrefError::invalid_parameter(
                "handle",
                "fragment handle belongs to a different cache",
            ));
        }

        self.release_outstanding(1)?;
        self.stats.record_returned(1);
        Ok(())
    }

    /// Stop issuance; release the backing resource once nothing is outstanding
    ///
    /// Idempotent: draining an already draining or drained cache is a no-op,
    /// never a double free. When nothing is outstanding at the time of the
    /// call, the release happens immediately.
    pub fn drain(&self) -> Result<()> {
        self.mark_draining();
        if self.outstanding.load(Ordering::SeqCst) == 0 {
            self.try_complete_drain()?;
        }
        Ok(())
    }

    /// Drain, retiring `count` outstanding fragments in one transaction
    ///
    /// The amortized bulk form for callers that tracked their own holders
    /// and no longer have individual handles.
    pub fn drain_by(&self, count: u32) -> Result<()> {
        self.mark_draining();
        if count == 0 {
            if self.outstanding.load(Ordering::SeqCst) == 0 {
                self.try_complete_drain()?;
            }
            return Ok(());
        }

        self.release_outstanding(count)?;
        self.stats.record_returned(count);
        Ok(())
    }

    fn mark_draining(&self) {
        let _ = self.state.compare_exchange(
            STATE_ACTIVE,
            STATE_DRAINING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Retire `n` outstanding units; completes the drain on the last one
    fn release_outstanding(&self, n: u32) -> Result<()> {
        let previous = self.outstanding.fetch_sub(n, Ordering::SeqCst);
        if previous < n {
            self.outstanding.fetch_add(n, Ordering::SeqCst);
            log::error!(
                "fragment cache underflow: retiring {} with {} outstanding",
                n,
                previous
            );
            return Err(UnrefError::integrity(previous, n));
        }

        if previous == n && self.state() == CacheState::Draining {
            self.try_complete_drain()?;
        }
        Ok(())
    }

    /// Move `Draining` → `Drained`; the CAS winner releases the backing
    fn try_complete_drain(&self) -> Result<()> {
        if self
            .state
            .compare_exchange(
                STATE_DRAINING,
                STATE_DRAINED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            self.backing.release()?;
        }
        Ok(())
    }
}

impl<P: Send + 'static> fmt::Debug for FragmentCache<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentCache")
            .field("state", &self.state())
            .field("outstanding", &self.outstanding())
            .field("fragment_size", &self.fragment_size)
            .field("remaining", &self.remaining())
            .finish()
    }
}
