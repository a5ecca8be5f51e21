//! Reference-counted shared resource with exactly-once release

use std::sync::atomic::{fence, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Result, UnrefError};
use crate::refcount::RefCount;
use crate::resource::policy::ReleasePolicy;

/// Payload plus the policy that reclaims it, taken exactly once
struct ReleaseSlot<P> {
    payload: P,
    policy: Box<dyn ReleasePolicy<P>>,
}

/// A payload shared by multiple concurrent owners
///
/// Couples one opaque payload with one [`RefCount`] and a release policy.
/// Owners in any execution context (interrupt-style producers, worker-thread
/// consumers) retain and release concurrently; the atomic decrement-and-test
/// guarantees exactly one of them observes the terminal zero and runs the
/// policy. After the policy has run, any further payload access through this
/// resource is a caller contract violation the core cannot detect post-hoc.
///
/// The `Arc` wrapper manages the memory of this bookkeeping struct itself;
/// the [`RefCount`] inside manages the lifetime of the *payload*. The two are
/// deliberately independent: a driver may keep the descriptor around after
/// the payload is gone, and a stray release then trips underflow detection
/// instead of corrupting memory.
pub struct SharedResource<P: Send + 'static> {
    refcount: RefCount,
    slot: Mutex<Option<ReleaseSlot<P>>>,
}

impl<P: Send + 'static> SharedResource<P> {
    /// Create a resource with the creator holding the first reference
    pub fn new(payload: P, policy: impl ReleasePolicy<P> + 'static) -> Arc<Self> {
        Self::with_initial_refs(payload, 1, policy)
    }

    /// Create a resource with an explicit initial reference count
    ///
    /// A fragment cache seeds the count with the number of holders it plans
    /// to amortize. `initial_refs` of zero would make the payload
    /// unreleasable and is treated as one.
    pub fn with_initial_refs(
        payload: P,
        initial_refs: u32,
        policy: impl ReleasePolicy<P> + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            refcount: RefCount::new(initial_refs.max(1)),
            slot: Mutex::new(Some(ReleaseSlot {
                payload,
                policy: Box::new(policy),
            })),
        })
    }

    /// Current reference count (advisory; see [`RefCount::read`])
    pub fn ref_count(&self) -> u32 {
        self.refcount.read()
    }

    /// Whether the release policy has already run
    pub fn is_released(&self) -> bool {
        self.slot.lock().unwrap().is_none()
    }

    /// Copy of the payload handle, `None` once released
    ///
    /// Only meaningful while the caller holds a reference.
    pub fn payload(&self) -> Option<P>
    where
        P: Copy,
    {
        self.slot.lock().unwrap().as_ref().map(|s| s.payload)
    }

    /// Add one raw reference, returning the previous count
    ///
    /// For callers that manage counts manually (the fragment cache); every
    /// raw retain must be paired with exactly one [`release`](Self::release).
    pub fn retain_raw(&self) -> u32 {
        self.refcount.increment()
    }

    /// Add `extra` raw references in one transaction
    pub fn retain_many(&self, extra: u32) -> u32 {
        self.refcount.add(extra)
    }

    /// Drop one reference; `Ok(true)` iff this call reclaimed the payload
    ///
    /// Fast path: when the count reads 1 the caller is the sole remaining
    /// owner (it holds a reference, and nobody else can retain without one),
    /// so the atomic RMW is skipped in favor of an acquire fence. Observable
    /// behavior is identical to [`release_slow`](Self::release_slow); the
    /// count still drops to zero so a later stray release trips underflow
    /// detection.
    pub fn release(&self) -> Result<bool> {
        if self.refcount.read() == 1 {
            fence(Ordering::Acquire);
            self.refcount.clear();
            return self.finish_release();
        }
        self.release_slow()
    }

    /// Drop one reference, always through the atomic decrement-and-test
    pub fn release_slow(&self) -> Result<bool> {
        if self.refcount.decrement_and_test()? {
            return self.finish_release();
        }
        Ok(false)
    }

    /// Drop `n` references in one counter transaction
    ///
    /// The amortized path used when a fragment cache drains many outstanding
    /// holders at once.
    pub fn release_many(&self, n: u32) -> Result<bool> {
        if self.refcount.sub_and_test(n)? {
            return self.finish_release();
        }
        Ok(false)
    }

    /// Terminal-zero path: run the policy, or report the double release
    ///
    /// A taken slot here means another caller already reclaimed the payload
    /// (a stale-reference bug the counter could not catch, e.g. two fast
    /// paths both reading a count of 1). Reported the same way the counter
    /// reports underflow.
    fn finish_release(&self) -> Result<bool> {
        if self.run_policy() {
            Ok(true)
        } else {
            Err(UnrefError::integrity(0, 1))
        }
    }

    /// Run the release policy; `false` if it had already run
    ///
    /// Only reachable from a thread that observed the terminal zero, so the
    /// lock is uncontended; it exists to move payload and policy out of the
    /// shared struct by value.
    fn run_policy(&self) -> bool {
        let taken = self.slot.lock().unwrap().take();
        if let Some(slot) = taken {
            slot.policy.release(slot.payload);
            true
        } else {
            log::error!("release policy invoked twice on the same resource");
            false
        }
    }
}

impl<P: Send + 'static> std::fmt::Debug for SharedResource<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResource")
            .field("ref_count", &self.ref_count())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Owned handle to a [`SharedResource`]
///
/// Holding a `Ref` guarantees the payload stays valid; dropping it releases
/// one reference. Cloning retains.
pub struct Ref<P: Send + 'static> {
    resource: Arc<SharedResource<P>>,
}

impl<P: Send + 'static> Ref<P> {
    /// Take an additional owned reference on `resource`
    pub fn retain(resource: &Arc<SharedResource<P>>) -> Self {
        resource.retain_raw();
        Self {
            resource: Arc::clone(resource),
        }
    }

    /// The resource this handle refers to
    pub fn resource(&self) -> &Arc<SharedResource<P>> {
        &self.resource
    }

    /// Copy of the payload handle
    pub fn payload(&self) -> Option<P>
    where
        P: Copy,
    {
        self.resource.payload()
    }
}

impl<P: Send + 'static> Clone for Ref<P> {
    fn clone(&self) -> Self {
        Self::retain(&self.resource)
    }
}

impl<P: Send + 'static> Drop for Ref<P> {
    fn drop(&mut self) {
        if let Err(e) = self.resource.release() {
            log::error!("dropping reference failed: {}", e);
        }
    }
}

impl<P: Send + 'static> std::fmt::Debug for Ref<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("ref_count", &self.resource.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::policy::FnPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_policy(hits: &Arc<AtomicUsize>) -> FnPolicy<impl Fn(u64) + Send + Sync> {
        let hits = Arc::clone(hits);
        FnPolicy::new(move |_payload: u64| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_single_owner_release() {
        let hits = Arc::new(AtomicUsize::new(0));
        let res = SharedResource::new(7u64, counting_policy(&hits));

        assert_eq!(res.ref_count(), 1);
        assert_eq!(res.payload(), Some(7));
        assert!(res.release().unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(res.is_released());
        assert_eq!(res.payload(), None);
    }

    #[test]
    fn test_retain_release_pairs() {
        let hits = Arc::new(AtomicUsize::new(0));
        let res = SharedResource::new(1u64, counting_policy(&hits));

        res.retain_raw();
        res.retain_raw();
        assert_eq!(res.ref_count(), 3);

        assert!(!res.release().unwrap());
        assert!(!res.release().unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert!(res.release().unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fast_and_slow_paths_equivalent() {
        for slow in [false, true] {
            let hits = Arc::new(AtomicUsize::new(0));
            let res = SharedResource::new(1u64, counting_policy(&hits));

            let last = if slow {
                res.release_slow().unwrap()
            } else {
                res.release().unwrap()
            };
            assert!(last);
            assert_eq!(hits.load(Ordering::SeqCst), 1);
            assert_eq!(res.ref_count(), 0);

            // A stray second release is reported either way.
            assert!(res.release_slow().unwrap_err().is_integrity_violation());
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_fast_path_double_release_is_reported() {
        let hits = Arc::new(AtomicUsize::new(0));
        let res = SharedResource::new(3u64, counting_policy(&hits));
        assert!(res.release().unwrap());

        // A stale holder re-adding a reference after the payload is gone
        // drives the fast path into an already-taken slot; that surfaces as
        // the same integrity error the slow path reports on underflow.
        res.retain_raw();
        let err = res.release().unwrap_err();
        assert!(err.is_integrity_violation());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ref_raii() {
        let hits = Arc::new(AtomicUsize::new(0));
        let res = SharedResource::new(9u64, counting_policy(&hits));

        {
            let r1 = Ref::retain(&res);
            let r2 = r1.clone();
            assert_eq!(res.ref_count(), 3);
            assert_eq!(r2.payload(), Some(9));
        }
        // Both RAII handles dropped; the constructor's reference remains.
        assert_eq!(res.ref_count(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert!(res.release().unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_with_initial_refs() {
        let hits = Arc::new(AtomicUsize::new(0));
        let res = SharedResource::with_initial_refs(2u64, 3, counting_policy(&hits));

        assert!(!res.release_slow().unwrap());
        assert!(!res.release_slow().unwrap());
        assert!(res.release_slow().unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_many() {
        let hits = Arc::new(AtomicUsize::new(0));
        let res = SharedResource::new(2u64, counting_policy(&hits));
        assert_eq!(res.retain_many(3), 1);
        assert_eq!(res.ref_count(), 4);

        assert!(!res.release_many(3).unwrap());
        assert!(res.release_many(1).unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
