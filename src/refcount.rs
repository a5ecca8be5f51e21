//! Atomic reference counter with underflow detection
//!
//! A fixed-size machine-word counter shared by every owner of a resource.
//! The counter itself never frees anything; it only answers the one question
//! that matters for safe reclamation: "was mine the last reference?". The
//! answer comes from a single atomic read-modify-write, so two concurrent
//! droppers can never both observe the terminal zero.

use std::sync::atomic::{fence, AtomicU32, Ordering};

use crate::error::{Result, UnrefError};

/// Atomic shared-ownership counter
///
/// Created with the creator holding the first reference. Every additional
/// owner calls [`increment`](RefCount::increment); every dropped reference
/// goes through [`decrement_and_test`](RefCount::decrement_and_test), and
/// exactly one caller observes the transition to zero.
///
/// A decrement that would take the count below zero is a double-release bug
/// in the caller. It is detected, logged, compensated, and reported as
/// [`UnrefError::IntegrityViolation`] rather than silently tolerated.
#[derive(Debug)]
pub struct RefCount {
    count: AtomicU32,
}

impl RefCount {
    /// Create a counter with an explicit initial value
    pub fn new(initial: u32) -> Self {
        Self {
            count: AtomicU32::new(initial),
        }
    }

    /// Read the current count
    ///
    /// The value was true at some recent instant only. Callers must not act
    /// on it without a subsequent atomic compare-and-act operation; the one
    /// exception is the sole-owner fast path, where holding the last
    /// reference rules out concurrent mutation. While an underflowing
    /// decrement is being compensated the stored value transiently wraps,
    /// so a racing read can briefly observe a value near `u32::MAX`.
    pub fn read(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Add one reference, returning the previous count
    ///
    /// No upper bound is enforced; wraparound at `u32::MAX` is an accepted
    /// theoretical risk of this minimal-cost layer.
    pub fn increment(&self) -> u32 {
        self.count.fetch_add(1, Ordering::Relaxed)
    }

    /// Add `n` references in one transaction, returning the previous count
    pub fn add(&self, n: u32) -> u32 {
        self.count.fetch_add(n, Ordering::Relaxed)
    }

    /// Drop one reference; `Ok(true)` iff this was the last one
    pub fn decrement_and_test(&self) -> Result<bool> {
        self.sub_and_test(1)
    }

    /// Drop `n` references in one atomic transaction; `Ok(true)` iff the
    /// count reached exactly zero
    ///
    /// The multi-unit form lets a fragment cache amortize many outstanding
    /// holders into a single counter transaction when it drains.
    ///
    /// Ordering: the subtraction is a release operation, and the caller that
    /// observes zero executes an acquire fence, so that caller has visibility
    /// of all writes made under every previously held reference before the
    /// payload is reclaimed.
    ///
    /// Underflow detection subtracts first and compensates after, so between
    /// the two RMWs a concurrent [`read`](Self::read) can observe a wrapped
    /// value; the post-compensation count is exact.
    pub fn sub_and_test(&self, n: u32) -> Result<bool> {
        if n == 0 {
            return Ok(false);
        }

        let previous = self.count.fetch_sub(n, Ordering::Release);
        if previous < n {
            // Underflow: compensate so the stored value stays non-negative,
            // then report the double release instead of reusing the payload.
            self.count.fetch_add(n, Ordering::Relaxed);
            log::error!(
                "refcount underflow: decrement by {} with only {} reference(s) held",
                n,
                previous
            );
            return Err(UnrefError::integrity(previous, n));
        }

        if previous == n {
            fence(Ordering::Acquire);
            return Ok(true);
        }

        Ok(false)
    }

    /// Force the count to zero without the atomic RMW
    ///
    /// Only sound when the caller holds the last reference (`read() == 1`),
    /// in which case no other thread can race. Used by the sole-owner
    /// release fast path so a later stray release still trips underflow
    /// detection.
    pub(crate) fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

impl Default for RefCount {
    /// The creator is the first owner
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_count() {
        let rc = RefCount::default();
        assert_eq!(rc.read(), 1);

        let rc = RefCount::new(4);
        assert_eq!(rc.read(), 4);
    }

    #[test]
    fn test_increment_returns_previous() {
        let rc = RefCount::default();
        assert_eq!(rc.increment(), 1);
        assert_eq!(rc.increment(), 2);
        assert_eq!(rc.read(), 3);
    }

    #[test]
    fn test_decrement_to_zero() {
        let rc = RefCount::new(2);
        assert!(!rc.decrement_and_test().unwrap());
        assert!(rc.decrement_and_test().unwrap());
        assert_eq!(rc.read(), 0);
    }

    #[test]
    fn test_underflow_detected_and_compensated() {
        let rc = RefCount::default();
        assert!(rc.decrement_and_test().unwrap());

        let err = rc.decrement_and_test().unwrap_err();
        assert!(err.is_integrity_violation());
        // The compensating add keeps the stored value at zero.
        assert_eq!(rc.read(), 0);
    }

    #[test]
    fn test_sub_and_test_bulk() {
        let rc = RefCount::new(5);
        assert!(!rc.sub_and_test(3).unwrap());
        assert!(rc.sub_and_test(2).unwrap());
    }

    #[test]
    fn test_sub_and_test_zero_is_noop() {
        let rc = RefCount::default();
        assert!(!rc.sub_and_test(0).unwrap());
        assert_eq!(rc.read(), 1);
    }

    #[test]
    fn test_bulk_underflow() {
        let rc = RefCount::new(2);
        let err = rc.sub_and_test(3).unwrap_err();
        assert!(err.is_integrity_violation());
        assert_eq!(rc.read(), 2);
    }
}
