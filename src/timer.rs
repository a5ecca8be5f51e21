//! Deferred timers with explicit arming
//!
//! Construction and activation are two distinct operations. A timer is built
//! inert, armed explicitly with a deadline, and fired at most once per arm by
//! the host's scheduler tick. Scheduling itself belongs to the host; this
//! type only carries the callback and the armed/deadline state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A callback that fires at most once per arming
///
/// Deadlines are expressed in host ticks; the core attaches no unit to them.
pub struct DeferredTimer {
    callback: Box<dyn Fn() + Send + Sync>,
    armed: AtomicBool,
    deadline: AtomicU64,
}

impl DeferredTimer {
    /// Construct an inert timer; it will not fire until armed
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            armed: AtomicBool::new(false),
            deadline: AtomicU64::new(0),
        }
    }

    /// Arm the timer to fire at `deadline` ticks
    ///
    /// Re-arming an already armed timer replaces its deadline.
    pub fn arm(&self, deadline: u64) {
        self.deadline.store(deadline, Ordering::Release);
        self.armed.store(true, Ordering::Release);
    }

    /// Disarm without firing; returns whether the timer was armed
    pub fn disarm(&self) -> bool {
        self.armed.swap(false, Ordering::AcqRel)
    }

    /// Whether the timer is currently armed
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Host scheduler tick: run the callback if armed and due
    ///
    /// The armed flag is consumed atomically, so concurrent ticks run the
    /// callback at most once per arm. Returns whether the callback ran.
    pub fn fire_if_due(&self, now: u64) -> bool {
        if !self.armed.load(Ordering::Acquire) {
            return false;
        }
        if now < self.deadline.load(Ordering::Acquire) {
            return false;
        }
        if self.armed.swap(false, Ordering::AcqRel) {
            (self.callback)();
            return true;
        }
        false
    }
}

impl fmt::Debug for DeferredTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredTimer")
            .field("armed", &self.is_armed())
            .field("deadline", &self.deadline.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
