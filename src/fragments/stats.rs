//! Fragment cache statistics tracking

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of fragment cache activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragmentCacheStats {
    /// Fragments successfully issued over the cache's lifetime
    pub fragments_issued: u64,
    /// Fragments returned (individually or via bulk drain)
    pub fragments_returned: u64,
    /// Issuance attempts rejected for lack of space or locality
    pub issuance_failures: u64,
    /// Highest number of fragments outstanding at once
    pub peak_outstanding: u32,
}

impl FragmentCacheStats {
    /// Create an empty statistics snapshot
    pub fn new() -> Self {
        Default::default()
    }

    /// Fragments currently unaccounted for (issued minus returned)
    pub fn outstanding(&self) -> u64 {
        self.fragments_issued.saturating_sub(self.fragments_returned)
    }

    /// Issuance success rate (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        let attempts = self.fragments_issued + self.issuance_failures;
        if attempts == 0 {
            return 1.0;
        }
        self.fragments_issued as f64 / attempts as f64
    }

    /// One-line summary for diagnostics
    pub fn summary(&self) -> String {
        format!(
            "FragmentCacheStats {{ issued: {}, returned: {}, failures: {}, \
             peak: {}, success_rate: {:.2}% }}",
            self.fragments_issued,
            self.fragments_returned,
            self.issuance_failures,
            self.peak_outstanding,
            self.success_rate() * 100.0
        )
    }
}

/// Thread-safe statistics shared by all contexts touching a cache
#[derive(Debug, Default)]
pub struct AtomicFragmentCacheStats {
    fragments_issued: AtomicU64,
    fragments_returned: AtomicU64,
    issuance_failures: AtomicU64,
    peak_outstanding: AtomicU32,
}

impl AtomicFragmentCacheStats {
    /// Create zeroed statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful issuance and the resulting outstanding level
    pub fn record_issued(&self, now_outstanding: u32) {
        self.fragments_issued.fetch_add(1, Ordering::Relaxed);

        let mut peak = self.peak_outstanding.load(Ordering::Relaxed);
        while now_outstanding > peak {
            match self.peak_outstanding.compare_exchange_weak(
                peak,
                now_outstanding,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => peak = actual,
            }
        }
    }

    /// Record `count` fragments returned
    pub fn record_returned(&self, count: u32) {
        self.fragments_returned
            .fetch_add(u64::from(count), Ordering::Relaxed);
    }

    /// Record a rejected issuance
    pub fn record_failure(&self) {
        self.issuance_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current snapshot
    pub fn snapshot(&self) -> FragmentCacheStats {
        FragmentCacheStats {
            fragments_issued: self.fragments_issued.load(Ordering::Relaxed),
            fragments_returned: self.fragments_returned.load(Ordering::Relaxed),
            issuance_failures: self.issuance_failures.load(Ordering::Relaxed),
            peak_outstanding: self.peak_outstanding.load(Ordering::Relaxed),
        }
    }
}
