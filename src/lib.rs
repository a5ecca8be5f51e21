//! # Unref - Atomic Shared-Ownership Counting with Policy-Based Release
//!
//! Unref is a reference-counted shared-resource lifecycle core for pooled,
//! concurrently-shared resources: network packet buffers, memory pages,
//! connections. A payload shared by many concurrent owners is released
//! exactly once, by whichever owner drops the last reference, under
//! concurrent access from interrupt-style and worker-thread contexts.
//!
//! ## Features
//!
//! - **Atomic reference counting**: single-RMW decrement-and-test, so two
//!   droppers can never both observe the last reference
//! - **Underflow detection**: double releases are logged and reported, never
//!   silently tolerated
//! - **Policy-based release**: the caller supplies how a payload is
//!   reclaimed; the core guarantees exactly-once invocation
//! - **Fragment caches**: one backing page carved into many packet-sized
//!   fragments, amortizing allocator round trips
//! - **Injected host seams**: page allocator and NUMA locality are explicit
//!   constructor dependencies, so everything tests without a host runtime
//! - **Never blocks**: every operation is a single atomic primitive or a
//!   short bounded sequence of them
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 FragmentCache                    │
//! │  outstanding fragments │ Active→Draining→Drained │
//! └───────────┬──────────────────────────────────────┘
//!             │ one amortized reference
//! ┌───────────▼──────────────────────────────────────┐
//! │                SharedResource<P>                 │
//! │  RefCount │ payload │ ReleasePolicy (run once)   │
//! └───────────┬──────────────────────────────────────┘
//!             │ exactly-once reclamation
//! ┌───────────▼──────────────────────────────────────┐
//! │   Host seams: PageAllocator / NodeLocality       │
//! └──────────────────────────────────────────────────┘
//! ```

// Core modules
pub mod error;
pub mod fragments;
pub mod host;
pub mod refcount;
pub mod resource;
pub mod timer;

// Main API re-exports
pub use error::{Result, UnrefError};
pub use fragments::{
    AtomicFragmentCacheStats, CacheState, FragmentCache, FragmentCacheStats, FragmentHandle,
};
pub use host::{CountingAllocator, FixedLocality, NodeLocality, PageAllocator, PageHandle};
pub use refcount::RefCount;
pub use resource::{FnPolicy, PageRelease, Ref, ReleasePolicy, SharedResource};
pub use timer::DeferredTimer;
