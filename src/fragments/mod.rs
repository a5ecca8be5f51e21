//! Fragment caches: many small sub-allocations over one shared resource
//!
//! Splitting a single backing page into fixed-size fragments avoids a host
//! allocator round trip per network packet. The cache tracks outstanding
//! fragments independently of the backing reference count and drains the
//! backing resource only when both say nobody is left.

pub mod cache;
pub mod handle;
pub mod stats;

// Re-export main types
pub use cache::{CacheState, FragmentCache};
pub use handle::FragmentHandle;
pub use stats::{AtomicFragmentCacheStats, FragmentCacheStats};
