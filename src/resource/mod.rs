//! Shared-resource lifecycle management
//!
//! A [`SharedResource`] couples an opaque payload with one [`RefCount`] and
//! a release policy that reclaims the payload exactly once, when the last
//! owner drops its reference.
//!
//! [`RefCount`]: crate::refcount::RefCount

pub mod policy;
pub mod shared;

// Re-export main types
pub use policy::{FnPolicy, PageRelease, ReleasePolicy};
pub use shared::{Ref, SharedResource};
