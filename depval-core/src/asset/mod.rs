//! Asset Availability
//!
//! Artifacts are produced on background threads. Until a producer finishes,
//! callers see them through an [`AsyncMarker`] that reports one of three
//! [`AssetState`]s:
//!
//! - `Pending`: still being built. Ask again later.
//! - `Ready`: built successfully.
//! - `Invalid`: the build failed and will keep failing until one of its
//!   inputs changes.
//!
//! When a caller asks for an artifact that is not ready, it gets an
//! [`AssetError`] describing why. The invalid kinds carry the
//! [`DependencyValidation`](crate::graph::DependencyValidation) of the failed
//! build, so a cache can hold on to the failure and drop it the moment an
//! input is fixed.
//!
//! # Waiting
//!
//! [`AsyncMarker::stall_while_pending`] blocks by polling with a capped
//! backoff rather than parking on a condition variable. The producer side
//! never has to signal anything, and the waiting thread holds no lock that
//! the producer's thread pool could end up contending on.

mod error;
mod marker;
mod policy;
mod record;
mod state;

pub use error::{
    AssetError, Blob, ConstructionError, ConstructionReason, InvalidAsset, PendingAsset,
};
pub use marker::AsyncMarker;
pub use policy::StallPolicy;
pub use record::AssetRecord;
pub use state::{is_invalidated, AssetState};
