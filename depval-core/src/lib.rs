//! Depval Core
//!
//! This crate provides the invalidation core of an asset pipeline. It
//! implements:
//!
//! - A dependency validation graph that records which cached artifacts were
//!   built from which inputs, and invalidates every dependent artifact when
//!   an input changes
//! - Async availability markers (pending / ready / invalid) with a
//!   lock-free blocking wait
//! - The error types a cache receives when an artifact is not available
//! - Adapters for external file monitors and compile operations
//!
//! Everything is in-memory and single-process. Loading, compiling, caching
//! and watching the filesystem all happen elsewhere.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Validation nodes and the registry of edges between them
//! - `asset`: Availability states, markers and unavailability errors
//! - `deps`: File monitor and compile output adapters
//!
//! # Example
//!
//! ```rust
//! use depval_core::graph::DependencyRegistry;
//!
//! let registry = DependencyRegistry::new();
//!
//! // A texture and the material built from it.
//! let texture = registry.create();
//! let material = registry.create();
//! material.register_dependency(&texture).unwrap();
//!
//! // The texture changes on disk.
//! texture.on_change();
//!
//! // The material is now stale and should be rebuilt.
//! assert_eq!(material.validation_index(), 1);
//! ```

pub mod asset;
pub mod deps;
pub mod graph;

pub use asset::{AssetError, AssetState, AsyncMarker};
pub use deps::{register_asset_dependency, register_file_dependency};
pub use graph::{DepVal, DependencyRegistry, DependencyValidation};
