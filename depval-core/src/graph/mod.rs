//! Dependency Validation Graph
//!
//! This module tracks which cached artifacts derive from which inputs and
//! pushes "this input changed" notifications to every artifact built on top
//! of it.
//!
//! # Overview
//!
//! Every cached artifact owns a [`DependencyValidation`]. Its validation
//! index starts at zero and goes up each time the artifact becomes stale.
//! Edges are recorded in a [`DependencyRegistry`]:
//!
//! - The registry maps a dependency's [`ValidationId`] to weak references to
//!   its dependents, kept sorted so the dependents of one node form a single
//!   contiguous range.
//! - Each dependent holds its dependencies strongly, so an input stays alive
//!   exactly as long as something built from it does.
//!
//! When a node changes, [`DependencyValidation::on_change`] walks its range
//! and recursively invalidates every live dependent. Nothing is rebuilt here;
//! the cache that owns the artifacts notices the raised index and decides
//! what to do.
//!
//! # Design Decisions
//!
//! 1. The registry is a plain object passed around by `Arc` rather than a
//!    hidden singleton. [`DependencyRegistry::global`] exists for hosts that
//!    want one anyway.
//!
//! 2. Identities are counter-issued ids rather than addresses, so a freshly
//!    created node never inherits the stale entries of a dead one.
//!
//! 3. One re-entrant lock guards the whole table. Propagation calls back into
//!    `on_change` while holding it, and detects table mutation through a
//!    change counter instead of assuming its indices are still valid.

mod error;
mod node;
mod registry;

pub use error::DependencyError;
pub use node::{DepVal, DependencyValidation, OnChangeCallback, ValidationId, INLINE_DEPENDENCIES};
pub use registry::DependencyRegistry;
