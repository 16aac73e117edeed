//! Validation Nodes
//!
//! This module defines the per-artifact validity node that lives in the
//! dependency graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::error::DependencyError;
use super::registry::DependencyRegistry;

/// Number of dependencies a node stores inline before spilling to the heap.
pub const INLINE_DEPENDENCIES: usize = 4;

/// Shared handle to a validation node. Cache entries keep one of these next
/// to the artifact they describe.
pub type DepVal = Arc<DependencyValidation>;

/// Unique identifier for a node in the dependency graph.
///
/// Ids are handed out by a process-wide counter and never reused, which makes
/// them a stable sort key for the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidationId(u64);

impl ValidationId {
    /// Generate a new unique id.
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ValidationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "depval#{}", self.0)
    }
}

/// Something that wants to hear about a change to an input.
///
/// File monitors and the registry only ever talk to this trait, so hosts can
/// hang their own hooks off a watched file next to regular validation nodes.
pub trait OnChangeCallback: Send + Sync {
    /// Called when the watched input changed.
    fn on_change(&self);
}

/// The validity of one cached artifact.
///
/// A node starts with a validation index of zero. Every call to
/// [`on_change`](Self::on_change) raises the index and invalidates every
/// dependent registered through [`register_dependency`](Self::register_dependency).
///
/// The index is read without taking the registry lock. A reader may see a
/// slightly stale value but never one that goes backwards, so a cache that
/// keys off the index must re-check it before trusting a result.
pub struct DependencyValidation {
    id: ValidationId,

    /// Number of invalidations observed so far. Only increases.
    validation_index: AtomicU64,

    /// The registry this node records its edges in.
    registry: Arc<DependencyRegistry>,

    /// Strong references to everything this node depends on.
    /// Never traversed; only keeps the inputs alive.
    dependencies: Mutex<SmallVec<[DepVal; INLINE_DEPENDENCIES]>>,
}

impl DependencyValidation {
    pub(crate) fn new(registry: &Arc<DependencyRegistry>) -> DepVal {
        Arc::new(Self {
            id: ValidationId::next(),
            validation_index: AtomicU64::new(0),
            registry: Arc::clone(registry),
            dependencies: Mutex::new(SmallVec::new()),
        })
    }

    /// Get the node's id.
    pub fn id(&self) -> ValidationId {
        self.id
    }

    /// Number of times this node has been invalidated. Zero means the
    /// artifact is still exactly as it was built.
    pub fn validation_index(&self) -> u64 {
        self.validation_index.load(Ordering::Acquire)
    }

    /// The registry this node belongs to.
    pub fn registry(&self) -> &Arc<DependencyRegistry> {
        &self.registry
    }

    /// Number of dependencies this node is keeping alive, duplicates included.
    pub fn dependency_count(&self) -> usize {
        self.dependencies.lock().len()
    }

    /// Mark this node invalid and propagate to every registered dependent.
    ///
    /// Must not be called from a dependent's invalidation path in a way that
    /// blocks on another thread waiting for the same registry; the registry
    /// lock is held for the whole propagation.
    pub fn on_change(&self) {
        self.validation_index.fetch_add(1, Ordering::AcqRel);
        self.registry.propagate(self.id);
    }

    /// Declare that `self` becomes invalid whenever `dependency` does.
    ///
    /// If `dependency` has already been invalidated by the time the edge is
    /// recorded, `self` is invalidated immediately. Without that check an
    /// input that changed between being read and being registered would
    /// leave `self` looking valid while built from stale data.
    ///
    /// Registering the same dependency twice records two edges; both fire.
    pub fn register_dependency(
        self: &Arc<Self>,
        dependency: &DepVal,
    ) -> Result<(), DependencyError> {
        if Arc::ptr_eq(self, dependency) {
            return Err(DependencyError::SelfDependency(self.id));
        }
        if !Arc::ptr_eq(&self.registry, &dependency.registry) {
            return Err(DependencyError::RegistryMismatch {
                dependent: self.id,
                dependency: dependency.id,
            });
        }

        let had_invalidation_at_start = self.registry.link(self, dependency);
        if had_invalidation_at_start {
            self.on_change();
        }
        Ok(())
    }

    /// Keep `dependency` alive for as long as `self` is. Called by the
    /// registry while it holds its lock.
    pub(crate) fn retain_dependency(&self, dependency: DepVal) {
        self.dependencies.lock().push(dependency);
    }

    #[cfg(test)]
    pub(crate) fn dependencies_spilled(&self) -> bool {
        self.dependencies.lock().spilled()
    }
}

impl OnChangeCallback for DependencyValidation {
    fn on_change(&self) {
        DependencyValidation::on_change(self);
    }
}

impl fmt::Debug for DependencyValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyValidation")
            .field("id", &self.id)
            .field("validation_index", &self.validation_index())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}
