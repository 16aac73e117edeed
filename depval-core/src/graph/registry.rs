//! Dependency Registry
//!
//! The registry is the table of edges between validation nodes. It answers
//! one question quickly: "who depends on this node?"
//!
//! # How It Works
//!
//! 1. Edges are stored as `(dependency id, weak dependent)` pairs in a vector
//!    sorted by dependency id. The dependents of one node are one contiguous
//!    range, found with two binary searches.
//!
//! 2. Dependents are held weakly, so the table never keeps a cached artifact
//!    alive. Entries whose dependent has died are only removed when their
//!    range is next walked, or on an explicit [`DependencyRegistry::purge_expired`].
//!
//! 3. A `change_id` counter goes up on every structural change. Propagation
//!    compares it before and after each nested call to know when its indices
//!    have gone stale.
//!
//! # Thread Safety
//!
//! The table lives behind a single `parking_lot::ReentrantMutex`. Propagation
//! keeps it locked while it recurses into dependents, and the same thread
//! takes it again for every nested range. Interior access goes through a
//! `RefCell` whose borrows never span a nested call.

use std::cell::RefCell;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::ReentrantMutex;
use tracing::{debug, trace};

use super::node::{DepVal, DependencyValidation, ValidationId};

/// One edge: `dependent` becomes invalid whenever `dependency` does.
struct Edge {
    dependency: ValidationId,
    dependent: Weak<DependencyValidation>,
}

impl Edge {
    fn points_to(&self, node: &DependencyValidation) -> bool {
        std::ptr::eq(self.dependent.as_ptr(), node)
    }

    fn is_expired(&self) -> bool {
        self.dependent.strong_count() == 0
    }
}

#[derive(Default)]
struct EdgeTable {
    /// Sorted by `dependency`. Edges with equal keys keep insertion order.
    edges: Vec<Edge>,
    change_id: u64,
}

impl EdgeTable {
    fn range_of(&self, key: ValidationId) -> Range<usize> {
        let start = self.edges.partition_point(|e| e.dependency < key);
        let len = self.edges[start..].partition_point(|e| e.dependency == key);
        start..start + len
    }

    /// Insert after any existing edges with the same key, so a traversal in
    /// progress over that key still finds the entries it already visited in
    /// the same relative order.
    fn insert(&mut self, dependency: ValidationId, dependent: Weak<DependencyValidation>) {
        let at = self.edges.partition_point(|e| e.dependency <= dependency);
        self.edges.insert(at, Edge { dependency, dependent });
        self.bump();
    }

    /// Remove expired edges from `range` only. Expired edges elsewhere are
    /// left for their own traversal.
    fn prune(&mut self, range: Range<usize>) -> usize {
        let before = self.edges.len();
        let mut index = 0;
        self.edges.retain(|edge| {
            let keep = !range.contains(&index) || !edge.is_expired();
            index += 1;
            keep
        });
        before - self.edges.len()
    }

    /// Find the `ordinal`-th edge in `range` that points to `node`.
    fn locate(
        &self,
        range: Range<usize>,
        node: &DependencyValidation,
        ordinal: usize,
    ) -> Option<usize> {
        range
            .filter(|&i| self.edges[i].points_to(node))
            .nth(ordinal)
    }

    fn bump(&mut self) {
        self.change_id = self.change_id.wrapping_add(1);
    }
}

/// The table of dependency edges shared by a family of validation nodes.
///
/// Nodes are created through [`create`](Self::create) and remember the
/// registry they came from; edges can only be recorded between nodes of the
/// same registry.
pub struct DependencyRegistry {
    table: ReentrantMutex<RefCell<EdgeTable>>,
}

static GLOBAL: OnceLock<Arc<DependencyRegistry>> = OnceLock::new();

impl DependencyRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            table: ReentrantMutex::new(RefCell::new(EdgeTable::default())),
        })
    }

    /// A lazily created process-wide registry, for hosts that prefer a
    /// singleton over passing one around.
    pub fn global() -> &'static Arc<DependencyRegistry> {
        GLOBAL.get_or_init(DependencyRegistry::new)
    }

    /// Create a new validation node recorded in this registry.
    pub fn create(self: &Arc<Self>) -> DepVal {
        DependencyValidation::new(self)
    }

    /// Number of edges currently recorded, expired ones included.
    pub fn edge_count(&self) -> usize {
        self.table.lock().borrow().edges.len()
    }

    /// Current value of the structural change counter.
    pub fn change_id(&self) -> u64 {
        self.table.lock().borrow().change_id
    }

    /// Drop every edge. Returns how many were removed.
    ///
    /// Nodes stay usable and may register new edges afterwards. Strong
    /// dependency references held by the nodes themselves are not touched.
    pub fn shutdown(&self) -> usize {
        let dropped = {
            let guard = self.table.lock();
            let mut table = guard.borrow_mut();
            table.bump();
            std::mem::take(&mut table.edges)
        };
        // Dropping the weak refs outside the lock.
        let count = dropped.len();
        drop(dropped);
        debug!(edges = count, "dependency registry shut down");
        count
    }

    /// Remove every edge whose dependent has been destroyed, across all keys.
    /// Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let guard = self.table.lock();
        let mut table = guard.borrow_mut();
        let before = table.edges.len();
        table.edges.retain(|edge| !edge.is_expired());
        let removed = before - table.edges.len();
        if removed > 0 {
            table.bump();
            debug!(removed, "purged expired dependents");
        }
        removed
    }

    /// Record that `dependent` depends on `dependency` and take a strong
    /// reference to `dependency` on the dependent's behalf.
    ///
    /// Returns whether `dependency` had already been invalidated when the
    /// edge was recorded.
    pub(crate) fn link(&self, dependent: &DepVal, dependency: &DepVal) -> bool {
        let guard = self.table.lock();
        let had_invalidation = dependency.validation_index() != 0;
        guard
            .borrow_mut()
            .insert(dependency.id(), Arc::downgrade(dependent));
        dependent.retain_dependency(Arc::clone(dependency));
        trace!(dependent = %dependent.id(), dependency = %dependency.id(), "registered dependency");
        had_invalidation
    }

    /// Invalidate every live dependent of `source`.
    ///
    /// Each dependent's `on_change` runs with the lock still held and may
    /// itself insert or prune edges, shifting `source`'s range. When that
    /// happens the range is looked up again and the cursor is moved back onto
    /// the edge just visited. That edge is guaranteed to still be there: it
    /// points to a node we hold strongly, so nothing prunes it, and new edges
    /// under the same key only ever land after it.
    pub(crate) fn propagate(&self, source: ValidationId) {
        let guard = self.table.lock();

        let (mut range, mut seen_change) = {
            let table = guard.borrow();
            (table.range_of(source), table.change_id)
        };
        if range.is_empty() {
            return;
        }
        trace!(%source, dependents = range.len(), "propagating change");

        let mut cursor = range.start;
        let mut found_expired = false;

        while cursor < range.end {
            let (dependent, ordinal) = {
                let table = guard.borrow();
                match table.edges[cursor].dependent.upgrade() {
                    Some(dependent) => {
                        // Duplicate edges to the same dependent are told apart
                        // by how many of them precede the cursor.
                        let ordinal = table.edges[range.start..cursor]
                            .iter()
                            .filter(|edge| edge.points_to(&dependent))
                            .count();
                        (dependent, ordinal)
                    }
                    None => {
                        found_expired = true;
                        cursor += 1;
                        continue;
                    }
                }
            };

            dependent.on_change();

            let table = guard.borrow();
            if table.change_id != seen_change {
                seen_change = table.change_id;
                range = table.range_of(source);
                match table.locate(range.clone(), &dependent, ordinal) {
                    Some(position) => cursor = position,
                    None => {
                        // Only a shutdown from inside a dependent gets here.
                        debug!(%source, "edge table cleared during propagation");
                        return;
                    }
                }
            }
            cursor += 1;
        }

        if found_expired {
            let mut table = guard.borrow_mut();
            let range = table.range_of(source);
            let removed = table.prune(range);
            table.bump();
            debug!(%source, removed, "pruned expired dependents");
        }
    }
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (edges, change_id) = {
            let guard = self.table.lock();
            let table = guard.borrow();
            (table.edges.len(), table.change_id)
        };
        f.debug_struct("DependencyRegistry")
            .field("edges", &edges)
            .field("change_id", &change_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(registry: &DependencyRegistry) -> Vec<ValidationId> {
        let guard = registry.table.lock();
        let table = guard.borrow();
        table.edges.iter().map(|edge| edge.dependency).collect()
    }

    #[test]
    fn edges_stay_sorted_by_dependency() {
        let registry = DependencyRegistry::new();
        let nodes: Vec<_> = (0..5).map(|_| registry.create()).collect();

        // Register in an order that does not match id order.
        nodes[0].register_dependency(&nodes[4]).unwrap();
        nodes[1].register_dependency(&nodes[2]).unwrap();
        nodes[3].register_dependency(&nodes[4]).unwrap();
        nodes[0].register_dependency(&nodes[1]).unwrap();

        let keys = keys(&registry);
        assert_eq!(keys.len(), 4);
        assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn range_lookup_finds_contiguous_dependents() {
        let registry = DependencyRegistry::new();
        let dependency = registry.create();
        let other = registry.create();
        let dependents: Vec<_> = (0..3).map(|_| registry.create()).collect();

        for dependent in &dependents {
            dependent.register_dependency(&dependency).unwrap();
            dependent.register_dependency(&other).unwrap();
        }

        let guard = registry.table.lock();
        let table = guard.borrow();
        assert_eq!(table.range_of(dependency.id()).len(), 3);
        assert_eq!(table.range_of(other.id()).len(), 3);
        assert!(table.range_of(dependents[0].id()).is_empty());
    }

    #[test]
    fn insert_bumps_change_id() {
        let registry = DependencyRegistry::new();
        let a = registry.create();
        let b = registry.create();

        let before = registry.change_id();
        a.register_dependency(&b).unwrap();
        assert_ne!(registry.change_id(), before);
    }

    #[test]
    fn expired_dependents_pruned_on_traversal() {
        let registry = DependencyRegistry::new();
        let dependency = registry.create();
        let survivor = registry.create();
        let doomed = registry.create();

        survivor.register_dependency(&dependency).unwrap();
        doomed.register_dependency(&dependency).unwrap();
        assert_eq!(registry.edge_count(), 2);

        drop(doomed);
        // Destruction alone does not touch the table.
        assert_eq!(registry.edge_count(), 2);

        dependency.on_change();
        assert_eq!(registry.edge_count(), 1);
        assert_eq!(survivor.validation_index(), 1);

        let change_id = registry.change_id();
        dependency.on_change();
        assert_eq!(registry.edge_count(), 1);
        assert_eq!(survivor.validation_index(), 2);
        // Nothing left to prune the second time.
        assert_eq!(registry.change_id(), change_id);
    }

    #[test]
    fn pruning_is_limited_to_traversed_range() {
        let registry = DependencyRegistry::new();
        let first = registry.create();
        let second = registry.create();

        for dependency in [&first, &second] {
            let dependent = registry.create();
            dependent.register_dependency(dependency).unwrap();
        }
        assert_eq!(registry.edge_count(), 2);

        first.on_change();
        assert_eq!(keys(&registry), vec![second.id()]);
    }

    #[test]
    fn nested_pruning_does_not_skip_siblings() {
        let registry = DependencyRegistry::new();

        // `middle` is created first so its edges sort before `source`'s.
        // Pruning them during the nested call shifts `source`'s range down.
        let middle = registry.create();
        let source = registry.create();
        let siblings: Vec<_> = (0..3).map(|_| registry.create()).collect();

        middle.register_dependency(&source).unwrap();
        for sibling in &siblings {
            sibling.register_dependency(&source).unwrap();
        }
        for _ in 0..2 {
            let expired = registry.create();
            expired.register_dependency(&middle).unwrap();
        }
        assert_eq!(registry.edge_count(), 6);

        source.on_change();

        assert_eq!(middle.validation_index(), 1);
        for sibling in &siblings {
            assert_eq!(sibling.validation_index(), 1);
        }
        assert_eq!(registry.edge_count(), 4);
    }

    #[test]
    fn duplicate_edges_survive_nested_mutation() {
        let registry = DependencyRegistry::new();
        let middle = registry.create();
        let source = registry.create();
        let tail = registry.create();

        middle.register_dependency(&source).unwrap();
        middle.register_dependency(&source).unwrap();
        tail.register_dependency(&source).unwrap();
        {
            let expired = registry.create();
            expired.register_dependency(&middle).unwrap();
        }

        source.on_change();

        assert_eq!(middle.validation_index(), 2);
        assert_eq!(tail.validation_index(), 1);
    }

    #[test]
    fn purge_removes_expired_everywhere() {
        let registry = DependencyRegistry::new();
        let a = registry.create();
        let b = registry.create();
        let keep = registry.create();
        keep.register_dependency(&a).unwrap();

        for dependency in [&a, &b] {
            let dependent = registry.create();
            dependent.register_dependency(dependency).unwrap();
        }

        assert_eq!(registry.purge_expired(), 2);
        assert_eq!(registry.edge_count(), 1);
        assert_eq!(registry.purge_expired(), 0);
    }

    #[test]
    fn shutdown_clears_edges_but_keeps_nodes_usable() {
        let registry = DependencyRegistry::new();
        let dependency = registry.create();
        let dependent = registry.create();
        dependent.register_dependency(&dependency).unwrap();

        assert_eq!(registry.shutdown(), 1);
        assert_eq!(registry.edge_count(), 0);

        dependency.on_change();
        assert_eq!(dependent.validation_index(), 0);

        dependent.register_dependency(&dependency).unwrap();
        // The dependency was already invalidated, so registration fires.
        assert_eq!(dependent.validation_index(), 1);
        assert_eq!(registry.edge_count(), 1);
    }

    #[test]
    fn global_registry_is_shared() {
        let first = DependencyRegistry::global();
        let second = DependencyRegistry::global();
        assert!(Arc::ptr_eq(first, second));

        let a = first.create();
        let b = second.create();
        a.register_dependency(&b).unwrap();
        b.on_change();
        assert_eq!(a.validation_index(), 1);
    }
}
