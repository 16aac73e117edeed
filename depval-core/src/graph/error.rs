//! Errors raised when wiring the dependency graph.

use super::node::ValidationId;

/// Misuse of the graph that is refused instead of being silently recorded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    /// The two nodes were created by different registries. An edge between
    /// them would live in only one table and never be traversed.
    #[error("{dependent} and {dependency} belong to different registries")]
    RegistryMismatch {
        /// The node that asked to be invalidated.
        dependent: ValidationId,
        /// The node it tried to depend on.
        dependency: ValidationId,
    },

    /// A node tried to depend on itself, which would recurse forever on the
    /// first change.
    #[error("{0} cannot depend on itself")]
    SelfDependency(ValidationId),
}
