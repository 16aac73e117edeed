//! Dependency Adapters
//!
//! Glue between the graph and the systems that feed it: file monitors that
//! report changed inputs, and compile operations that report finished (or
//! failed) artifacts. Both are external; this module only defines the
//! interfaces they are reached through.

mod compile;
mod file;

pub use compile::{check_output, CompileOutput, CompileResult};
pub use file::{
    dep_val_from_files, register_file_dependency, DependentFileState, DependentFiles, FileMonitor,
    FileStatus, ManualFileMonitor,
};

use crate::graph::{DepVal, DependencyError};

/// Make `dependent` invalid whenever `dependency` is.
pub fn register_asset_dependency(
    dependent: &DepVal,
    dependency: &DepVal,
) -> Result<(), DependencyError> {
    dependent.register_dependency(dependency)
}
