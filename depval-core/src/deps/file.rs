//! File Dependencies
//!
//! Builders record which files they read as [`DependentFileState`]s and hand
//! a validation to the host's [`FileMonitor`] for each of them. When the host
//! sees a file change, it calls the validation's `on_change`, and the graph
//! takes it from there.
//!
//! Watching the filesystem is the host's job. [`ManualFileMonitor`] is an
//! in-memory monitor for hosts that learn about changes some other way (an
//! editor's save hook, a network message) and for tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::graph::{DepVal, DependencyRegistry, OnChangeCallback};

/// Something that can call back when a file changes.
pub trait FileMonitor: Send + Sync {
    /// Start watching `path`, calling `callback` on every change.
    ///
    /// Implementations should hold `callback` weakly so that watching a file
    /// does not keep a cached artifact alive. Returns `false` if the path
    /// cannot be watched.
    fn try_monitor(&self, path: &Path, callback: Arc<dyn OnChangeCallback>) -> bool;
}

/// Ask `monitor` to invalidate `callback` whenever `path` changes.
pub fn register_file_dependency(
    callback: Arc<dyn OnChangeCallback>,
    path: impl AsRef<Path>,
    monitor: &dyn FileMonitor,
) -> bool {
    let path = path.as_ref();
    let watched = monitor.try_monitor(path, callback);
    if !watched {
        debug!(path = %path.display(), "file monitor refused path");
    }
    watched
}

/// What a builder saw of an input file when it read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Normal,
    /// The file was looked for and not found. Still worth watching, since
    /// creating it later should trigger a rebuild.
    DoesNotExist,
    /// An in-memory override was used in place of the file on disk.
    Shadowed,
}

/// A file an artifact was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependentFileState {
    pub filename: PathBuf,
    /// Modification marker at the time of reading. Opaque to this crate.
    pub timestamp: u64,
    pub status: FileStatus,
}

impl DependentFileState {
    pub fn new(filename: impl Into<PathBuf>, timestamp: u64) -> Self {
        Self {
            filename: filename.into(),
            timestamp,
            status: FileStatus::Normal,
        }
    }

    /// A file that was looked for but not found.
    pub fn missing(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            timestamp: 0,
            status: FileStatus::DoesNotExist,
        }
    }
}

/// The input files of one build, deduplicated by filename and kept in the
/// order they were first read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependentFiles {
    files: IndexMap<PathBuf, DependentFileState>,
}

impl DependentFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file. If the filename is already present the earlier record
    /// wins and this returns `false`.
    pub fn add(&mut self, state: DependentFileState) -> bool {
        if self.files.contains_key(&state.filename) {
            return false;
        }
        self.files.insert(state.filename.clone(), state);
        true
    }

    pub fn get(&self, filename: impl AsRef<Path>) -> Option<&DependentFileState> {
        self.files.get(filename.as_ref())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependentFileState> {
        self.files.values()
    }
}

impl Extend<DependentFileState> for DependentFiles {
    fn extend<I: IntoIterator<Item = DependentFileState>>(&mut self, iter: I) {
        for state in iter {
            self.add(state);
        }
    }
}

impl FromIterator<DependentFileState> for DependentFiles {
    fn from_iter<I: IntoIterator<Item = DependentFileState>>(iter: I) -> Self {
        let mut files = Self::new();
        files.extend(iter);
        files
    }
}

/// Create a validation that is invalidated when any of `files` changes.
pub fn dep_val_from_files<'a>(
    registry: &Arc<DependencyRegistry>,
    files: impl IntoIterator<Item = &'a DependentFileState>,
    monitor: &dyn FileMonitor,
) -> DepVal {
    let dep_val = registry.create();
    for file in files {
        register_file_dependency(dep_val.clone(), &file.filename, monitor);
    }
    dep_val
}

/// A [`FileMonitor`] driven by explicit [`notify_changed`](Self::notify_changed)
/// calls instead of the filesystem.
///
/// Paths are compared exactly as given; canonicalize before calling if that
/// matters.
#[derive(Default)]
pub struct ManualFileMonitor {
    watchers: DashMap<PathBuf, Vec<Weak<dyn OnChangeCallback>>>,
}

impl ManualFileMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every live callback registered for `path`. Returns how many were
    /// called. Callbacks whose owner has been dropped are forgotten, and a
    /// path left with none is no longer watched.
    pub fn notify_changed(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();

        // Collect first: a callback may register new watches, and the shard
        // lock must not be held when it does.
        let live: Vec<Arc<dyn OnChangeCallback>> = match self.watchers.get_mut(path) {
            Some(mut callbacks) => {
                callbacks.retain(|callback| callback.strong_count() > 0);
                callbacks.iter().filter_map(Weak::upgrade).collect()
            }
            None => Vec::new(),
        };
        if live.is_empty() {
            self.watchers.remove_if(path, |_, callbacks| callbacks.is_empty());
        }

        trace!(path = %path.display(), callbacks = live.len(), "file changed");
        for callback in &live {
            callback.on_change();
        }
        live.len()
    }

    /// Number of callbacks registered for `path`, dropped ones included
    /// until the next notification.
    pub fn watcher_count(&self, path: impl AsRef<Path>) -> usize {
        self.watchers.get(path.as_ref()).map_or(0, |callbacks| callbacks.len())
    }

    /// Number of distinct watched paths.
    pub fn watched_paths(&self) -> usize {
        self.watchers.len()
    }
}

impl FileMonitor for ManualFileMonitor {
    fn try_monitor(&self, path: &Path, callback: Arc<dyn OnChangeCallback>) -> bool {
        self.watchers
            .entry(path.to_path_buf())
            .or_default()
            .push(Arc::downgrade(&callback));
        true
    }
}
