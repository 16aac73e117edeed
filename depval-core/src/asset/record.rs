//! Diagnostic snapshot of a cache entry.

use serde::Serialize;

use super::error::Blob;
use super::marker::AsyncMarker;
use super::state::AssetState;
use crate::graph::DepVal;

/// Point-in-time description of one cached artifact, for debug overlays and
/// log dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRecord {
    pub initializer: String,
    pub state: AssetState,
    /// `None` when the entry carries no validation.
    pub validation_index: Option<u64>,
    pub log: Option<String>,
    /// Caller-defined tag for the artifact type.
    pub type_code: u64,
}

impl AssetRecord {
    /// Capture the current state of an entry.
    pub fn capture(
        initializer: impl Into<String>,
        state: AssetState,
        dep_val: Option<&DepVal>,
        log: Option<&Blob>,
        type_code: u64,
    ) -> Self {
        Self {
            initializer: initializer.into(),
            state,
            validation_index: dep_val.map(|dep_val| dep_val.validation_index()),
            log: log.map(|log| String::from_utf8_lossy(log).into_owned()),
            type_code,
        }
    }

    /// Capture an entry tracked by `marker`, using its debug label as the
    /// initializer.
    pub fn from_marker(
        marker: &AsyncMarker,
        dep_val: Option<&DepVal>,
        log: Option<&Blob>,
        type_code: u64,
    ) -> Self {
        Self::capture(
            marker.initializer().unwrap_or_default(),
            marker.state(),
            dep_val,
            log,
            type_code,
        )
    }

    /// True if the entry finished and has been invalidated since.
    pub fn is_stale(&self) -> bool {
        !self.state.is_pending() && self.validation_index.is_some_and(|index| index > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::is_invalidated;
    use crate::graph::DependencyRegistry;

    #[test]
    fn capture_reads_validation_index() {
        let registry = DependencyRegistry::new();
        let dep_val = registry.create();
        dep_val.on_change();

        let record = AssetRecord::capture("a.tga", AssetState::Ready, Some(&dep_val), None, 7);
        assert_eq!(record.validation_index, Some(1));
        assert!(record.is_stale());
        assert_eq!(record.is_stale(), is_invalidated(record.state, Some(&dep_val)));
    }

    #[test]
    fn from_marker_uses_label() {
        let marker = AsyncMarker::new().with_initializer("meshes/rock.obj");
        let log: Blob = b"reading".as_slice().into();

        let record = AssetRecord::from_marker(&marker, None, Some(&log), 3);
        assert_eq!(record.initializer, "meshes/rock.obj");
        assert_eq!(record.state, AssetState::Pending);
        assert_eq!(record.log.as_deref(), Some("reading"));
        assert!(!record.is_stale());
    }

    #[test]
    fn serializes_with_lowercase_state() {
        let record = AssetRecord::capture("x", AssetState::Invalid, None, None, 0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "invalid");
        assert!(json["validation_index"].is_null());
    }
}
