//! Availability state of an artifact.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::DepVal;

/// Availability of an artifact that may still be under construction.
///
/// `Pending` is the only non-terminal state. Once a marker reaches `Ready`
/// or `Invalid` it stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum AssetState {
    /// Still being produced.
    Pending = 0,
    /// Produced successfully.
    Ready = 1,
    /// Production failed.
    Invalid = 2,
}

impl AssetState {
    /// True while the artifact is still being produced.
    pub fn is_pending(self) -> bool {
        self == AssetState::Pending
    }

    /// True for `Ready` and `Invalid`.
    pub fn is_terminal(self) -> bool {
        !self.is_pending()
    }

    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            1 => AssetState::Ready,
            2 => AssetState::Invalid,
            _ => AssetState::Pending,
        }
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetState::Pending => "pending",
            AssetState::Ready => "ready",
            AssetState::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// Whether a finished result has gone stale since it was produced.
///
/// Pending results are never stale, and results without a validation can
/// never be invalidated. A cache checks this before handing out an entry and
/// restarts construction when it returns true, even if the caller has not
/// yet observed the new state.
pub fn is_invalidated(state: AssetState, dep_val: Option<&DepVal>) -> bool {
    if state.is_pending() {
        return false;
    }
    dep_val.is_some_and(|dep_val| dep_val.validation_index() > 0)
}
