//! Unavailability Errors
//!
//! Raised when a caller asks for an artifact that cannot be handed out.
//!
//! - [`PendingAsset`]: not built yet. Retry later; do not cache.
//! - [`InvalidAsset`]: the build failed. Cache the failure together with its
//!   validation, and drop it when the validation is invalidated.
//! - [`ConstructionError`]: inputs resolved fine, but turning them into the
//!   final artifact failed. Cached the same way as an invalid asset.
//!
//! The core never recovers from these itself. Retrying, substituting a
//! fallback or telling the user is up to the cache that receives them.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::error;

use super::state::AssetState;
use crate::graph::{DepVal, DependencyError};

/// Diagnostic output captured while producing an artifact, usually compiler
/// or importer log text.
pub type Blob = Arc<[u8]>;

fn log_text(log: &Option<Blob>) -> Option<Cow<'_, str>> {
    log.as_deref().map(String::from_utf8_lossy)
}

fn log_suffix(log: &Option<Blob>) -> String {
    match log_text(log) {
        Some(text) => format!(": {text}"),
        None => String::new(),
    }
}

/// The artifact is still being produced.
#[derive(Debug, Clone, thiserror::Error)]
#[error("asset `{initializer}` is still pending")]
pub struct PendingAsset {
    initializer: String,
}

impl PendingAsset {
    /// Create an error for the artifact named `initializer`.
    pub fn new(initializer: impl Into<String>) -> Self {
        Self {
            initializer: initializer.into(),
        }
    }

    /// Name of the requested artifact.
    pub fn initializer(&self) -> &str {
        &self.initializer
    }

    /// Always [`AssetState::Pending`].
    pub fn state(&self) -> AssetState {
        AssetState::Pending
    }

    /// Pending errors fire constantly while assets stream in, so nothing is
    /// written. Returns `false`.
    pub fn report(&self) -> bool {
        false
    }
}

/// Production of the artifact failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid asset `{initializer}`{}", log_suffix(.log))]
pub struct InvalidAsset {
    initializer: String,
    dep_val: Option<DepVal>,
    log: Option<Blob>,
}

impl InvalidAsset {
    /// Create an error for the artifact named `initializer`.
    ///
    /// Pass the validation of the failed build whenever there is one. Without
    /// it a cache can only hold on to the failure forever.
    pub fn new(initializer: impl Into<String>, dep_val: Option<DepVal>, log: Option<Blob>) -> Self {
        Self {
            initializer: initializer.into(),
            dep_val,
            log,
        }
    }

    /// Name of the requested artifact.
    pub fn initializer(&self) -> &str {
        &self.initializer
    }

    /// Always [`AssetState::Invalid`].
    pub fn state(&self) -> AssetState {
        AssetState::Invalid
    }

    /// Validation of the failed build.
    pub fn dependency_validation(&self) -> Option<&DepVal> {
        self.dep_val.as_ref()
    }

    /// Log captured during the failed build.
    pub fn log(&self) -> Option<&Blob> {
        self.log.as_ref()
    }

    /// Write the failure and its log to the diagnostic stream.
    pub fn report(&self) -> bool {
        match log_text(&self.log) {
            Some(log) => error!(initializer = %self.initializer, %log, "invalid asset"),
            None => error!(initializer = %self.initializer, "invalid asset"),
        }
        true
    }
}

/// Why a construction step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionReason {
    /// Nothing more specific is known.
    Unknown,
    /// The input was written by a version this build cannot read.
    UnsupportedVersion,
    /// The input was readable but its contents made no sense.
    FormatNotUnderstood,
    /// An input referenced by another input does not exist.
    MissingFile,
}

impl fmt::Display for ConstructionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConstructionReason::Unknown => "unknown",
            ConstructionReason::UnsupportedVersion => "unsupported version",
            ConstructionReason::FormatNotUnderstood => "format not understood",
            ConstructionReason::MissingFile => "missing file",
        };
        f.write_str(text)
    }
}

/// Failure while synthesizing an artifact from inputs that were themselves
/// resolved successfully.
#[derive(Debug, Clone, thiserror::Error)]
#[error("error during asset construction ({reason}){}", log_suffix(.log))]
pub struct ConstructionError {
    reason: ConstructionReason,
    dep_val: Option<DepVal>,
    log: Option<Blob>,
}

impl ConstructionError {
    /// Create an error with an optional captured log.
    pub fn new(reason: ConstructionReason, dep_val: Option<DepVal>, log: Option<Blob>) -> Self {
        Self { reason, dep_val, log }
    }

    /// Create an error whose log is `message`.
    pub fn with_message(
        reason: ConstructionReason,
        dep_val: Option<DepVal>,
        message: impl fmt::Display,
    ) -> Self {
        let log: Blob = message.to_string().into_bytes().into();
        Self::new(reason, dep_val, Some(log))
    }

    /// Wrap a lower-level error. The reason is `Unknown` and the log is the
    /// error's display text.
    pub fn from_error(err: &(dyn std::error::Error + 'static), dep_val: Option<DepVal>) -> Self {
        Self::with_message(ConstructionReason::Unknown, dep_val, err)
    }

    /// Why construction failed.
    pub fn reason(&self) -> ConstructionReason {
        self.reason
    }

    /// Validation of the failed construction.
    pub fn dependency_validation(&self) -> Option<&DepVal> {
        self.dep_val.as_ref()
    }

    /// Log captured during construction.
    pub fn log(&self) -> Option<&Blob> {
        self.log.as_ref()
    }

    /// Fold another validation into this error.
    ///
    /// When both this error and `other` carry distinct validations, a new
    /// parent validation is created that depends on both, so a change to
    /// either input invalidates the merged failure. If this error had no
    /// validation, `other` is adopted as is.
    pub fn merge_dependency(mut self, other: Option<&DepVal>) -> Result<Self, DependencyError> {
        let Some(other) = other else {
            return Ok(self);
        };

        match self.dep_val.take() {
            Some(existing) if !Arc::ptr_eq(&existing, other) => {
                let parent = existing.registry().create();
                parent.register_dependency(&existing)?;
                parent.register_dependency(other)?;
                self.dep_val = Some(parent);
            }
            _ => self.dep_val = Some(Arc::clone(other)),
        }
        Ok(self)
    }

    /// Write the failure and its log to the diagnostic stream.
    pub fn report(&self) -> bool {
        match log_text(&self.log) {
            Some(log) => error!(reason = %self.reason, %log, "error during asset construction"),
            None => error!(reason = %self.reason, "error during asset construction (unspecified)"),
        }
        true
    }
}

/// Any reason an artifact could not be handed out.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetError {
    /// Still being produced.
    #[error(transparent)]
    Pending(#[from] PendingAsset),

    /// Production failed.
    #[error(transparent)]
    Invalid(#[from] InvalidAsset),

    /// Construction from resolved inputs failed.
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

impl AssetError {
    /// The availability state this error stands for.
    pub fn state(&self) -> AssetState {
        match self {
            AssetError::Pending(_) => AssetState::Pending,
            AssetError::Invalid(_) | AssetError::Construction(_) => AssetState::Invalid,
        }
    }

    /// True when the caller should simply ask again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AssetError::Pending(_))
    }

    /// Name of the requested artifact, where known.
    pub fn initializer(&self) -> Option<&str> {
        match self {
            AssetError::Pending(err) => Some(err.initializer()),
            AssetError::Invalid(err) => Some(err.initializer()),
            AssetError::Construction(_) => None,
        }
    }

    /// Validation a cache should hold next to the cached failure.
    pub fn dependency_validation(&self) -> Option<&DepVal> {
        match self {
            AssetError::Pending(_) => None,
            AssetError::Invalid(err) => err.dependency_validation(),
            AssetError::Construction(err) => err.dependency_validation(),
        }
    }

    /// Captured diagnostic log, if any.
    pub fn log(&self) -> Option<&Blob> {
        match self {
            AssetError::Pending(_) => None,
            AssetError::Invalid(err) => err.log(),
            AssetError::Construction(err) => err.log(),
        }
    }

    /// Write to the diagnostic stream if this kind reports. Returns whether
    /// anything was written.
    pub fn report(&self) -> bool {
        match self {
            AssetError::Pending(err) => err.report(),
            AssetError::Invalid(err) => err.report(),
            AssetError::Construction(err) => err.report(),
        }
    }
}
