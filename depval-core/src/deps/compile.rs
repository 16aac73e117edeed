//! Compile Results
//!
//! Compilers (shader compilers, model importers) run elsewhere and report
//! back an artifact, the validation that tracks its inputs, and whatever they
//! logged. This module only needs the status and the validation out of that.

use super::DependentFiles;
use crate::asset::{AssetError, AssetState, Blob, InvalidAsset, PendingAsset};
use crate::graph::DepVal;

/// The outcome of an external compile operation, as far as this crate cares.
pub trait CompileOutput {
    /// Where the operation is.
    fn state(&self) -> AssetState;

    /// Validation tracking the operation's inputs.
    fn dependency_validation(&self) -> Option<&DepVal>;

    /// Diagnostic output.
    fn log(&self) -> Option<&Blob> {
        None
    }
}

/// Turn a compile outcome into the error a cache should see, if any.
///
/// `Ready` is `Ok`. `Pending` and `Invalid` map to [`PendingAsset`] and
/// [`InvalidAsset`]; the latter carries the operation's validation and log.
pub fn check_output<C>(output: &C, initializer: &str) -> Result<(), AssetError>
where
    C: CompileOutput + ?Sized,
{
    match output.state() {
        AssetState::Ready => Ok(()),
        AssetState::Pending => Err(PendingAsset::new(initializer).into()),
        AssetState::Invalid => Err(InvalidAsset::new(
            initializer,
            output.dependency_validation().cloned(),
            output.log().cloned(),
        )
        .into()),
    }
}

/// A finished compile: the produced bytes, the validation over its inputs,
/// and the compiler's log.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub artifact: Option<Blob>,
    pub dep_val: DepVal,
    pub log: Option<Blob>,
    /// Input files the compiler reported reading.
    pub dependencies: DependentFiles,
}

impl CompileResult {
    /// A successful compile.
    pub fn ready(artifact: Blob, dep_val: DepVal) -> Self {
        Self {
            artifact: Some(artifact),
            dep_val,
            log: None,
            dependencies: DependentFiles::new(),
        }
    }

    /// A failed compile.
    pub fn failed(dep_val: DepVal, log: Option<Blob>) -> Self {
        Self {
            artifact: None,
            dep_val,
            log,
            dependencies: DependentFiles::new(),
        }
    }

    pub fn with_log(mut self, log: Blob) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_dependencies(mut self, dependencies: DependentFiles) -> Self {
        self.dependencies = dependencies;
        self
    }
}

impl CompileOutput for CompileResult {
    fn state(&self) -> AssetState {
        if self.artifact.is_some() {
            AssetState::Ready
        } else {
            AssetState::Invalid
        }
    }

    fn dependency_validation(&self) -> Option<&DepVal> {
        Some(&self.dep_val)
    }

    fn log(&self) -> Option<&Blob> {
        self.log.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AsyncMarker;
    use crate::deps::DependentFileState;
    use crate::graph::DependencyRegistry;
    use std::sync::Arc;

    /// An operation still running on a worker.
    struct InFlight {
        marker: AsyncMarker,
        dep_val: DepVal,
    }

    impl CompileOutput for InFlight {
        fn state(&self) -> AssetState {
            self.marker.state()
        }

        fn dependency_validation(&self) -> Option<&DepVal> {
            Some(&self.dep_val)
        }
    }

    #[test]
    fn ready_result_is_ok() {
        let registry = DependencyRegistry::new();
        let result = CompileResult::ready(b"DXBC".as_slice().into(), registry.create())
            .with_dependencies([DependentFileState::new("lit.hlsl", 4)].into_iter().collect());

        assert_eq!(result.state(), AssetState::Ready);
        assert_eq!(result.dependencies.len(), 1);
        assert!(check_output(&result, "lit.hlsl").is_ok());
    }

    #[test]
    fn failed_result_becomes_invalid_asset() {
        let registry = DependencyRegistry::new();
        let dep_val = registry.create();
        let log: Blob = b"syntax error".as_slice().into();
        let result = CompileResult::failed(dep_val.clone(), Some(log));

        let err = check_output(&result, "lit.hlsl").unwrap_err();
        assert_eq!(err.state(), AssetState::Invalid);
        assert!(Arc::ptr_eq(err.dependency_validation().unwrap(), &dep_val));
        assert_eq!(err.log().map(|log| &log[..]), Some(&b"syntax error"[..]));
    }

    #[test]
    fn in_flight_operation_is_pending() {
        let registry = DependencyRegistry::new();
        let op = InFlight {
            marker: AsyncMarker::new(),
            dep_val: registry.create(),
        };

        let err = check_output(&op, "tree.dae").unwrap_err();
        assert!(err.is_retryable());

        op.marker.set_state(AssetState::Ready);
        assert!(check_output(&op, "tree.dae").is_ok());
    }
}
