//! Error taxonomy for a conversion run.
//!
//! Configuration and resolution errors abort before any output is produced.
//! Per-package errors name the `(id, version)` they belong to.

use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::registry::RegistryError;
use crate::types::{PackageId, PackageIdentity, TargetFramework};

/// Result alias used throughout the core crate.
pub type Result<T, E = RepackError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum RepackError {
    /// Malformed override file, unreadable ignore list, bad run configuration.
    #[error("configuration error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("registry '{source_name}' failed for {package}: {error}")]
    Registry {
        source_name: String,
        package: String,
        #[source]
        error: RegistryError,
    },

    #[error("unsatisfiable version constraints for '{id}' (demanded: {}): {detail}", ranges.join(", "))]
    Unsatisfiable {
        id: PackageId,
        ranges: Vec<String>,
        detail: String,
    },

    #[error("no content group in {package} is compatible with {framework}")]
    IncompatiblePlatform {
        package: PackageIdentity,
        framework: TargetFramework,
    },

    /// The gatherer visited a package whose dependency never made it into the
    /// resolved graph. This is a bug, not a user error.
    #[error("dependency '{dependency}' of {package} is missing from the resolved graph")]
    UnresolvedDependency {
        package: PackageIdentity,
        dependency: PackageId,
    },

    #[error("cannot read overlay '{}' for '{target}' in package {package}: {error}", source_path.display())]
    Overlay {
        package: PackageId,
        target: String,
        source_path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("failed to write archive for {package}: {error}")]
    Archive {
        package: PackageIdentity,
        #[source]
        error: Box<RepackError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl RepackError {
    pub fn config(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Config {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn registry(
        source_name: &str,
        package: impl std::fmt::Display,
        error: RegistryError,
    ) -> Self {
        Self::Registry {
            source_name: source_name.to_string(),
            package: package.to_string(),
            error,
        }
    }
}

/// Race `fut` against the run's cancellation token.
pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RepackError::Cancelled),
        out = fut => Ok(out),
    }
}
