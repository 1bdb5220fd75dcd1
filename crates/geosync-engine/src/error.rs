//! # Engine Error Types
//!
//! Two tiers, matching how failures propagate through a run:
//!
//! - [`ReconcileError`] aborts the run for one resource. It is surfaced in
//!   the run's [`Outcome`](crate::Outcome) and never crosses into other
//!   resources.
//! - [`LayerFailure`] is confined to one layer. The run records it and
//!   moves on to the next layer.
//!
//! [`StageError`] and [`StyleError`] are the sub-protocol errors that feed
//! the two tiers.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use geosync_client::ClientError;
use geosync_core::CoreError;

/// Failure that stops a resource's run.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The manifest could not be fetched for a reason other than the
    /// resource being private or absent.
    #[error("manifest for {resource_id} unavailable: {source}")]
    ManifestUnavailable {
        resource_id: String,
        source: ClientError,
    },

    /// The catalog listing failed at the transport level.
    #[error("catalog of {workspace} unreadable: {source}")]
    CatalogUnreadable {
        workspace: String,
        source: ClientError,
    },

    /// The catalog answered with a body that cannot be interpreted.
    #[error("catalog of {workspace} is inconsistent: {reason}")]
    CatalogInconsistency { workspace: String, reason: String },

    /// Creating or deleting the workspace was rejected.
    #[error("workspace {workspace} operation failed: {source}")]
    Workspace {
        workspace: String,
        source: ClientError,
    },

    /// The resource's staged storage could not be removed.
    #[error("storage cleanup for {resource_id} failed: {source}")]
    Storage {
        resource_id: String,
        source: StageError,
    },
}

/// Step of the publish protocol at which a layer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    /// `PUT .../external.{file_type}`.
    Register,
    /// Reading back and checking the generated resource description.
    Verify,
    /// Writing back the renamed resource description.
    Rename,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => f.write_str("register"),
            Self::Verify => f.write_str("verify"),
            Self::Rename => f.write_str("rename"),
        }
    }
}

/// Failure confined to one layer.
#[derive(Error, Debug)]
pub enum LayerFailure {
    #[error("validation failed: {0}")]
    Validation(#[from] CoreError),

    #[error("staging failed: {0}")]
    Staging(#[from] StageError),

    #[error("publish failed at {step} step: {reason}")]
    Publish { step: PublishStep, reason: String },
}

impl LayerFailure {
    pub(crate) fn publish(step: PublishStep, reason: impl fmt::Display) -> Self {
        Self::Publish {
            step,
            reason: reason.to_string(),
        }
    }
}

/// Failure copying a repository file into GeoServer's storage or removing it.
#[derive(Error, Debug)]
pub enum StageError {
    /// The download request failed or was refused.
    #[error("download of {source_path} failed: {source}")]
    Download {
        source_path: String,
        source: ClientError,
    },

    /// The body stream broke mid-transfer.
    #[error("transfer of {source_path} interrupted: {source}")]
    Transfer {
        source_path: String,
        source: reqwest::Error,
    },

    /// Local filesystem error.
    #[error("storage I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The path would escape the storage root.
    #[error("refusing to stage outside the storage root: {0:?}")]
    UnsafePath(String),
}

impl StageError {
    /// A body stream cut off mid-transfer is worth downloading again.
    /// Failed requests were already retried by the client.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transfer { .. })
    }
}

/// Failure in raster style synthesis. Never fatal to the layer.
#[derive(Error, Debug)]
pub enum StyleError {
    #[error("statistics sidecar unavailable: {0}")]
    Fetch(ClientError),

    #[error("statistics sidecar is not valid XML: {0}")]
    Parse(String),

    #[error("statistics sidecar has no {0}")]
    MissingStatistic(&'static str),

    #[error("{key} is not a number: {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("statistics range is empty: min {min} is not below max {max}")]
    EmptyRange { min: String, max: String },

    #[error("style upload failed: {0}")]
    Upload(ClientError),

    #[error("default style binding failed: {0}")]
    Bind(ClientError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_failure_names_step() {
        let f = LayerFailure::publish(PublishStep::Verify, "coverage.enabled is false");
        assert_eq!(
            f.to_string(),
            "publish failed at verify step: coverage.enabled is false"
        );
    }

    #[test]
    fn validation_failure_wraps_core_error() {
        let core = geosync_core::validate_layer_name("a.b").unwrap_err();
        let f = LayerFailure::from(core);
        assert!(matches!(f, LayerFailure::Validation(_)));
        assert!(f.to_string().contains("a.b"));
    }

    #[test]
    fn only_transfer_errors_are_transient() {
        let io = StageError::Io {
            path: PathBuf::from("/srv/abc"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!io.is_transient());
        assert!(!StageError::UnsafePath("../x".into()).is_transient());
    }

    #[test]
    fn unsafe_path_display() {
        let e = StageError::UnsafePath("../etc/passwd".into());
        assert!(e.to_string().contains("../etc/passwd"));
    }
}
