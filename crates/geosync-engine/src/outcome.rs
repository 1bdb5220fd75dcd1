//! # Run Outcome
//!
//! What one `reconcile` call did, for callers and for the CLI's report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use geosync_core::{CatalogEntry, LayerType, ResourceId};

use crate::inventory::Access;
use crate::unpublish::UnregisterFailure;

/// Result of one layer registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerResult {
    /// Contents-relative layer name, before normalization.
    pub layer_name: String,
    pub layer_type: LayerType,
    #[serde(flatten)]
    pub status: LayerStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayerStatus {
    Published { preview_url: String, styled: bool },
    Failed { reason: String },
}

impl LayerResult {
    pub fn is_published(&self) -> bool {
        matches!(self.status, LayerStatus::Published { .. })
    }
}

/// Aggregate result of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub resource_id: ResourceId,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` when the run failed before the manifest was read.
    pub access: Option<Access>,
    /// Resource-level failure that stopped the run.
    pub error: Option<String>,
    pub layers: Vec<LayerResult>,
    /// Orphans removed from the catalog.
    pub unregistered: Vec<CatalogEntry>,
    pub unregister_failures: Vec<UnregisterFailure>,
    /// Whether the run ended by tearing the workspace down.
    pub workspace_removed: bool,
}

impl Outcome {
    pub(crate) fn start(resource_id: ResourceId, run_id: Uuid) -> Self {
        Self {
            resource_id,
            run_id,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            access: None,
            error: None,
            layers: Vec::new(),
            unregistered: Vec::new(),
            unregister_failures: Vec::new(),
            workspace_removed: false,
        }
    }

    /// A run succeeds when nothing at all failed.
    pub fn success(&self) -> bool {
        self.error.is_none()
            && self.unregister_failures.is_empty()
            && self.layers.iter().all(LayerResult::is_published)
    }

    pub fn published(&self) -> impl Iterator<Item = &LayerResult> {
        self.layers.iter().filter(|l| l.is_published())
    }

    pub fn failed(&self) -> impl Iterator<Item = &LayerResult> {
        self.layers.iter().filter(|l| !l.is_published())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success() { "ok" } else { "FAILED" };
        write!(f, "{}: {status}", self.resource_id)?;
        if let Some(access) = self.access {
            let access = match access {
                Access::Public => "public",
                Access::Private => "private",
            };
            write!(f, " ({access})")?;
        }
        write!(
            f,
            ", {} published, {} failed, {} unregistered",
            self.published().count(),
            self.failed().count(),
            self.unregistered.len()
        )?;
        if self.workspace_removed {
            f.write_str(", workspace removed")?;
        }
        if let Some(error) = &self.error {
            write!(f, ": {error}")?;
        }
        Ok(())
    }
}

impl fmt::Display for LayerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            LayerStatus::Published { preview_url, styled } => {
                let styled = if *styled { " [styled]" } else { "" };
                write!(f, "{} {}{styled}: {preview_url}", self.layer_type, self.layer_name)
            }
            LayerStatus::Failed { reason } => {
                write!(f, "{} {} failed: {reason}", self.layer_type, self.layer_name)
            }
        }
    }
}
