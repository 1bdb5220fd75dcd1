//! # Catalog Audit
//!
//! Read-only comparisons between the repository and GeoServer, used by
//! the CLI to find resources and layers that a reconciliation would add.

use std::collections::HashSet;

use serde::Serialize;

use geosync_client::ClientError;
use geosync_core::{LayerDescriptor, ResourceId, WorkspaceId};

use crate::error::ReconcileError;
use crate::inventory::Access;
use crate::reconcile::Reconciler;

/// A desired layer with no matching catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct MissingLayer {
    pub descriptor: LayerDescriptor,
    /// Repository URL of the layer's primary file.
    pub url: String,
}

/// Resources, out of `resource_ids`, that have no workspace.
pub async fn missing_workspaces(
    reconciler: &Reconciler,
    resource_ids: &[ResourceId],
) -> Result<Vec<ResourceId>, ClientError> {
    let names = reconciler.client().geoserver().list_workspaces().await?;
    let present: HashSet<&str> = names
        .iter()
        .filter_map(|name| WorkspaceId::resource_part(name, reconciler.namespace()))
        .collect();

    let missing: Vec<ResourceId> = resource_ids
        .iter()
        .filter(|id| !present.contains(id.as_str()))
        .cloned()
        .collect();
    tracing::info!(
        checked = resource_ids.len(),
        missing = missing.len(),
        "workspace audit complete"
    );
    Ok(missing)
}

/// Desired layers of a resource with no catalog entry of the same store
/// kind and normalized name. Private resources report nothing.
pub async fn missing_layers(
    reconciler: &Reconciler,
    resource_id: &ResourceId,
) -> Result<Vec<MissingLayer>, ReconcileError> {
    let inventory = reconciler.inventory(resource_id).await?;
    if inventory.access == Access::Private {
        return Ok(Vec::new());
    }
    let catalog = reconciler.catalog(resource_id).await?;

    let repository = reconciler.client().repository();
    let missing = inventory
        .layers
        .into_iter()
        .filter(|d| !catalog.contains(&d.catalog_entry()))
        .map(|descriptor| {
            let url = repository
                .file_url(&descriptor.source_path)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| descriptor.source_path.clone());
            MissingLayer { descriptor, url }
        })
        .collect();
    Ok(missing)
}
