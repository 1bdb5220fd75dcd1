//! # Layer Unpublisher
//!
//! Removes a store from the catalog and its files from storage. The two
//! halves are independent: storage is cleaned even when the catalog delete
//! fails or GeoServer is not configured. Failures are collected, never
//! raised.

use serde::Serialize;

use geosync_client::{ClientError, GeoServerClient};
use geosync_core::{CatalogEntry, LayerDescriptor, ResourceId, WorkspaceId};

use crate::stage::Stager;

/// An unpublish that left something behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnregisterFailure {
    pub entry: CatalogEntry,
    pub reasons: Vec<String>,
}

impl std::fmt::Display for UnregisterFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.entry, self.reasons.join("; "))
    }
}

#[derive(Debug, Clone)]
pub struct Unpublisher {
    geoserver: GeoServerClient,
    stager: Stager,
}

impl Unpublisher {
    pub fn new(geoserver: GeoServerClient, stager: Stager) -> Self {
        Self { geoserver, stager }
    }

    /// Remove an orphaned catalog entry and the staged files that back it.
    pub async fn unpublish_entry(
        &self,
        resource_id: &ResourceId,
        workspace: &WorkspaceId,
        entry: &CatalogEntry,
    ) -> Result<(), UnregisterFailure> {
        let mut reasons = Vec::new();
        if let Some(reason) = self.delete_store(workspace, entry).await {
            reasons.push(reason);
        }
        match self.stager.remove_entry_files(resource_id, entry).await {
            Ok(removed) => {
                tracing::debug!(layer = %entry.layer_name, files = removed.len(), "staged files removed")
            }
            Err(e) => reasons.push(e.to_string()),
        }
        finish(entry.clone(), reasons)
    }

    /// Undo a partially published descriptor.
    pub async fn unpublish_descriptor(
        &self,
        workspace: &WorkspaceId,
        descriptor: &LayerDescriptor,
    ) -> Result<(), UnregisterFailure> {
        let entry = descriptor.catalog_entry();
        let mut reasons = Vec::new();
        if let Some(reason) = self.delete_store(workspace, &entry).await {
            reasons.push(reason);
        }
        reasons.extend(
            self.stager
                .remove_descriptor_files(descriptor)
                .await
                .into_iter()
                .map(|e| e.to_string()),
        );
        finish(entry, reasons)
    }

    async fn delete_store(&self, workspace: &WorkspaceId, entry: &CatalogEntry) -> Option<String> {
        match self
            .geoserver
            .delete_store(workspace, entry.store_type, &entry.layer_name)
            .await
        {
            Ok(true) => {
                tracing::info!(layer = %entry.layer_name, store_type = %entry.store_type, "store deleted");
                None
            }
            Ok(false) => {
                tracing::debug!(layer = %entry.layer_name, "store already absent");
                None
            }
            Err(ClientError::NotConfigured) => None,
            Err(e) => {
                tracing::warn!(layer = %entry.layer_name, "store delete failed: {e}");
                Some(e.to_string())
            }
        }
    }
}

fn finish(entry: CatalogEntry, reasons: Vec<String>) -> Result<(), UnregisterFailure> {
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(UnregisterFailure { entry, reasons })
    }
}
