//! # Workspace Manager
//!
//! A resource's workspace is created and destroyed as a unit, together
//! with its storage subtree.

use geosync_client::{ClientError, GeoServerClient};
use geosync_core::{ResourceId, WorkspaceId};

use crate::error::ReconcileError;
use crate::stage::Stager;

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    geoserver: GeoServerClient,
    stager: Stager,
}

impl WorkspaceManager {
    pub fn new(geoserver: GeoServerClient, stager: Stager) -> Self {
        Self { geoserver, stager }
    }

    /// Create an empty workspace, deleting any stale one of the same name
    /// first.
    pub async fn create(&self, workspace: &WorkspaceId) -> Result<(), ReconcileError> {
        let ws_err = |source: ClientError| ReconcileError::Workspace {
            workspace: workspace.to_string(),
            source,
        };
        if self.geoserver.delete_workspace(workspace).await.map_err(ws_err)? {
            tracing::info!(workspace = %workspace, "stale workspace removed");
        }
        self.geoserver.create_workspace(workspace).await.map_err(ws_err)?;
        tracing::info!(workspace = %workspace, "workspace created");
        Ok(())
    }

    /// Delete the workspace with everything in it and remove the
    /// resource's staged files. Absent workspaces and storage are fine.
    ///
    /// Storage is removed even when the catalog delete fails; the catalog
    /// error is still returned.
    pub async fn destroy(
        &self,
        resource_id: &ResourceId,
        workspace: &WorkspaceId,
    ) -> Result<(), ReconcileError> {
        let catalog = match self.geoserver.delete_workspace(workspace).await {
            Ok(existed) => {
                tracing::info!(workspace = %workspace, existed, "workspace torn down");
                Ok(())
            }
            Err(ClientError::NotConfigured) => Ok(()),
            Err(source) => Err(ReconcileError::Workspace {
                workspace: workspace.to_string(),
                source,
            }),
        };

        self.stager
            .remove_resource(resource_id)
            .await
            .map_err(|source| ReconcileError::Storage {
                resource_id: resource_id.to_string(),
                source,
            })?;
        catalog
    }
}
