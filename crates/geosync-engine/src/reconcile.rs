//! # Orchestrator
//!
//! One convergence run per call:
//!
//! ```text
//! manifest ─► inventory ─┐
//!                        ├─► plan ─► [create workspace]
//! catalog ───────────────┘            │
//!                                     ├─► unpublish orphans
//!                                     ├─► stage + publish each new layer
//!                                     │     (compensate on failure)
//!                                     └─► re-read catalog ─► teardown if empty
//! ```
//!
//! A private resource skips straight to teardown. Per-layer failures are
//! recorded and the run continues; resource-level failures stop the run.
//! Callers must not run two reconciliations of the same resource at once;
//! [`Dispatcher`](crate::Dispatcher) serializes them.

use std::collections::BTreeSet;

use tracing::Instrument;
use uuid::Uuid;

use geosync_client::{ClientError, GeoSyncClient, GeoSyncConfig};
use geosync_core::{validate_layer_name, CatalogEntry, LayerDescriptor, ResourceId, WorkspaceId};

use crate::catalog::read_catalog;
use crate::error::{LayerFailure, ReconcileError};
use crate::inventory::{fetch_inventory, Access, Inventory};
use crate::outcome::{LayerResult, LayerStatus, Outcome};
use crate::plan::{plan, ReconciliationPlan};
use crate::publish::{PublishedLayer, Publisher};
use crate::stage::Stager;
use crate::unpublish::Unpublisher;
use crate::workspace::WorkspaceManager;

/// Drives one resource's catalog toward its manifest.
#[derive(Debug, Clone)]
pub struct Reconciler {
    client: GeoSyncClient,
    namespace: String,
    publishing_enabled: bool,
    stager: Stager,
    publisher: Publisher,
    unpublisher: Unpublisher,
    workspaces: WorkspaceManager,
}

impl Reconciler {
    pub fn new(config: &GeoSyncConfig) -> Result<Self, ClientError> {
        let client = GeoSyncClient::new(config)?;
        let stager = Stager::new(client.repository().clone(), config.data_dir.clone());
        let geoserver = client.geoserver().clone();

        Ok(Self {
            publisher: Publisher::new(
                geoserver.clone(),
                client.repository().clone(),
                stager.clone(),
            ),
            unpublisher: Unpublisher::new(geoserver.clone(), stager.clone()),
            workspaces: WorkspaceManager::new(geoserver, stager.clone()),
            stager,
            namespace: config.namespace.clone(),
            publishing_enabled: config.geoserver_configured(),
            client,
        })
    }

    pub fn client(&self) -> &GeoSyncClient {
        &self.client
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn workspace_for(&self, resource_id: &ResourceId) -> WorkspaceId {
        WorkspaceId::for_resource(&self.namespace, resource_id)
    }

    /// Desired state of a resource.
    pub async fn inventory(&self, resource_id: &ResourceId) -> Result<Inventory, ReconcileError> {
        fetch_inventory(self.client.repository(), resource_id, self.publishing_enabled).await
    }

    /// Actual state of a resource's workspace.
    pub async fn catalog(
        &self,
        resource_id: &ResourceId,
    ) -> Result<BTreeSet<CatalogEntry>, ReconcileError> {
        read_catalog(self.client.geoserver(), &self.workspace_for(resource_id)).await
    }

    /// Compute what a run would do, without doing it.
    pub async fn plan(
        &self,
        resource_id: &ResourceId,
    ) -> Result<(Inventory, ReconciliationPlan), ReconcileError> {
        let inventory = self.inventory(resource_id).await?;
        let plan = match inventory.access {
            Access::Private => ReconciliationPlan::default(),
            Access::Public => plan(&inventory.layers, &self.catalog(resource_id).await?),
        };
        Ok((inventory, plan))
    }

    /// Converge one resource. Never fails; failures are in the outcome.
    pub async fn reconcile(&self, resource_id: &ResourceId) -> Outcome {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("reconcile", resource_id = %resource_id, %run_id);

        async {
            let mut outcome = Outcome::start(resource_id.clone(), run_id);
            tracing::info!("reconciliation started");

            if let Err(e) = self.run(resource_id, &mut outcome).await {
                tracing::error!("reconciliation aborted: {e}");
                outcome.error = Some(e.to_string());
            }

            outcome.finished_at = chrono::Utc::now();
            tracing::info!(
                success = outcome.success(),
                published = outcome.published().count(),
                failed = outcome.failed().count(),
                unregistered = outcome.unregistered.len(),
                "reconciliation finished"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    /// Remove a resource's workspace and staged files.
    pub async fn teardown(&self, resource_id: &ResourceId) -> Result<(), ReconcileError> {
        self.workspaces
            .destroy(resource_id, &self.workspace_for(resource_id))
            .await
    }

    async fn run(&self, resource_id: &ResourceId, outcome: &mut Outcome) -> Result<(), ReconcileError> {
        let workspace = self.workspace_for(resource_id);
        let inventory = self.inventory(resource_id).await?;
        outcome.access = Some(inventory.access);

        if inventory.access == Access::Private {
            tracing::info!(workspace = %workspace, "resource is private; tearing down");
            self.workspaces.destroy(resource_id, &workspace).await?;
            outcome.workspace_removed = true;
            return Ok(());
        }

        let actual = read_catalog(self.client.geoserver(), &workspace).await?;
        let plan = plan(&inventory.layers, &actual);
        tracing::info!(
            workspace = %workspace,
            desired = inventory.layers.len(),
            published = actual.len(),
            register = plan.to_register.len(),
            unregister = plan.to_unregister.len(),
            create_workspace = plan.create_workspace,
            "plan computed"
        );

        if plan.create_workspace {
            self.workspaces.create(&workspace).await?;
        }

        for entry in &plan.to_unregister {
            match self.unpublisher.unpublish_entry(resource_id, &workspace, entry).await {
                Ok(()) => outcome.unregistered.push(entry.clone()),
                Err(failure) => {
                    tracing::warn!(layer = %entry.layer_name, "orphan not fully removed: {failure}");
                    outcome.unregister_failures.push(failure);
                }
            }
        }

        for descriptor in &plan.to_register {
            let status = match self.register(&workspace, descriptor).await {
                Ok(PublishedLayer {
                    preview_url, styled, ..
                }) => LayerStatus::Published {
                    preview_url: preview_url.to_string(),
                    styled,
                },
                Err(failure) => {
                    tracing::warn!(layer = %descriptor.layer_name, "layer not published: {failure}");
                    LayerStatus::Failed {
                        reason: failure.to_string(),
                    }
                }
            };
            outcome.layers.push(LayerResult {
                layer_name: descriptor.layer_name.clone(),
                layer_type: descriptor.layer_type,
                status,
            });
        }

        let remaining = read_catalog(self.client.geoserver(), &workspace).await?;
        if remaining.is_empty() {
            tracing::info!(workspace = %workspace, "no layers left; tearing down");
            self.workspaces.destroy(resource_id, &workspace).await?;
            outcome.workspace_removed = true;
        }
        Ok(())
    }

    /// Stage and publish one layer, compensating on failure.
    async fn register(
        &self,
        workspace: &WorkspaceId,
        descriptor: &LayerDescriptor,
    ) -> Result<PublishedLayer, LayerFailure> {
        validate_layer_name(&descriptor.layer_name)?;

        if let Err(e) = self.stager.stage(descriptor).await {
            for leftover in self.stager.remove_descriptor_files(descriptor).await {
                tracing::warn!(layer = %descriptor.layer_name, "partial staging not cleaned: {leftover}");
            }
            return Err(e.into());
        }

        match self.publisher.publish(workspace, descriptor).await {
            Ok(layer) => Ok(layer),
            Err(failure) => {
                if let Err(leftover) = self.unpublisher.unpublish_descriptor(workspace, descriptor).await {
                    tracing::warn!(layer = %descriptor.layer_name, "compensation incomplete: {leftover}");
                }
                Err(failure)
            }
        }
    }
}
