//! # Audit Subcommands
//!
//! Read-only reports of what an `update` would add. Nothing here mutates
//! the catalog or the storage area.

use anyhow::{Context, Result};
use clap::Args;

use geosync_engine::audit::{missing_layers, missing_workspaces};
use geosync_engine::{Access, Reconciler};

/// Arguments for the `geosync missing-workspaces` subcommand.
#[derive(Args, Debug)]
pub struct MissingWorkspacesArgs {
    /// Resources to check. With none, every public geospatial resource.
    #[arg(value_name = "RESOURCE_ID")]
    pub ids: Vec<String>,
}

/// Arguments for the `geosync missing-layers` subcommand.
#[derive(Args, Debug)]
pub struct MissingLayersArgs {
    /// Resources to check. With none, every public geospatial resource.
    #[arg(value_name = "RESOURCE_ID")]
    pub ids: Vec<String>,
}

/// List resources without a workspace and the layers each would publish.
pub async fn run_missing_workspaces(args: &MissingWorkspacesArgs, reconciler: &Reconciler) -> Result<u8> {
    let ids = crate::resolve_ids(reconciler, &args.ids).await?;
    let missing = missing_workspaces(reconciler, &ids)
        .await
        .context("failed to list workspaces")?;

    let mut code = 0;
    for id in &missing {
        match reconciler.inventory(id).await {
            Ok(inventory) if inventory.access == Access::Private => {
                println!("{id}: private");
            }
            Ok(inventory) => {
                println!("{id}: {} layer(s)", inventory.layers.len());
                for layer in &inventory.layers {
                    println!("  {} {}", layer.layer_type, layer.layer_name);
                }
            }
            Err(e) => {
                tracing::warn!(resource_id = %id, "inventory failed: {e}");
                println!("{id}: FAILED: {e}");
                code = 1;
            }
        }
    }
    println!("{} of {} resource(s) have no workspace", missing.len(), ids.len());
    Ok(code)
}

/// List desired layers absent from each resource's catalog.
pub async fn run_missing_layers(args: &MissingLayersArgs, reconciler: &Reconciler) -> Result<u8> {
    let ids = crate::resolve_ids(reconciler, &args.ids).await?;

    let mut code = 0;
    let mut total = 0usize;
    for id in &ids {
        match missing_layers(reconciler, id).await {
            Ok(layers) => {
                total += layers.len();
                for layer in layers {
                    println!(
                        "{id}: {} {} {}",
                        layer.descriptor.layer_type, layer.descriptor.layer_name, layer.url
                    );
                }
            }
            Err(e) => {
                tracing::warn!(resource_id = %id, "audit failed: {e}");
                println!("{id}: FAILED: {e}");
                code = 1;
            }
        }
    }
    println!("{total} missing layer(s) across {} resource(s)", ids.len());
    Ok(code)
}
