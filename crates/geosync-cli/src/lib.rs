//! # geosync-cli — Command-Line Reconciliation
//!
//! Provides the `geosync` command-line interface.
//!
//! ## Subcommands
//!
//! - `geosync update` — Reconcile resources, several at a time.
//! - `geosync unregister` — Remove resources' workspaces and staged files.
//! - `geosync missing-workspaces` — Public resources with no workspace.
//! - `geosync missing-layers` — Desired layers absent from the catalog.
//!
//! Every subcommand takes resource ids; with none it walks every public
//! geospatial resource the repository's discovery endpoint reports.
//!
//! ```bash
//! geosync -v update abc123 def456 --jobs 2
//! geosync --config geosync.yaml missing-layers
//! ```

pub mod audit;
pub mod unregister;
pub mod update;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use geosync_client::GeoSyncConfig;
use geosync_core::ResourceId;
use geosync_engine::Reconciler;

use crate::audit::{MissingLayersArgs, MissingWorkspacesArgs};
use crate::unregister::UnregisterArgs;
use crate::update::UpdateArgs;

/// Keep a GeoServer catalog in step with repository resources.
#[derive(Parser, Debug)]
#[command(name = "geosync", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// YAML configuration file. Unset fields fall back to the environment.
    #[arg(long, global = true, value_name = "YAML")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile resources against the catalog.
    Update(UpdateArgs),

    /// Tear down resources' workspaces and staged storage.
    Unregister(UnregisterArgs),

    /// List public geospatial resources that have no workspace.
    MissingWorkspaces(MissingWorkspacesArgs),

    /// List desired layers that are not in the catalog.
    MissingLayers(MissingLayersArgs),
}

impl Cli {
    /// Log filter for the `-v` count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Load configuration from `--config` or the environment.
pub fn load_config(path: Option<&Path>) -> Result<GeoSyncConfig> {
    match path {
        Some(path) => GeoSyncConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => GeoSyncConfig::from_env().context("failed to load configuration from environment"),
    }
}

/// Execute a parsed command. Returns the process exit code.
pub async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");
    let reconciler = Reconciler::new(&config).context("failed to build HTTP clients")?;

    match cli.command {
        Commands::Update(args) => update::run_update(&args, reconciler).await,
        Commands::Unregister(args) => unregister::run_unregister(&args, reconciler).await,
        Commands::MissingWorkspaces(args) => audit::run_missing_workspaces(&args, &reconciler).await,
        Commands::MissingLayers(args) => audit::run_missing_layers(&args, &reconciler).await,
    }
}

/// Parse explicit ids, or discover every public geospatial resource.
pub async fn resolve_ids(reconciler: &Reconciler, ids: &[String]) -> Result<Vec<ResourceId>> {
    if ids.is_empty() {
        let discovered = reconciler
            .client()
            .repository()
            .discover_public_geo_resources()
            .await
            .context("resource discovery failed")?;
        tracing::info!(resources = discovered.len(), "resources discovered");
        return Ok(discovered);
    }
    ids.iter()
        .map(|raw| ResourceId::new(raw.as_str()).map_err(anyhow::Error::from))
        .collect()
}
