//! # Update Subcommand
//!
//! Reconciles each resource through a [`Dispatcher`], at most `--jobs`
//! resources at a time, and prints one line per resource followed by one
//! indented line per layer touched.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use geosync_engine::{Dispatcher, Outcome, Reconciler};

/// Arguments for the `geosync update` subcommand.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Resources to reconcile. With none, every public geospatial resource.
    #[arg(value_name = "RESOURCE_ID")]
    pub ids: Vec<String>,

    /// How many resources to reconcile in parallel.
    #[arg(long, short, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Print each outcome as a JSON line instead of a summary.
    #[arg(long)]
    pub json: bool,
}

/// Execute the update subcommand.
///
/// Returns exit code: 0 when every run succeeded, 1 otherwise.
pub async fn run_update(args: &UpdateArgs, reconciler: Reconciler) -> Result<u8> {
    let ids = crate::resolve_ids(&reconciler, &args.ids).await?;
    let dispatcher = Dispatcher::new(reconciler);
    let outcomes = reconcile_all(&dispatcher, ids, usize::from(args.jobs)).await?;

    let mut failures = 0usize;
    for outcome in &outcomes {
        if !outcome.success() {
            failures += 1;
        }
        if args.json {
            println!("{}", serde_json::to_string(outcome)?);
        } else {
            for line in render(outcome) {
                println!("{line}");
            }
        }
    }

    tracing::info!(resources = outcomes.len(), failures, "update complete");
    Ok(if failures == 0 { 0 } else { 1 })
}

/// Dispatch every id with bounded parallelism. Outcomes keep input order.
pub async fn reconcile_all(
    dispatcher: &Dispatcher,
    ids: Vec<geosync_core::ResourceId>,
    jobs: usize,
) -> Result<Vec<Outcome>> {
    let permits = Arc::new(Semaphore::new(jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, id) in ids.into_iter().enumerate() {
        let permit = permits
            .clone()
            .acquire_owned()
            .await
            .context("job limiter closed")?;
        let dispatcher = dispatcher.clone();
        tasks.spawn(async move {
            let outcome = dispatcher.dispatch(&id).await;
            drop(permit);
            (index, outcome)
        });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.context("reconciliation task panicked")?);
    }
    outcomes.sort_by_key(|(index, _)| *index);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}

/// Summary lines for one outcome.
pub fn render(outcome: &Outcome) -> Vec<String> {
    let mut lines = vec![outcome.to_string()];
    lines.extend(outcome.layers.iter().map(|layer| format!("  {layer}")));
    lines.extend(
        outcome
            .unregistered
            .iter()
            .map(|entry| format!("  unregistered {entry}")),
    );
    lines.extend(
        outcome
            .unregister_failures
            .iter()
            .map(|failure| format!("  unregister failed {failure}")),
    );
    lines
}
