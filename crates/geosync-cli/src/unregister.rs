//! # Unregister Subcommand
//!
//! Removes each resource's workspace and staged files, regardless of the
//! resource's state in the repository.

use anyhow::Result;
use clap::Args;

use geosync_engine::{Dispatcher, Reconciler};

/// Arguments for the `geosync unregister` subcommand.
#[derive(Args, Debug)]
pub struct UnregisterArgs {
    /// Resources to tear down. With none, every public geospatial resource.
    #[arg(value_name = "RESOURCE_ID")]
    pub ids: Vec<String>,
}

/// Execute the unregister subcommand.
///
/// Returns exit code: 0 when every teardown succeeded, 1 otherwise.
pub async fn run_unregister(args: &UnregisterArgs, reconciler: Reconciler) -> Result<u8> {
    let ids = crate::resolve_ids(&reconciler, &args.ids).await?;
    let dispatcher = Dispatcher::new(reconciler);

    let mut code = 0;
    for id in &ids {
        match dispatcher.teardown(id).await {
            Ok(()) => println!("{id}: unregistered"),
            Err(e) => {
                tracing::error!(resource_id = %id, "teardown failed: {e}");
                println!("{id}: FAILED: {e}");
                code = 1;
            }
        }
    }
    Ok(code)
}
