//! # geosync-api — Binary Entry Point
//!
//! Starts the update service. Configuration comes from the environment:
//! `PORT`, `GEOSYNC_AUTH_TOKEN`, the `geosync-client` variables, plus
//! `RUST_LOG` and `GEOSYNC_LOG_JSON` for logging.
//!
//! On SIGINT or SIGTERM the listener stops accepting requests and the
//! process waits for scheduled reconciliations before exiting.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;

use geosync_api::{ApiConfig, AppState};
use geosync_client::GeoSyncConfig;
use geosync_engine::{Dispatcher, Reconciler};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("GEOSYNC_LOG_JSON")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Upper bound on waiting for scheduled runs at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Resolve on Ctrl-C or, on Unix, SIGTERM. A handler that cannot be
/// installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GeoSyncConfig::from_env().context("loading geosync configuration")?;
    let api_config = ApiConfig::from_env();
    tracing::info!(?config, ?api_config, "configuration loaded");
    if !config.geoserver_configured() {
        tracing::warn!("GEOSERVER_REST_URL is empty; resources will be reconciled to no layers");
    }

    let reconciler = Reconciler::new(&config).context("building HTTP clients")?;
    let dispatcher = Dispatcher::new(reconciler);
    let state = AppState::new(api_config.clone(), dispatcher.clone());
    let app = geosync_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], api_config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("geosync-api listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!(in_flight = dispatcher.in_flight(), "draining scheduled reconciliations");
    if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher.drain()).await.is_err() {
        tracing::warn!(
            in_flight = dispatcher.in_flight(),
            "shutdown timed out; abandoning remaining runs"
        );
    }
    tracing::info!("geosync-api stopped");
    Ok(())
}
