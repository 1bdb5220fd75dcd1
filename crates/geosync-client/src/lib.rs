//! # geosync-client — Typed HTTP clients for the repository and GeoServer
//!
//! Provides typed access to the two services a reconciliation run talks to:
//! - **Repository** (HydroShare REST API): resource file manifests, file
//!   downloads, and discovery of public geospatial resources.
//! - **GeoServer** (REST API): workspaces, coverage and data stores,
//!   resource descriptions, and SLD styles.
//!
//! ## Architecture
//!
//! This crate is the only place that speaks HTTP to either service. The
//! engine consumes the typed results and never builds URLs itself.
//!
//! Transport failures are retried with exponential backoff (see [`retry`]).
//! Status responses are returned to the caller, which decides whether a
//! given status means success, absence, or failure.

pub mod config;
pub mod error;
pub mod geoserver;
pub(crate) mod http;
pub mod repository;
pub mod retry;

pub use config::{ConfigError, GeoSyncConfig};
pub use error::ClientError;
pub use geoserver::{GeoServerClient, ResourcePath};
pub use repository::{Manifest, RepositoryClient};

use std::time::Duration;

/// Top-level client. Holds one sub-client per service, sharing a connection
/// pool.
#[derive(Debug, Clone)]
pub struct GeoSyncClient {
    repository: RepositoryClient,
    geoserver: GeoServerClient,
}

impl GeoSyncClient {
    /// Create both clients from configuration.
    pub fn new(config: &GeoSyncConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("geosync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            repository: RepositoryClient::new(http.clone(), config.repository_url.clone()),
            geoserver: GeoServerClient::new(
                http,
                config.geoserver_url.clone(),
                config.geoserver_username.clone(),
                config.geoserver_password.clone(),
            ),
        })
    }

    /// Access the repository client.
    pub fn repository(&self) -> &RepositoryClient {
        &self.repository
    }

    /// Access the GeoServer client.
    pub fn geoserver(&self) -> &GeoServerClient {
        &self.geoserver
    }
}
