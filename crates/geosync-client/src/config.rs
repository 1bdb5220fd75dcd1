//! Connection settings for the repository and GeoServer.
//!
//! A [`GeoSyncConfig`] is built once and handed to every component at
//! construction time. Values come from environment variables, a YAML file,
//! or explicit construction in tests. Fields missing from a YAML file fall
//! back to the environment, then to the defaults below.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

const DEFAULT_REPOSITORY_URL: &str = "http://localhost:8000/hsapi";
const DEFAULT_GEOSERVER_URL: &str = "http://localhost:8090/geoserver/rest";
const DEFAULT_GEOSERVER_USER: &str = "admin";
const DEFAULT_GEOSERVER_PASSWORD: &str = "geoserver";
const DEFAULT_DATA_DIR: &str = "/tmp";
const DEFAULT_NAMESPACE: &str = "HS";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings shared by the repository client, the GeoServer client and the
/// engine's storage handling.
///
/// Custom `Debug` implementation redacts `geoserver_password`.
#[derive(Clone)]
pub struct GeoSyncConfig {
    /// Repository REST API base, e.g. `https://www.hydroshare.org/hsapi`.
    /// Its parent is the repository root used for file downloads and
    /// discovery.
    pub repository_url: Url,
    /// GeoServer REST base, e.g. `https://geoserver.example.org/geoserver/rest`.
    /// `None` disables publishing: nothing is classified as publishable and
    /// catalog calls are skipped.
    pub geoserver_url: Option<Url>,
    pub geoserver_username: String,
    pub geoserver_password: Zeroizing<String>,
    /// Root of the storage GeoServer reads staged files from.
    pub data_dir: PathBuf,
    /// Workspace prefix; workspaces are named `{namespace}-{resource_id}`.
    pub namespace: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for GeoSyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoSyncConfig")
            .field("repository_url", &self.repository_url)
            .field("geoserver_url", &self.geoserver_url)
            .field("geoserver_username", &self.geoserver_username)
            .field("geoserver_password", &"[REDACTED]")
            .field("data_dir", &self.data_dir)
            .field("namespace", &self.namespace)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Partially specified configuration, as read from a file or the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    repository_url: Option<String>,
    geoserver_url: Option<String>,
    geoserver_username: Option<String>,
    geoserver_password: Option<String>,
    data_dir: Option<PathBuf>,
    namespace: Option<String>,
    timeout_secs: Option<u64>,
}

impl RawConfig {
    fn from_env() -> Self {
        Self {
            repository_url: std::env::var("HYDROSHARE_REST_URL").ok(),
            geoserver_url: std::env::var("GEOSERVER_REST_URL").ok(),
            geoserver_username: std::env::var("GEOSERVER_USERNAME").ok(),
            geoserver_password: std::env::var("GEOSERVER_PASSWORD").ok(),
            data_dir: std::env::var_os("GEOSERVER_DATA_DIR").map(PathBuf::from),
            namespace: std::env::var("WORKSPACE_PREFIX").ok(),
            timeout_secs: std::env::var("GEOSYNC_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Fill every unset field from `fallback`.
    fn or(self, fallback: RawConfig) -> Self {
        Self {
            repository_url: self.repository_url.or(fallback.repository_url),
            geoserver_url: self.geoserver_url.or(fallback.geoserver_url),
            geoserver_username: self.geoserver_username.or(fallback.geoserver_username),
            geoserver_password: self.geoserver_password.or(fallback.geoserver_password),
            data_dir: self.data_dir.or(fallback.data_dir),
            namespace: self.namespace.or(fallback.namespace),
            timeout_secs: self.timeout_secs.or(fallback.timeout_secs),
        }
    }

    fn resolve(self) -> Result<GeoSyncConfig, ConfigError> {
        let repository_url = parse_url(
            "repository_url",
            self.repository_url.as_deref().unwrap_or(DEFAULT_REPOSITORY_URL),
        )?;

        // An explicitly empty GeoServer URL switches publishing off.
        let geoserver_url = match self.geoserver_url.as_deref() {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(parse_url("geoserver_url", raw)?),
            None => Some(parse_url("geoserver_url", DEFAULT_GEOSERVER_URL)?),
        };

        let namespace = self
            .namespace
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        if namespace.is_empty() || namespace.contains(['/', ':', ' ']) {
            return Err(ConfigError::InvalidNamespace(namespace));
        }

        Ok(GeoSyncConfig {
            repository_url,
            geoserver_url,
            geoserver_username: self
                .geoserver_username
                .unwrap_or_else(|| DEFAULT_GEOSERVER_USER.to_string()),
            geoserver_password: Zeroizing::new(
                self.geoserver_password
                    .unwrap_or_else(|| DEFAULT_GEOSERVER_PASSWORD.to_string()),
            ),
            data_dir: self
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            namespace,
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}

impl GeoSyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `HYDROSHARE_REST_URL` (default: `http://localhost:8000/hsapi`)
    /// - `GEOSERVER_REST_URL` (default: `http://localhost:8090/geoserver/rest`;
    ///   set to an empty string to disable publishing)
    /// - `GEOSERVER_USERNAME` (default: `admin`)
    /// - `GEOSERVER_PASSWORD` (default: `geoserver`)
    /// - `GEOSERVER_DATA_DIR` (default: `/tmp`)
    /// - `WORKSPACE_PREFIX` (default: `HS`)
    /// - `GEOSYNC_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        RawConfig::from_env().resolve()
    }

    /// Load configuration from a YAML file. Keys use the field names of
    /// this struct; missing keys fall back to the environment.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&text)
    }

    fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        raw.or(RawConfig::from_env()).resolve()
    }

    /// Configuration pointing at local mock servers (for testing).
    pub fn local_mock(
        repository_url: &str,
        geoserver_url: &str,
        data_dir: &Path,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            repository_url: parse_url("repository_url", repository_url)?,
            geoserver_url: Some(parse_url("geoserver_url", geoserver_url)?),
            geoserver_username: "admin".to_string(),
            geoserver_password: Zeroizing::new("geoserver".to_string()),
            data_dir: data_dir.to_path_buf(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout_secs: 5,
        })
    }

    /// Whether a GeoServer endpoint is configured.
    pub fn geoserver_configured(&self) -> bool {
        self.geoserver_url.is_some()
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(field.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(
            field.to_string(),
            "URL cannot be used as a base".to_string(),
        ));
    }
    Ok(url)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid workspace namespace {0:?}")]
    InvalidNamespace(String),
    #[error("cannot read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("cannot parse config file: {0}")]
    Parse(String),
}
