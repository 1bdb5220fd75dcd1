//! Client error types.

/// Errors from repository and GeoServer calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error (connection refused, timeout, reset). Already
    /// retried by the time it surfaces.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The service answered with an unexpected status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The response body did not have the expected shape.
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    /// A URL could not be built from the configured base.
    #[error("cannot build URL for {endpoint} from {base}")]
    Url { endpoint: String, base: String },
    /// GeoServer is not configured; the call was skipped.
    #[error("GeoServer is not configured")]
    NotConfigured,
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ClientError {
    /// Transport failures are the only errors worth retrying. Status
    /// responses and body-shape problems are definitive.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// HTTP status of an [`ClientError::Api`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
