//! # Application State
//!
//! Service configuration and the dispatcher shared by all handlers.

use geosync_engine::Dispatcher;
use zeroize::Zeroizing;

/// Default port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8090;

/// HTTP service configuration.
///
/// Custom `Debug` redacts the `auth_token`.
#[derive(Clone)]
pub struct ApiConfig {
    pub port: u16,
    /// Bearer token required on update requests. `None` disables auth.
    pub auth_token: Option<Zeroizing<String>>,
}

impl ApiConfig {
    /// Read `PORT` and `GEOSYNC_AUTH_TOKEN`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let auth_token = lookup("GEOSYNC_AUTH_TOKEN")
            .filter(|t| !t.is_empty())
            .map(Zeroizing::new);
        Self { port, auth_token }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            auth_token: None,
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: ApiConfig, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ApiConfig::from_lookup(lookup(&[]));
        assert_eq!(config.port, 8090);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn reads_port_and_token() {
        let config = ApiConfig::from_lookup(lookup(&[("PORT", "9000"), ("GEOSYNC_AUTH_TOKEN", "t0k")]));
        assert_eq!(config.port, 9000);
        assert_eq!(config.auth_token.as_deref().map(String::as_str), Some("t0k"));
    }

    #[test]
    fn empty_token_disables_auth_and_bad_port_falls_back() {
        let config = ApiConfig::from_lookup(lookup(&[("PORT", "eighty"), ("GEOSYNC_AUTH_TOKEN", "")]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn debug_redacts_token() {
        let config = ApiConfig {
            port: 1,
            auth_token: Some(Zeroizing::new("hunter2".into())),
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
