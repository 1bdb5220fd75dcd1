//! # geosync-api — Update Service
//!
//! HTTP front door for the reconciliation engine. The repository posts
//! the id of every resource that changed; each request schedules one
//! reconciliation through the shared [`Dispatcher`](geosync_engine::Dispatcher).
//!
//! ## API Surface
//!
//! | Route | Auth | Purpose |
//! |-------|------|---------|
//! | `POST /his/services/update/{resource_id}/` | bearer | Schedule a reconciliation |
//! | `GET /health/liveness` | none | Liveness probe |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

pub use error::AppError;
pub use state::{ApiConfig, AppState};

/// Assemble the application router.
///
/// Health probes are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::update::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state);

    let health = Router::new().route("/health/liveness", axum::routing::get(liveness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}
