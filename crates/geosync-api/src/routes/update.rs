//! # Update Requests
//!
//! The repository calls this endpoint whenever a resource's files or
//! access change. The request is acknowledged immediately and the
//! reconciliation runs on a background task through the dispatcher.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use geosync_core::ResourceId;

use crate::error::AppError;
use crate::state::AppState;

/// Acknowledgement returned to the repository.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub message: String,
    pub content: serde_json::Map<String, serde_json::Value>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/his/services/update/:resource_id/", post(update_resource))
}

async fn update_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<(StatusCode, Json<UpdateResponse>), AppError> {
    let resource_id = ResourceId::new(resource_id)?;
    tracing::info!(resource_id = %resource_id, "update request received");

    // Outcomes are logged by the reconciler; the handle is not awaited.
    drop(state.dispatcher.spawn(resource_id.clone()));

    Ok((
        StatusCode::CREATED,
        Json(UpdateResponse {
            success: true,
            message: format!("Update data services request received for resource: {resource_id}"),
            content: serde_json::Map::new(),
        }),
    ))
}
