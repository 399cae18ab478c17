//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

/// Liveness probe with registry occupancy.
///
/// Never fails while the process can serve requests; it does not call the
/// stream processor.
#[tracing::instrument(skip_all, name = "sc.health")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        instance_id: state.config.instance_id.clone(),
        streams: state.registry.count().await,
        max_streams: state.admission.max_streams(),
    })
}
