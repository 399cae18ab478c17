//! Stream control handlers.
//!
//! Implements the control surface:
//!
//! - `GET /streams` - List registered streams
//! - `POST /streams/multi/control/add` - Admit many streams
//! - `POST /streams/multi/control/delete` - Remove many streams
//! - `POST /stream/{key}/add` - Admit or replace one stream
//! - `POST /stream/{key}/edit` - Replace an existing stream's configuration
//! - `GET /stream/{key}/delete` - Remove one stream
//! - `GET /stream/{key}/reload` - Restart one stream's runner
//! - `GET /stream/{key}/info` - Configuration plus runner status
//!
//! Every response uses the `{status, payload}` envelope. Batch endpoints
//! answer HTTP 200 even when items fail; the outer `status` is `0` if any
//! item failed.

use crate::errors::ScError;
use crate::handlers::extract::ValidJson;
use crate::models::{BatchAddRequest, Envelope, StreamConfig, StreamInfo, StreamListing};
use crate::routes::AppState;
use crate::services::admission::Admission;
use axum::{
    extract::{Path, State},
    Json,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

type BatchEnvelope = Envelope<BTreeMap<String, Envelope<String>>>;

/// Handler for GET /streams
#[instrument(skip_all)]
pub async fn list_streams(
    State(state): State<Arc<AppState>>,
) -> Json<Envelope<BTreeMap<String, StreamListing>>> {
    Json(Envelope::success(state.registry.list().await))
}

/// Handler for POST /streams/multi/control/add
///
/// Accepts `{key: config}` or `{"streams": {key: config}}`. A body whose
/// only key is `streams` is taken as the wrapped form when it parses as one.
/// Streams are admitted in key order; each may evict another.
///
/// # Response
///
/// - 200 OK: per-key outcomes
/// - 400 Bad Request: malformed or empty body, nothing applied
#[instrument(skip_all)]
pub async fn add_streams(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<BatchAddRequest>,
) -> Result<Json<BatchEnvelope>, ScError> {
    let report = state.batch.add_all(request.into_streams()).await?;
    Ok(Json(report.into_envelope()))
}

/// Handler for POST /streams/multi/control/delete
///
/// Accepts a JSON array of keys, removed in array order.
///
/// # Response
///
/// - 200 OK: per-key outcomes
/// - 400 Bad Request: malformed or empty body, nothing applied
#[instrument(skip_all)]
pub async fn delete_streams(
    State(state): State<Arc<AppState>>,
    ValidJson(keys): ValidJson<Vec<String>>,
) -> Result<Json<BatchEnvelope>, ScError> {
    let report = state.batch.delete_all(keys).await?;
    Ok(Json(report.into_envelope()))
}

/// Handler for POST /stream/{key}/add
#[instrument(skip(state, config), fields(stream = %key))]
pub async fn add_stream(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    ValidJson(config): ValidJson<StreamConfig>,
) -> Result<Json<Envelope<String>>, ScError> {
    let admission = state.admission.admit(&key, config).await?;

    if let Admission::Evicted { victim } = &admission {
        info!(target: "sc.handlers.streams", stream = %key, victim = %victim, "Admitted with eviction");
    }

    Ok(Json(Envelope::ok()))
}

/// Handler for POST /stream/{key}/edit
///
/// Fails if `key` is not registered; edits never evict.
#[instrument(skip(state, config), fields(stream = %key))]
pub async fn edit_stream(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    ValidJson(config): ValidJson<StreamConfig>,
) -> Result<Json<Envelope<String>>, ScError> {
    state.registry.edit(&key, config).await?;
    Ok(Json(Envelope::ok()))
}

/// Handler for GET /stream/{key}/delete
#[instrument(skip(state), fields(stream = %key))]
pub async fn delete_stream(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<Envelope<String>>, ScError> {
    state.registry.remove(&key).await?;
    Ok(Json(Envelope::ok()))
}

/// Handler for GET /stream/{key}/reload
#[instrument(skip(state), fields(stream = %key))]
pub async fn reload_stream(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<Envelope<String>>, ScError> {
    state.registry.reload(&key).await?;
    Ok(Json(Envelope::ok()))
}

/// Handler for GET /stream/{key}/info
#[instrument(skip(state), fields(stream = %key))]
pub async fn stream_info(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<Envelope<StreamInfo>>, ScError> {
    let info = state.registry.info(&key).await?;
    Ok(Json(Envelope::success(info)))
}
