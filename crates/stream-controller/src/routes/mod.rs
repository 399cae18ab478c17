//! HTTP routes for the stream controller.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_basic_auth, AuthState};
use crate::registry::StreamRegistry;
use crate::services::admission::AdmissionController;
use crate::services::batch::BatchExecutor;
use crate::services::stream_processor::StreamProcessor;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Arc<Config>,

    /// The stream registry.
    pub registry: Arc<StreamRegistry>,

    /// Capacity enforcement in front of the registry.
    pub admission: Arc<AdmissionController>,

    /// Multi-stream add/delete.
    pub batch: BatchExecutor,
}

impl AppState {
    /// Wire a registry, admission controller and batch executor around
    /// `processor`.
    pub fn new(config: Config, processor: Arc<dyn StreamProcessor>) -> Self {
        let registry = Arc::new(StreamRegistry::new(processor));
        let admission = Arc::new(AdmissionController::new(
            registry.clone(),
            config.max_streams,
            config.eviction_policy,
        ));
        let batch = BatchExecutor::new(admission.clone(), registry.clone());

        Self {
            config: Arc::new(config),
            registry,
            admission,
            batch,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe with registry occupancy - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/streams`, `/streams/multi/control/*`, `/stream/:key/*` - stream
///   control, behind Basic auth when credentials are configured
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Request timeout from `SC_REQUEST_TIMEOUT_SECONDS`
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_seconds);

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let mut stream_routes = Router::new()
        .route("/streams", get(handlers::list_streams))
        .route("/streams/multi/control/add", post(handlers::add_streams))
        .route(
            "/streams/multi/control/delete",
            post(handlers::delete_streams),
        )
        .route("/stream/:key/add", post(handlers::add_stream))
        .route("/stream/:key/edit", post(handlers::edit_stream))
        .route("/stream/:key/delete", get(handlers::delete_stream))
        .route("/stream/:key/reload", get(handlers::reload_stream))
        .route("/stream/:key/info", get(handlers::stream_info));

    if let Some(credentials) = state.config.api_credentials.clone() {
        let auth_state = Arc::new(AuthState::from(credentials));
        stream_routes = stream_routes.route_layer(middleware::from_fn_with_state(
            auth_state,
            require_basic_auth,
        ));
    }

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(stream_routes.with_state(state))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
