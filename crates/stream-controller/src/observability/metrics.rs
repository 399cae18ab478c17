//! Metric definitions for the stream controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sc_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: route templates, never raw stream keys
//! - `status`: success, error, timeout
//! - `outcome`: inserted, replaced, evicted, failed
//! - `operation`: add, delete, start, stop, restart, info

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder and return the handle used to
/// render `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder cannot be installed (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("sc_http_request".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `sc_http_requests_total`, `sc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("sc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("sc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Replace stream keys in the path with `{key}`.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/metrics" | "/streams" | "/streams/multi/control/add"
        | "/streams/multi/control/delete" => path.to_string(),
        _ => normalize_stream_endpoint(path),
    }
}

fn normalize_stream_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();

    // /stream/{key}/{action} splits into ["", "stream", key, action]
    if let ["", "stream", key, action] = parts.as_slice() {
        if !key.is_empty()
            && matches!(*action, "add" | "edit" | "delete" | "reload" | "info")
        {
            return format!("/stream/{{key}}/{action}");
        }
    }

    "/other".to_string()
}

// ============================================================================
// Admission Metrics
// ============================================================================

/// Record the outcome of an admission.
///
/// Metric: `sc_admissions_total`
/// Labels: `outcome` (inserted, replaced, evicted, failed)
pub fn record_admission(outcome: &str) {
    counter!("sc_admissions_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Metric: `sc_evictions_total`
pub fn record_eviction() {
    counter!("sc_evictions_total").increment(1);
}

// ============================================================================
// Registry Metrics
// ============================================================================

/// Set the number of registered streams.
///
/// Metric: `sc_registry_streams`
/// Type: Gauge
pub fn set_registry_size(count: usize) {
    gauge!("sc_registry_streams").set(count as f64);
}

// ============================================================================
// Batch Metrics
// ============================================================================

/// Record the per-item results of a batch.
///
/// Metric: `sc_batch_items_total`
/// Labels: `operation` (add, delete), `status` (success, error)
pub fn record_batch(operation: &str, items: usize, failed: usize) {
    let succeeded = items.saturating_sub(failed);

    counter!("sc_batch_items_total",
        "operation" => operation.to_string(),
        "status" => "success"
    )
    .increment(succeeded as u64);

    counter!("sc_batch_items_total",
        "operation" => operation.to_string(),
        "status" => "error"
    )
    .increment(failed as u64);
}

// ============================================================================
// Processor Metrics
// ============================================================================

/// Record a call into the stream processor.
///
/// Metric: `sc_processor_calls_total`
/// Labels: `operation` (start, stop, restart, info), `status` (success, error)
pub fn record_processor_call(operation: &str, ok: bool) {
    let status = if ok { "success" } else { "error" };

    counter!("sc_processor_calls_total",
        "operation" => operation.to_string(),
        "status" => status
    )
    .increment(1);
}
