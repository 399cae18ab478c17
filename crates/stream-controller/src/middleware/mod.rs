//! Middleware for the stream controller.
//!
//! # Components
//!
//! - `auth` - HTTP Basic authentication for the stream routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_basic_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
