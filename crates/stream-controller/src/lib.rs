//! Stream Controller Service Library
//!
//! Control core for a media-streaming server: a bounded registry of stream
//! configurations, capacity enforcement with deterministic eviction, batch
//! add/delete, and an HTTP control surface.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> registry/*.rs
//!                                         │
//!                                         └─> StreamProcessor (runs streams)
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Basic auth and HTTP metrics
//! - `models` - Wire types and the response envelope
//! - `observability` - Prometheus metrics
//! - `registry` - Lock-protected stream registry
//! - `routes` - Axum router setup
//! - `services` - Admission, batch execution, stream processor contract

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod registry;
pub mod routes;
pub mod services;
