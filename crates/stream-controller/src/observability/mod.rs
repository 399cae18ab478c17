//! Observability for the stream controller.
//!
//! Provides Prometheus metric definitions and the recorder installer used by
//! the binary. Logging goes through `tracing` with `sc.<module>` targets.

pub mod metrics;
