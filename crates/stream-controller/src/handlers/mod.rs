//! HTTP request handlers for the stream controller.

pub mod extract;
pub mod health;
pub mod metrics;
pub mod streams;

pub use extract::ValidJson;
pub use health::health_check;
pub use metrics::metrics_handler;
pub use streams::{
    add_stream, add_streams, delete_stream, delete_streams, edit_stream, list_streams,
    reload_stream, stream_info,
};
