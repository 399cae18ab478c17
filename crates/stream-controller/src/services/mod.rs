//! Service layer for the stream controller.
//!
//! # Components
//!
//! - `admission` - capacity enforcement and eviction
//! - `batch` - multi-stream add and delete
//! - `stream_processor` - contract with the component that runs streams

pub mod admission;
pub mod batch;
pub mod stream_processor;

pub use admission::{Admission, AdmissionController, EvictionPolicy};
pub use batch::{BatchExecutor, BatchOutcome, BatchReport};
pub use stream_processor::{LocalStreamProcessor, ProcessorError, StreamProcessor};
