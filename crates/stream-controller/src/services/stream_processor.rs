//! Stream processor seam.
//!
//! The registry decides *which* streams exist; the stream processor is the
//! downstream collaborator that actually runs them. The registry notifies it
//! on every admit, removal, reload and info request, always after releasing
//! the registry lock.
//!
//! Two implementations are provided:
//!
//! - `LocalStreamProcessor` - in-process runner bookkeeping used by the binary
//! - `mock::MockStreamProcessor` - scriptable failures for tests

use crate::errors::ScError;
use crate::models::{RunnerState, RunnerStatus, StreamConfig};
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Errors reported by a stream processor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("no runner for stream {0}")]
    RunnerNotFound(String),

    #[error("stream processor unavailable: {0}")]
    Unavailable(String),
}

/// Processor failures surface to callers as storage errors.
impl From<ProcessorError> for ScError {
    fn from(err: ProcessorError) -> Self {
        ScError::Storage(err.to_string())
    }
}

/// Contract consumed by the registry.
#[async_trait::async_trait]
pub trait StreamProcessor: Send + Sync {
    /// Start (or restart with a new configuration) the runner for `key`.
    async fn start(&self, key: &str, config: &StreamConfig) -> Result<(), ProcessorError>;

    /// Tear down the runner for `key`. Stopping a key with no runner succeeds.
    async fn stop(&self, key: &str) -> Result<(), ProcessorError>;

    /// Restart the runner for `key` using the configuration it already has.
    async fn restart(&self, key: &str) -> Result<(), ProcessorError>;

    /// Current runner status for `key`.
    async fn info(&self, key: &str) -> Result<RunnerStatus, ProcessorError>;
}

#[derive(Debug, Clone)]
struct RunnerRecord {
    config: StreamConfig,
    status: RunnerStatus,
}

/// In-process stream processor.
///
/// Tracks one runner record per started stream. Media handling itself lives
/// outside this service.
#[derive(Debug, Default)]
pub struct LocalStreamProcessor {
    runners: RwLock<HashMap<String, RunnerRecord>>,
}

impl LocalStreamProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runners currently tracked.
    #[cfg(test)]
    pub async fn runner_count(&self) -> usize {
        self.runners.read().await.len()
    }

    /// Configuration the runner for `key` was started with.
    #[cfg(test)]
    pub async fn runner_config(&self, key: &str) -> Option<StreamConfig> {
        self.runners
            .read()
            .await
            .get(key)
            .map(|record| record.config.clone())
    }
}

#[async_trait::async_trait]
impl StreamProcessor for LocalStreamProcessor {
    #[instrument(skip(self, config), fields(stream = %key))]
    async fn start(&self, key: &str, config: &StreamConfig) -> Result<(), ProcessorError> {
        let record = RunnerRecord {
            config: config.clone(),
            status: RunnerStatus {
                state: RunnerState::Running,
                started_at: Some(Utc::now()),
                restarts: 0,
            },
        };

        let replaced = self
            .runners
            .write()
            .await
            .insert(key.to_string(), record)
            .is_some();

        info!(target: "sc.services.stream_processor", stream = %key, replaced, "Runner started");
        Ok(())
    }

    #[instrument(skip(self), fields(stream = %key))]
    async fn stop(&self, key: &str) -> Result<(), ProcessorError> {
        let existed = self.runners.write().await.remove(key).is_some();

        if existed {
            info!(target: "sc.services.stream_processor", stream = %key, "Runner stopped");
        } else {
            debug!(target: "sc.services.stream_processor", stream = %key, "No runner to stop");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(stream = %key))]
    async fn restart(&self, key: &str) -> Result<(), ProcessorError> {
        let mut runners = self.runners.write().await;
        let record = runners
            .get_mut(key)
            .ok_or_else(|| ProcessorError::RunnerNotFound(key.to_string()))?;

        record.status.state = RunnerState::Running;
        record.status.started_at = Some(Utc::now());
        record.status.restarts = record.status.restarts.saturating_add(1);

        info!(
            target: "sc.services.stream_processor",
            stream = %key,
            restarts = record.status.restarts,
            "Runner restarted"
        );
        Ok(())
    }

    async fn info(&self, key: &str) -> Result<RunnerStatus, ProcessorError> {
        self.runners
            .read()
            .await
            .get(key)
            .map(|record| record.status.clone())
            .ok_or_else(|| ProcessorError::RunnerNotFound(key.to_string()))
    }
}

/// Mock stream processor module for testing.
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Which processor operations a mock rejects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailOn {
        Nothing,
        Start,
        Stop,
        Restart,
        Info,
        Everything,
    }

    /// Mock stream processor for unit and integration tests.
    ///
    /// Always reports streams as running. Failures can be scripted per
    /// operation, optionally restricted to a set of keys.
    pub struct MockStreamProcessor {
        fail_on: FailOn,
        failing_keys: HashSet<String>,
        start_calls: AtomicUsize,
        stop_calls: AtomicUsize,
        restart_calls: AtomicUsize,
        info_calls: AtomicUsize,
        stopped: Mutex<Vec<String>>,
    }

    impl MockStreamProcessor {
        fn with(fail_on: FailOn, failing_keys: HashSet<String>) -> Self {
            Self {
                fail_on,
                failing_keys,
                start_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
                restart_calls: AtomicUsize::new(0),
                info_calls: AtomicUsize::new(0),
                stopped: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock that accepts every call.
        pub fn accepting() -> Self {
            Self::with(FailOn::Nothing, HashSet::new())
        }

        /// Create a mock that fails the given operation for every key.
        pub fn failing(fail_on: FailOn) -> Self {
            Self::with(fail_on, HashSet::new())
        }

        /// Create a mock that fails the given operation only for `keys`.
        pub fn failing_for<I, S>(fail_on: FailOn, keys: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self::with(fail_on, keys.into_iter().map(Into::into).collect())
        }

        pub fn start_calls(&self) -> usize {
            self.start_calls.load(Ordering::SeqCst)
        }

        pub fn stop_calls(&self) -> usize {
            self.stop_calls.load(Ordering::SeqCst)
        }

        pub fn restart_calls(&self) -> usize {
            self.restart_calls.load(Ordering::SeqCst)
        }

        pub fn info_calls(&self) -> usize {
            self.info_calls.load(Ordering::SeqCst)
        }

        /// Keys passed to `stop`, in call order.
        pub fn stopped_keys(&self) -> Vec<String> {
            self.stopped
                .lock()
                .map(|stopped| stopped.clone())
                .unwrap_or_default()
        }

        fn check(&self, op: FailOn, key: &str) -> Result<(), ProcessorError> {
            let op_matches = self.fail_on == FailOn::Everything || self.fail_on == op;
            let key_matches = self.failing_keys.is_empty() || self.failing_keys.contains(key);

            if op_matches && key_matches {
                return Err(ProcessorError::Unavailable(format!(
                    "mock {op:?} failure for {key}"
                )));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl StreamProcessor for MockStreamProcessor {
        async fn start(&self, key: &str, _config: &StreamConfig) -> Result<(), ProcessorError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            self.check(FailOn::Start, key)
        }

        async fn stop(&self, key: &str) -> Result<(), ProcessorError> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut stopped) = self.stopped.lock() {
                stopped.push(key.to_string());
            }
            self.check(FailOn::Stop, key)
        }

        async fn restart(&self, key: &str) -> Result<(), ProcessorError> {
            self.restart_calls.fetch_add(1, Ordering::SeqCst);
            self.check(FailOn::Restart, key)
        }

        async fn info(&self, key: &str) -> Result<RunnerStatus, ProcessorError> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            self.check(FailOn::Info, key)?;
            Ok(RunnerStatus {
                state: RunnerState::Running,
                started_at: None,
                restarts: 0,
            })
        }
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_error_maps_to_storage() {
        let err: ScError = ProcessorError::RunnerNotFound("cam1".to_string()).into();
        assert_eq!(err, ScError::Storage("no runner for stream cam1".to_string()));
    }

    #[tokio::test]
    async fn test_local_start_and_info() {
        let processor = LocalStreamProcessor::new();
        processor
            .start("cam1", &StreamConfig::named("lobby"))
            .await
            .unwrap();

        let status = processor.info("cam1").await.unwrap();
        assert_eq!(status.state, RunnerState::Running);
        assert!(status.started_at.is_some());
        assert_eq!(status.restarts, 0);
        assert_eq!(
            processor.runner_config("cam1").await,
            Some(StreamConfig::named("lobby"))
        );
    }

    #[tokio::test]
    async fn test_local_start_replaces_config_and_resets_restarts() {
        let processor = LocalStreamProcessor::new();
        processor.start("cam1", &StreamConfig::named("a")).await.unwrap();
        processor.restart("cam1").await.unwrap();

        processor.start("cam1", &StreamConfig::named("b")).await.unwrap();

        assert_eq!(processor.runner_count().await, 1);
        assert_eq!(processor.info("cam1").await.unwrap().restarts, 0);
        assert_eq!(
            processor.runner_config("cam1").await,
            Some(StreamConfig::named("b"))
        );
    }

    #[tokio::test]
    async fn test_local_restart_counts() {
        let processor = LocalStreamProcessor::new();
        processor.start("cam1", &StreamConfig::default()).await.unwrap();

        processor.restart("cam1").await.unwrap();
        processor.restart("cam1").await.unwrap();

        assert_eq!(processor.info("cam1").await.unwrap().restarts, 2);
    }

    #[tokio::test]
    async fn test_local_restart_unknown_runner() {
        let processor = LocalStreamProcessor::new();
        let result = processor.restart("missing").await;
        assert_eq!(
            result,
            Err(ProcessorError::RunnerNotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_local_stop_is_idempotent() {
        let processor = LocalStreamProcessor::new();
        processor.start("cam1", &StreamConfig::default()).await.unwrap();

        processor.stop("cam1").await.unwrap();
        processor.stop("cam1").await.unwrap();

        assert_eq!(processor.runner_count().await, 0);
        assert!(processor.info("cam1").await.is_err());
    }
}
