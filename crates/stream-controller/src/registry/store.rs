//! Stream registry implementation.
//!
//! The single source of truth for which streams exist. Every read and write
//! of the backing map goes through one `RwLock`; stream processor calls are
//! made only after that lock has been released.
//!
//! Processor notifications for one key are serialised through a per-key
//! runner lane. Each notification re-reads the registry once it holds the
//! lane and applies only what the registry still says, so a teardown that
//! finishes late cannot undo a later write to the same key.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::entry::{RegistryState, StreamEntry};
use crate::errors::ScError;
use crate::models::{RunnerState, RunnerStatus, StreamConfig, StreamInfo, StreamListing};
use crate::observability::metrics;
use crate::services::stream_processor::{ProcessorError, StreamProcessor};

type RunnerLane = Arc<Mutex<()>>;

/// Central registry for all configured streams.
pub struct StreamRegistry {
    /// Backing map and sequence counter.
    state: RwLock<RegistryState>,

    /// One lane per key with a processor notification in flight.
    runner_lanes: Mutex<HashMap<String, RunnerLane>>,

    /// Downstream collaborator that runs the streams.
    processor: Arc<dyn StreamProcessor>,
}

impl StreamRegistry {
    /// Create an empty registry that notifies `processor` of changes.
    pub fn new(processor: Arc<dyn StreamProcessor>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            runner_lanes: Mutex::new(HashMap::new()),
            processor,
        }
    }

    /// Snapshot of every stream, ordered by key.
    pub async fn list(&self) -> BTreeMap<String, StreamListing> {
        self.state
            .read()
            .await
            .iter()
            .map(|(key, entry)| (key.clone(), entry.listing()))
            .collect()
    }

    /// Configuration stored under `key`.
    pub async fn get(&self, key: &str) -> Result<StreamConfig, ScError> {
        self.state
            .read()
            .await
            .get(key)
            .map(|entry| entry.config.clone())
            .ok_or_else(|| ScError::NotFound(key.to_string()))
    }

    /// Number of registered streams.
    pub async fn count(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.state.read().await.contains(key)
    }

    /// Unconditional insert-or-replace.
    ///
    /// Bypasses admission control; callers that must respect the capacity
    /// bound go through `AdmissionController::admit` instead.
    #[instrument(skip(self, config), fields(stream = %key))]
    pub async fn put(&self, key: &str, config: StreamConfig) -> Result<(), ScError> {
        let (revision, previous) = self
            .transact(|state| state.upsert(key, config.clone()))
            .await;

        self.start_runner(key, &config, revision, previous).await
    }

    /// Replace the configuration of an existing stream.
    ///
    /// Fails with `NotFound` if `key` is not registered. The stream keeps its
    /// admission position.
    #[instrument(skip(self, config), fields(stream = %key))]
    pub async fn edit(&self, key: &str, config: StreamConfig) -> Result<(), ScError> {
        let (revision, previous) = self
            .transact(|state| {
                if !state.contains(key) {
                    return Err(ScError::NotFound(key.to_string()));
                }
                Ok(state.upsert(key, config.clone()))
            })
            .await?;

        self.start_runner(key, &config, revision, previous).await
    }

    /// Remove `key` and tear down its runner.
    ///
    /// A teardown failure is returned to the caller but the removal stands.
    #[instrument(skip(self), fields(stream = %key))]
    pub async fn remove(&self, key: &str) -> Result<(), ScError> {
        self.transact(|state| state.take(key))
            .await
            .ok_or_else(|| ScError::NotFound(key.to_string()))?;

        info!(target: "sc.registry", stream = %key, "Stream removed");

        self.stop_runner(key).await
    }

    /// Restart the runner for `key` with its current configuration.
    ///
    /// The registry entry itself is unchanged apart from its touch order.
    #[instrument(skip(self), fields(stream = %key))]
    pub async fn reload(&self, key: &str) -> Result<(), ScError> {
        if !self.transact(|state| state.touch(key)).await {
            return Err(ScError::NotFound(key.to_string()));
        }

        let lane = self.lane(key).await;
        let result = {
            let _serialised = lane.lock().await;
            self.processor.restart(key).await
        };
        self.release_lane(key, lane).await;

        metrics::record_processor_call("restart", result.is_ok());
        result.map_err(ScError::from)
    }

    /// Registry entry for `key` combined with its runner status.
    ///
    /// A registered stream whose runner has not been started yet reports
    /// `RunnerState::Pending`.
    #[instrument(skip(self), fields(stream = %key))]
    pub async fn info(&self, key: &str) -> Result<StreamInfo, ScError> {
        let entry = self
            .state
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ScError::NotFound(key.to_string()))?;

        let result = self.processor.info(key).await;
        metrics::record_processor_call("info", result.is_ok());
        let runner = match result {
            Ok(runner) => runner,
            Err(ProcessorError::RunnerNotFound(_)) => RunnerStatus {
                state: RunnerState::Pending,
                started_at: None,
                restarts: 0,
            },
            Err(err) => return Err(err.into()),
        };

        Ok(StreamInfo {
            key: key.to_string(),
            config: entry.config,
            admitted_at: entry.admitted_at,
            updated_at: entry.updated_at,
            runner,
        })
    }

    /// Run `f` against the backing map under the write lock.
    ///
    /// This is the only way to make a decision and act on it atomically
    /// (capacity check, victim selection and insert all happen inside `f`).
    /// `f` must not block.
    pub(crate) async fn transact<R>(&self, f: impl FnOnce(&mut RegistryState) -> R) -> R {
        let mut state = self.state.write().await;
        let result = f(&mut *state);
        metrics::set_registry_size(state.len());
        result
    }

    /// Start the runner for the write identified by `revision`.
    ///
    /// Skipped if the key has left the registry or a newer write has landed
    /// by the time the lane is free; whoever made that change owns the
    /// runner. On failure the write is undone and the processor is handed
    /// back the restored configuration.
    pub(crate) async fn start_runner(
        &self,
        key: &str,
        config: &StreamConfig,
        revision: u64,
        previous: Option<StreamEntry>,
    ) -> Result<(), ScError> {
        let lane = self.lane(key).await;
        let result = {
            let _serialised = lane.lock().await;
            self.apply_start(key, config, revision, previous).await
        };
        self.release_lane(key, lane).await;
        result
    }

    async fn apply_start(
        &self,
        key: &str,
        config: &StreamConfig,
        revision: u64,
        previous: Option<StreamEntry>,
    ) -> Result<(), ScError> {
        let current = self.state.read().await.get(key).map(|entry| entry.revision);
        match current {
            None => {
                debug!(target: "sc.registry", stream = %key, "Stream left the registry before its runner started");
                return Ok(());
            }
            Some(current) if current != revision => {
                debug!(target: "sc.registry", stream = %key, revision, current, "Superseded before runner started");
                return Ok(());
            }
            Some(_) => {}
        }

        let result = self.processor.start(key, config).await;
        metrics::record_processor_call("start", result.is_ok());

        let Err(err) = result else {
            return Ok(());
        };

        let restored = previous.as_ref().map(|entry| entry.config.clone());
        let reverted = self.withdraw(key, revision, previous).await;
        warn!(
            target: "sc.registry",
            stream = %key,
            error = %err,
            reverted,
            "Runner failed to start, write withdrawn"
        );

        // The restored entry may never have had its own runner started
        if let (true, Some(restored)) = (reverted, restored) {
            let resync = self.processor.start(key, &restored).await;
            metrics::record_processor_call("start", resync.is_ok());
            if let Err(resync_err) = resync {
                warn!(
                    target: "sc.registry",
                    stream = %key,
                    error = %resync_err,
                    "Restored configuration failed to start"
                );
            }
        }

        Err(err.into())
    }

    /// Tear down the runner for a key that has left the map.
    ///
    /// Skipped if the key is back in the registry by the time the lane is
    /// free; the write that re-added it owns the runner.
    pub(crate) async fn stop_runner(&self, key: &str) -> Result<(), ScError> {
        let lane = self.lane(key).await;
        let result = {
            let _serialised = lane.lock().await;
            if self.contains(key).await {
                debug!(target: "sc.registry", stream = %key, "Stream re-added before teardown, runner kept");
                Ok(())
            } else {
                let result = self.processor.stop(key).await;
                metrics::record_processor_call("stop", result.is_ok());
                result.map_err(ScError::from)
            }
        };
        self.release_lane(key, lane).await;
        result
    }

    /// Undo the write identified by `revision`. See `RegistryState::revert`.
    pub(crate) async fn withdraw(
        &self,
        key: &str,
        revision: u64,
        previous: Option<StreamEntry>,
    ) -> bool {
        self.transact(|state| state.revert(key, revision, previous))
            .await
    }

    async fn lane(&self, key: &str) -> RunnerLane {
        self.runner_lanes
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Drop the lane for `key` once nobody else holds it.
    async fn release_lane(&self, key: &str, lane: RunnerLane) {
        let mut lanes = self.runner_lanes.lock().await;
        // Clones are only made under this lock: the map's copy plus ours
        if Arc::strong_count(&lane) == 2 {
            lanes.remove(key);
        }
    }
}
