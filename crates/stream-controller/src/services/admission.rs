//! Admission control for the stream registry.
//!
//! Enforces the `max_streams` bound. Admitting a new key into a full
//! registry evicts exactly one existing stream, chosen by a deterministic
//! `EvictionPolicy`:
//!
//! ```text
//! admit(key, config)
//!   ├─ key registered?           → replace in place (no capacity check)
//!   ├─ count < max_streams?      → insert
//!   └─ otherwise                 → take victim, insert       (one lock)
//!                                   then stop(victim), start(key)
//! ```
//!
//! The capacity check, victim removal and insert share a single registry
//! write lock, so concurrent admissions can never push the count above
//! `max_streams`.
//!
//! The new entry is visible to `list` and `info` while the victim is torn
//! down (`info` reports its runner as pending). If that teardown fails the
//! entry is withdrawn again, unless a concurrent write to the same key has
//! replaced it; that write then owns the key and this admission still fails.

use crate::errors::ScError;
use crate::models::StreamConfig;
use crate::observability::metrics;
use crate::registry::{RegistryState, StreamRegistry};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Default registry capacity.
pub const DEFAULT_MAX_STREAMS: usize = 4;

/// How the victim is chosen when a new stream arrives at a full registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Evict the stream admitted longest ago. Replacing a stream's config
    /// does not change its admission position.
    #[default]
    OldestAdmitted,

    /// Evict the stream whose last add, edit or reload is oldest.
    LeastRecentlyTouched,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::OldestAdmitted => "oldest-admitted",
            EvictionPolicy::LeastRecentlyTouched => "least-recently-touched",
        }
    }

    /// Pick the key to evict, or `None` if the registry is empty.
    pub fn select_victim(&self, state: &RegistryState) -> Option<String> {
        let victim = match self {
            EvictionPolicy::OldestAdmitted => {
                state.iter().min_by_key(|(_, entry)| entry.admitted_seq)
            }
            EvictionPolicy::LeastRecentlyTouched => {
                state.iter().min_by_key(|(_, entry)| entry.touched_seq)
            }
        };
        victim.map(|(key, _)| key.clone())
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest-admitted" | "fifo" => Ok(EvictionPolicy::OldestAdmitted),
            "least-recently-touched" | "lru" => Ok(EvictionPolicy::LeastRecentlyTouched),
            other => Err(format!(
                "unknown eviction policy '{other}', expected 'oldest-admitted' or 'least-recently-touched'"
            )),
        }
    }
}

/// What an admission did to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The key was new and there was room.
    Inserted,
    /// The key already existed; its configuration was replaced.
    Replaced,
    /// The key was new and `victim` was evicted to make room.
    Evicted { victim: String },
}

impl Admission {
    fn outcome(&self) -> &'static str {
        match self {
            Admission::Inserted => "inserted",
            Admission::Replaced => "replaced",
            Admission::Evicted { .. } => "evicted",
        }
    }
}

/// Decides whether a stream may enter the registry and frees capacity when
/// it may not.
pub struct AdmissionController {
    registry: Arc<StreamRegistry>,
    max_streams: usize,
    policy: EvictionPolicy,
}

impl AdmissionController {
    /// `max_streams` must be at least 1; zero is treated as 1.
    pub fn new(registry: Arc<StreamRegistry>, max_streams: usize, policy: EvictionPolicy) -> Self {
        Self {
            registry,
            max_streams: max_streams.max(1),
            policy,
        }
    }

    pub fn max_streams(&self) -> usize {
        self.max_streams
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Admit `config` under `key`, evicting one stream if the registry is full.
    ///
    /// # Errors
    ///
    /// - `ScError::CapacityEviction` - the victim's teardown failed; the new
    ///   stream is not admitted (the victim stays removed)
    /// - `ScError::Storage` - the new stream's runner failed to start; the
    ///   registry change is withdrawn
    #[instrument(skip(self, config), fields(stream = %key))]
    pub async fn admit(&self, key: &str, config: StreamConfig) -> Result<Admission, ScError> {
        let max_streams = self.max_streams;
        let policy = self.policy;

        let (admission, revision, previous) = self
            .registry
            .transact(|state| {
                if state.contains(key) {
                    let (revision, previous) = state.upsert(key, config.clone());
                    return Ok((Admission::Replaced, revision, previous));
                }

                if state.len() < max_streams {
                    let (revision, previous) = state.upsert(key, config.clone());
                    return Ok((Admission::Inserted, revision, previous));
                }

                // Only reachable with max_streams == 0, which `new` rules out
                let victim = policy.select_victim(state).ok_or(ScError::Internal)?;
                state.take(&victim);
                let (revision, previous) = state.upsert(key, config.clone());
                Ok((Admission::Evicted { victim }, revision, previous))
            })
            .await
            .inspect_err(|_: &ScError| metrics::record_admission("failed"))?;

        if let Admission::Evicted { victim } = &admission {
            info!(
                target: "sc.services.admission",
                stream = %key,
                victim = %victim,
                policy = %policy,
                "Registry full, evicting stream"
            );
            metrics::record_eviction();

            if let Err(err) = self.registry.stop_runner(victim).await {
                if self.registry.withdraw(key, revision, previous).await {
                    warn!(
                        target: "sc.services.admission",
                        stream = %key,
                        victim = %victim,
                        error = %err,
                        "Eviction teardown failed, admission aborted"
                    );
                } else {
                    warn!(
                        target: "sc.services.admission",
                        stream = %key,
                        victim = %victim,
                        error = %err,
                        "Eviction teardown failed, admission aborted; key already rewritten by a concurrent write"
                    );
                }
                metrics::record_admission("failed");
                return Err(ScError::CapacityEviction(format!(
                    "could not evict stream {victim}: {err}"
                )));
            }
        }

        if let Err(err) = self
            .registry
            .start_runner(key, &config, revision, previous)
            .await
        {
            metrics::record_admission("failed");
            return Err(err);
        }

        metrics::record_admission(admission.outcome());
        info!(
            target: "sc.services.admission",
            stream = %key,
            outcome = admission.outcome(),
            "Stream admitted"
        );
        Ok(admission)
    }
}
