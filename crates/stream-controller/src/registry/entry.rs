//! Registry entry and lock-protected registry state.

use crate::models::{StreamConfig, StreamListing};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A stream configuration plus the bookkeeping the registry keeps for it.
///
/// Sequence numbers come from one monotonically increasing counter per
/// registry, so they give a total order over admissions and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    /// Current configuration.
    pub config: StreamConfig,

    /// Sequence number of the admission that created this entry.
    /// Preserved when the configuration is replaced.
    pub admitted_seq: u64,

    /// Sequence number of the most recent add, edit or reload.
    pub touched_seq: u64,

    /// Sequence number of the most recent configuration write.
    /// Used to detect whether a rollback would clobber a newer write.
    pub revision: u64,

    /// Wall-clock admission time.
    pub admitted_at: DateTime<Utc>,

    /// Wall-clock time of the most recent configuration write.
    pub updated_at: DateTime<Utc>,
}

impl StreamEntry {
    pub fn listing(&self) -> StreamListing {
        StreamListing {
            config: self.config.clone(),
            admitted_at: self.admitted_at,
            updated_at: self.updated_at,
        }
    }
}

/// The registry's backing map. Only reachable through the registry lock.
#[derive(Debug, Default)]
pub struct RegistryState {
    entries: HashMap<String, StreamEntry>,
    next_seq: u64,
}

impl RegistryState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&StreamEntry> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StreamEntry)> {
        self.entries.iter()
    }

    /// Insert or replace the configuration stored under `key`.
    ///
    /// A replaced entry keeps its admission sequence and time. Returns the
    /// new revision together with the previous entry, if any.
    pub fn upsert(&mut self, key: &str, config: StreamConfig) -> (u64, Option<StreamEntry>) {
        let seq = self.next_seq();
        let now = Utc::now();

        match self.entries.get_mut(key) {
            Some(entry) => {
                let previous = entry.clone();
                entry.config = config;
                entry.touched_seq = seq;
                entry.revision = seq;
                entry.updated_at = now;
                (seq, Some(previous))
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    StreamEntry {
                        config,
                        admitted_seq: seq,
                        touched_seq: seq,
                        revision: seq,
                        admitted_at: now,
                        updated_at: now,
                    },
                );
                (seq, None)
            }
        }
    }

    /// Mark `key` as used without changing its configuration.
    pub fn touch(&mut self, key: &str) -> bool {
        let seq = self.next_seq();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touched_seq = seq;
                true
            }
            None => false,
        }
    }

    pub fn take(&mut self, key: &str) -> Option<StreamEntry> {
        self.entries.remove(key)
    }

    /// Undo the write that produced `revision`.
    ///
    /// Restores `previous` (or removes the key when there was none), but only
    /// if the entry still carries `revision`. Returns whether anything changed.
    pub fn revert(&mut self, key: &str, revision: u64, previous: Option<StreamEntry>) -> bool {
        if !matches!(self.entries.get(key), Some(entry) if entry.revision == revision) {
            return false;
        }

        match previous {
            Some(previous) => {
                self.entries.insert(key.to_string(), previous);
            }
            None => {
                self.entries.remove(key);
            }
        }
        true
    }
}
