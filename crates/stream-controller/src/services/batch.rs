//! Batch execution of stream mutations.
//!
//! A batch applies one operation (admit or remove) to every item in the
//! request, independently and in order. Failures are recorded against the
//! item's key and never stop the batch; nothing is rolled back.

use crate::errors::ScError;
use crate::models::{Envelope, StreamConfig};
use crate::observability::metrics;
use crate::registry::StreamRegistry;
use crate::services::admission::AdmissionController;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, instrument};

/// Result of one batch item.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub key: String,
    pub result: Result<(), ScError>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// `"success"` or the error text.
    pub fn detail(&self) -> String {
        match &self.result {
            Ok(()) => crate::models::SUCCESS_MARKER.to_string(),
            Err(err) => err.to_string(),
        }
    }

    pub fn to_envelope(&self) -> Envelope<String> {
        if self.succeeded() {
            Envelope::success(self.detail())
        } else {
            Envelope::failure(self.detail())
        }
    }
}

/// Accumulated outcomes of a batch, one per input item, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    fn record(mut self, outcome: BatchOutcome) -> Self {
        self.outcomes.push(outcome);
        self
    }

    pub fn outcomes(&self) -> &[BatchOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True iff at least one item failed.
    pub fn failed(&self) -> bool {
        self.outcomes.iter().any(|outcome| !outcome.succeeded())
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.succeeded())
            .count()
    }

    /// Render as the control-surface envelope.
    ///
    /// The outer status is `0` if any item failed; the payload always holds
    /// every item's own envelope. Repeated keys keep their last outcome.
    pub fn into_envelope(self) -> Envelope<BTreeMap<String, Envelope<String>>> {
        let failed = self.failed();
        let payload = self
            .outcomes
            .iter()
            .map(|outcome| (outcome.key.clone(), outcome.to_envelope()))
            .collect();

        if failed {
            Envelope::failure(payload)
        } else {
            Envelope::success(payload)
        }
    }
}

/// Apply `operation` to every `(key, item)` pair, in order.
///
/// Rejects an empty batch with `ScError::EmptyBatch` before running anything.
/// Otherwise always returns a report with exactly one outcome per item.
pub async fn execute_batch<T, F, Fut>(
    items: Vec<(String, T)>,
    mut operation: F,
) -> Result<BatchReport, ScError>
where
    F: FnMut(String, T) -> Fut,
    Fut: Future<Output = Result<(), ScError>>,
{
    if items.is_empty() {
        return Err(ScError::EmptyBatch);
    }

    let mut report = BatchReport::default();
    for (key, item) in items {
        let result = operation(key.clone(), item).await;
        report = report.record(BatchOutcome { key, result });
    }
    Ok(report)
}

/// Runs add and delete batches against the registry.
#[derive(Clone)]
pub struct BatchExecutor {
    admission: Arc<AdmissionController>,
    registry: Arc<StreamRegistry>,
}

impl BatchExecutor {
    pub fn new(admission: Arc<AdmissionController>, registry: Arc<StreamRegistry>) -> Self {
        Self {
            admission,
            registry,
        }
    }

    /// Admit every stream in key order.
    #[instrument(skip_all, fields(items = streams.len()))]
    pub async fn add_all(
        &self,
        streams: BTreeMap<String, StreamConfig>,
    ) -> Result<BatchReport, ScError> {
        let admission = &self.admission;
        let report = execute_batch(streams.into_iter().collect(), |key, config| async move {
            admission
                .admit(&key, config)
                .await
                .map(|_| ())
                .inspect_err(|err| log_item_failure("add", &key, err))
        })
        .await?;

        metrics::record_batch("add", report.len(), report.failure_count());
        Ok(report)
    }

    /// Remove every key in request order.
    #[instrument(skip_all, fields(items = keys.len()))]
    pub async fn delete_all(&self, keys: Vec<String>) -> Result<BatchReport, ScError> {
        let registry = &self.registry;
        let report = execute_batch(
            keys.into_iter().map(|key| (key, ())).collect(),
            |key, ()| async move {
                registry
                    .remove(&key)
                    .await
                    .inspect_err(|err| log_item_failure("delete", &key, err))
            },
        )
        .await?;

        metrics::record_batch("delete", report.len(), report.failure_count());
        Ok(report)
    }
}

fn log_item_failure(operation: &str, key: &str, err: &ScError) {
    error!(
        target: "sc.services.batch",
        stream = %key,
        operation,
        error = %err,
        "Batch item failed"
    );
}
