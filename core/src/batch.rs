//! Sequential batch processing on top of `PipelineRunner`.
//!
//! Items run one at a time so the single-slot model cache is reused
//! instead of thrashed. A failing item never aborts the batch; its
//! error record takes the item's place in the result.

use std::time::Duration;

use serde::Serialize;
use serde::ser::SerializeMap;
use tracing::{info, instrument};

use crate::extract::ExtractionRequest;
use crate::pipeline::{PipelineOutcome, PipelineRunner};

/// One audio input queued for batch processing.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Caller-chosen identifier, used as the key in the serialized result.
    pub id: String,
    pub samples: Vec<f32>,
}

impl BatchItem {
    pub fn new(id: impl Into<String>, samples: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            samples,
        }
    }
}

/// Per-item outcomes in input order.
///
/// Serializes as a JSON object keyed by item id, preserving the order
/// the items were submitted in.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    entries: Vec<(String, PipelineOutcome)>,
}

impl BatchResult {
    /// Outcome for the given item id. With duplicate ids the first
    /// submitted item wins.
    pub fn get(&self, id: &str) -> Option<&PipelineOutcome> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PipelineOutcome)> {
        self.entries
            .iter()
            .map(|(id, outcome)| (id.as_str(), outcome))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.entries.len(),
            ..BatchSummary::default()
        };
        for (_, outcome) in &self.entries {
            match outcome {
                PipelineOutcome::Quote(quote) => {
                    summary.succeeded += 1;
                    if quote.low_confidence {
                        summary.low_confidence += 1;
                    }
                    summary.total_time_s += quote.timing.total_s;
                }
                PipelineOutcome::Error(record) => {
                    summary.failed += 1;
                    summary.total_time_s += record.timing.total_s;
                }
            }
        }
        if summary.total > 0 {
            summary.average_time_s = summary.total_time_s / summary.total as f64;
        }
        summary
    }
}

impl Serialize for BatchResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, outcome) in &self.entries {
            map.serialize_entry(id, outcome)?;
        }
        map.end()
    }
}

/// Aggregate counts and timing over one batch run, computed over every
/// item that completed, successfully or with a captured error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub low_confidence: usize,
    pub total_time_s: f64,
    pub average_time_s: f64,
}

/// Drives a list of items through the pipeline sequentially.
pub struct BatchOrchestrator {
    runner: PipelineRunner,
    item_deadline: Option<Duration>,
}

impl BatchOrchestrator {
    pub fn new(runner: PipelineRunner) -> Self {
        Self {
            runner,
            item_deadline: None,
        }
    }

    /// Apply a per-item deadline. An expired item is recorded as timed
    /// out and the batch moves on to the next one.
    pub fn with_item_deadline(mut self, deadline: Duration) -> Self {
        self.item_deadline = Some(deadline);
        self
    }

    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn run(&self, items: Vec<BatchItem>, request: &ExtractionRequest) -> BatchResult {
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let outcome = match self.item_deadline {
                Some(deadline) => {
                    self.runner
                        .run_with_timeout(item.samples, request, deadline)
                        .await
                }
                None => self.runner.run(item.samples, request).await,
            };
            entries.push((item.id, outcome));
        }

        let result = BatchResult { entries };
        let summary = result.summary();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            low_confidence = summary.low_confidence,
            "Batch complete"
        );
        result
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod tests;
