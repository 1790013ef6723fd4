//! Classification metrics
//!
//! Every outcome is counted twice: through the `metrics` facade (exported by
//! whatever recorder the host installs) and in an in-process collector that
//! callers can snapshot.

use serde::{Deserialize, Serialize};
use smsclass_core::labels::TRANSACTION_LABELS;
use smsclass_core::ClassificationOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Why a message will not be turned into a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Classified confidently as something other than a transaction
    NonTransaction,
    /// Transaction label below the confidence threshold
    LowConfidence,
    /// Pipeline unavailable or the model call failed
    InferenceFailed,
}

impl SkipReason {
    /// Skip reason for an outcome, `None` when it is actionable
    pub fn for_outcome(outcome: &ClassificationOutcome) -> Option<Self> {
        if outcome.is_degraded() {
            return Some(Self::InferenceFailed);
        }
        if outcome.is_actionable() {
            return None;
        }
        if TRANSACTION_LABELS.contains(&outcome.label()) {
            Some(Self::LowConfidence)
        } else {
            Some(Self::NonTransaction)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonTransaction => "non_transaction",
            Self::LowConfidence => "low_confidence",
            Self::InferenceFailed => "inference_failed",
        }
    }
}

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    metrics::describe_counter!(
        "smsclass_classifications_total",
        "Total number of SMS classifications by variant and outcome"
    );
    metrics::describe_histogram!(
        "smsclass_classification_latency_us",
        metrics::Unit::Microseconds,
        "End-to-end classification latency in microseconds by variant"
    );
}

/// Atomic outcome counters shared by clones
#[derive(Clone, Default)]
pub struct ClassificationMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    total: AtomicU64,
    actionable: AtomicU64,
    degraded: AtomicU64,
    non_transaction: AtomicU64,
    low_confidence: AtomicU64,
    inference_failed: AtomicU64,
    total_latency_us: AtomicU64,
}

impl ClassificationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished classification
    pub fn record(&self, variant: &'static str, outcome: &ClassificationOutcome, latency_us: u64) {
        let inner = &self.inner;
        inner.total.fetch_add(1, Ordering::Relaxed);
        inner.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);

        if outcome.is_degraded() {
            inner.degraded.fetch_add(1, Ordering::Relaxed);
        }

        let label = match SkipReason::for_outcome(outcome) {
            None => {
                inner.actionable.fetch_add(1, Ordering::Relaxed);
                "actionable"
            }
            Some(reason) => {
                let counter = match reason {
                    SkipReason::NonTransaction => &inner.non_transaction,
                    SkipReason::LowConfidence => &inner.low_confidence,
                    SkipReason::InferenceFailed => &inner.inference_failed,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                reason.as_str()
            }
        };

        metrics::counter!("smsclass_classifications_total", "variant" => variant, "outcome" => label)
            .increment(1);
        metrics::histogram!("smsclass_classification_latency_us", "variant" => variant)
            .record(latency_us as f64);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            total: inner.total.load(Ordering::Relaxed),
            actionable: inner.actionable.load(Ordering::Relaxed),
            degraded: inner.degraded.load(Ordering::Relaxed),
            skipped_non_transaction: inner.non_transaction.load(Ordering::Relaxed),
            skipped_low_confidence: inner.low_confidence.load(Ordering::Relaxed),
            skipped_inference_failed: inner.inference_failed.load(Ordering::Relaxed),
            total_latency_us: inner.total_latency_us.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ClassificationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ClassificationMetrics")
            .field(&self.snapshot())
            .finish()
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub actionable: u64,
    pub degraded: u64,
    pub skipped_non_transaction: u64,
    pub skipped_low_confidence: u64,
    pub skipped_inference_failed: u64,
    pub total_latency_us: u64,
}

impl MetricsSnapshot {
    pub fn skipped(&self) -> u64 {
        self.skipped_non_transaction + self.skipped_low_confidence + self.skipped_inference_failed
    }

    pub fn avg_latency_us(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.total_latency_us / self.total
        }
    }
}
