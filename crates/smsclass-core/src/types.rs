//! Classification results returned to callers

use crate::labels::OTHER;
use serde::{Deserialize, Serialize};

/// Result of classifying one SMS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Predicted category label
    pub label: String,

    /// Probability of the predicted label (0.0-1.0)
    pub confidence: f32,

    /// Full distribution in label-table order, keyed by label
    pub probabilities: Vec<(String, f32)>,

    /// Label is actionable and confidence cleared the threshold
    pub is_actionable: bool,

    /// Normalized text the features were derived from
    pub cleaned_text: String,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            probabilities: Vec::new(),
            is_actionable: false,
            cleaned_text: String::new(),
            latency_us: 0,
        }
    }

    /// The deterministic result reported when the pipeline cannot classify
    pub fn fallback() -> Self {
        Self::new(OTHER, 0.0)
    }

    /// Probability assigned to `label`, 0.0 when unknown
    pub fn probability(&self, label: &str) -> f32 {
        self.probabilities
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }

    /// Check if confidence reaches threshold
    pub fn meets_threshold(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

/// Why a classification fell back instead of running the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradedReason {
    /// Vocabulary, label mapping or backend failed to load
    #[error("classifier not ready: {0}")]
    NotReady(String),

    /// Backend invocation failed
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// Backend returned a tensor of the wrong shape
    #[error("invalid model output: {0}")]
    InvalidOutput(String),
}

/// Tagged outcome of a classification call
///
/// Both variants carry a usable result so the ingestion path can always
/// proceed; `Degraded` lets callers tell "classified with low confidence"
/// apart from "pipeline unavailable".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassificationOutcome {
    /// The model ran and its output was decoded
    Classified(ClassificationResult),

    /// The pipeline could not run; `result` is the fallback
    Degraded {
        result: ClassificationResult,
        reason: DegradedReason,
    },
}

impl ClassificationOutcome {
    /// Fallback outcome for the given reason
    pub fn degraded(reason: DegradedReason) -> Self {
        Self::Degraded {
            result: ClassificationResult::fallback(),
            reason,
        }
    }

    /// The result carried by either variant
    pub fn result(&self) -> &ClassificationResult {
        match self {
            Self::Classified(result) | Self::Degraded { result, .. } => result,
        }
    }

    /// Consume the outcome, keeping only the result
    pub fn into_result(self) -> ClassificationResult {
        match self {
            Self::Classified(result) | Self::Degraded { result, .. } => result,
        }
    }

    /// Degradation reason, if any
    pub fn degraded_reason(&self) -> Option<&DegradedReason> {
        match self {
            Self::Classified(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn label(&self) -> &str {
        &self.result().label
    }

    pub fn confidence(&self) -> f32 {
        self.result().confidence
    }

    pub fn is_actionable(&self) -> bool {
        self.result().is_actionable
    }
}
