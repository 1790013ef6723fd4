//! Logit decoding: softmax, arg-max and the actionable decision

use serde::{Deserialize, Serialize};
use smsclass_core::labels::{OTHER, TRANSACTION_LABELS};
use smsclass_core::{ClassificationResult, LabelTable};
use std::collections::HashSet;

/// Minimum confidence for an actionable label to be acted on
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.60;

/// Numerically stable softmax
///
/// Falls back to a uniform distribution when the exponent sum is zero or
/// not finite (e.g. NaN logits).
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let total: f32 = exps.iter().sum();

    if total == 0.0 || !total.is_finite() {
        let uniform = 1.0 / logits.len() as f32;
        return vec![uniform; logits.len()];
    }

    exps.into_iter().map(|e| e / total).collect()
}

/// Index of the largest value; the first one wins ties
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.iter().copied().enumerate() {
        if best.map_or(true, |(_, current)| v > current) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Decision settings shared by both classifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationDecoder {
    /// Confidence an actionable label must reach
    pub threshold: f32,

    /// Labels that may be flagged actionable
    pub actionable: HashSet<String>,
}

impl ClassificationDecoder {
    pub fn new<I, S>(threshold: f32, actionable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            threshold,
            actionable: actionable.into_iter().map(Into::into).collect(),
        }
    }

    /// Turn raw logits into a result
    pub fn decode(&self, logits: &[f32], labels: &LabelTable) -> ClassificationResult {
        let probabilities = softmax(logits);

        let (label, confidence) = match argmax(&probabilities) {
            Some(index) => (
                labels.get(index).unwrap_or(OTHER).to_string(),
                probabilities[index],
            ),
            None => (OTHER.to_string(), 0.0),
        };

        let is_actionable = self.actionable.contains(&label) && confidence >= self.threshold;

        let mut result = ClassificationResult::new(label, confidence);
        result.probabilities = labels
            .iter()
            .zip(probabilities.iter())
            .map(|(l, p)| (l.to_string(), *p))
            .collect();
        result.is_actionable = is_actionable;
        result
    }
}

impl Default for ClassificationDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, TRANSACTION_LABELS)
    }
}
