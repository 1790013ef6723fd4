//! SMS classifier trait and shared outcome handling

use async_trait::async_trait;
use smsclass_core::{ClassificationOutcome, ClassificationResult, DegradedReason, LabelTable};
use std::time::Instant;

/// Trait for all SMS classifiers
///
/// Classification never fails: when the pipeline cannot run, the outcome is
/// `Degraded` and carries the fallback result.
#[async_trait]
pub trait SmsClassifier: Send + Sync {
    /// Classify one raw SMS body
    async fn classify(&self, text: &str) -> ClassificationOutcome;

    /// Classify many messages concurrently, preserving order
    async fn classify_batch(&self, texts: &[String]) -> Vec<ClassificationOutcome> {
        futures::future::join_all(texts.iter().map(|text| self.classify(text))).await
    }

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Whether resources are loaded; triggers loading on first call
    fn is_ready(&self) -> bool;
}

/// Reject outputs that do not line up with the label table
pub(crate) fn validate_output(raw: &[i8], labels: &LabelTable) -> Result<(), DegradedReason> {
    if raw.len() != labels.len() {
        return Err(DegradedReason::InvalidOutput(format!(
            "model returned {} values for {} labels",
            raw.len(),
            labels.len()
        )));
    }
    Ok(())
}

/// Stamp timing and text onto a finished run
///
/// Nothing is recorded here; whoever returns the outcome to the caller
/// records it, so a fallback chain counts each message once.
pub(crate) fn finish(
    variant: &'static str,
    started: Instant,
    cleaned_text: String,
    run: Result<ClassificationResult, DegradedReason>,
) -> ClassificationOutcome {
    let latency_us = started.elapsed().as_micros() as u64;

    let mut outcome = match run {
        Ok(result) => ClassificationOutcome::Classified(result),
        Err(reason) => {
            tracing::warn!("{} classifier degraded: {}", variant, reason);
            ClassificationOutcome::degraded(reason)
        }
    };

    match &mut outcome {
        ClassificationOutcome::Classified(result) | ClassificationOutcome::Degraded { result, .. } => {
            result.cleaned_text = cleaned_text;
            result.latency_us = latency_us;
        }
    }

    tracing::debug!(
        label = outcome.label(),
        confidence = outcome.confidence(),
        actionable = outcome.is_actionable(),
        latency_us,
        "{} classification complete",
        variant
    );

    outcome
}

/// Outcome for a blocking task that panicked or was cancelled
pub(crate) fn task_failed(
    variant: &'static str,
    error: tokio::task::JoinError,
) -> ClassificationOutcome {
    tracing::warn!("{} classification task failed: {}", variant, error);
    ClassificationOutcome::degraded(DegradedReason::InferenceFailed(error.to_string()))
}
