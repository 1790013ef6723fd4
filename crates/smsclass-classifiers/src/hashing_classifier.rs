//! Hashed-feature SMS classifier
//!
//! raw SMS → clean → 65,536-bucket n-gram counts → INT8 → model → decode

use crate::backend::{BackendGate, HashedFeatureBackend};
use crate::classifier::{finish, task_failed, validate_output, SmsClassifier};
use crate::cleaner::TextCleaner;
use crate::decoder::ClassificationDecoder;
use crate::metrics::ClassificationMetrics;
use crate::resources::LazyResource;
use crate::vectorizer::{HashingVectorizer, N_FEATURES};
use async_trait::async_trait;
use smsclass_core::{
    ClassificationOutcome, ClassificationResult, DegradedReason, Error, LabelTable, Result,
};
use std::sync::Arc;
use std::time::Instant;

const VARIANT: &str = "hashing";

/// A loaded hashed-feature model and the labels for its outputs
#[derive(Debug)]
pub struct HashingModel {
    labels: LabelTable,
    backend: BackendGate<dyn HashedFeatureBackend>,
}

impl HashingModel {
    /// Pair a backend with its label table, checking the input width
    pub fn new(backend: Arc<dyn HashedFeatureBackend>, labels: LabelTable) -> Result<Self> {
        let width = backend.input_width();
        if width != N_FEATURES {
            return Err(Error::backend(format!(
                "Model {} expects {} input features, vectorizer produces {}",
                backend.name(),
                width,
                N_FEATURES
            )));
        }

        Ok(Self {
            labels,
            backend: BackendGate::hashed(backend),
        })
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

/// Classifier over hashed unigram/bigram features
#[derive(Clone)]
pub struct HashingClassifier {
    inner: Arc<Inner>,
}

struct Inner {
    cleaner: TextCleaner,
    vectorizer: HashingVectorizer,
    decoder: ClassificationDecoder,
    model: LazyResource<HashingModel>,
    metrics: ClassificationMetrics,
}

impl HashingClassifier {
    /// Create a classifier over a lazily loaded model
    pub fn new(
        model: LazyResource<HashingModel>,
        decoder: ClassificationDecoder,
        metrics: ClassificationMetrics,
    ) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                cleaner: TextCleaner::new()?,
                vectorizer: HashingVectorizer::new()?,
                decoder,
                model,
                metrics,
            }),
        })
    }

    /// Create a ready classifier with default decision settings
    pub fn from_backend(backend: Arc<dyn HashedFeatureBackend>, labels: LabelTable) -> Result<Self> {
        let model = HashingModel::new(backend, labels)?;
        Self::new(
            LazyResource::ready("hashing model", model),
            ClassificationDecoder::default(),
            ClassificationMetrics::new(),
        )
    }

    pub fn metrics(&self) -> &ClassificationMetrics {
        &self.inner.metrics
    }

    pub fn decoder(&self) -> &ClassificationDecoder {
        &self.inner.decoder
    }

    /// Classify on the current thread
    pub fn classify_blocking(&self, text: &str) -> ClassificationOutcome {
        let outcome = self.evaluate_blocking(text);
        self.record(&outcome);
        outcome
    }

    /// Classify on the blocking pool without recording the outcome
    pub(crate) async fn evaluate(&self, text: &str) -> ClassificationOutcome {
        let this = self.clone();
        let text = text.to_string();

        match tokio::task::spawn_blocking(move || this.evaluate_blocking(&text)).await {
            Ok(outcome) => outcome,
            Err(e) => task_failed(VARIANT, e),
        }
    }

    fn record(&self, outcome: &ClassificationOutcome) {
        self.inner
            .metrics
            .record(VARIANT, outcome, outcome.result().latency_us);
    }

    fn evaluate_blocking(&self, text: &str) -> ClassificationOutcome {
        let started = Instant::now();
        let cleaned = self.inner.cleaner.clean(text);
        let run = self.run(&cleaned);
        finish(VARIANT, started, cleaned, run)
    }

    fn run(&self, cleaned: &str) -> std::result::Result<ClassificationResult, DegradedReason> {
        let model = self.inner.model.get()?;
        let backend = model.backend.backend();
        let params = backend.quantization();

        let features = self.inner.vectorizer.transform(cleaned);
        let quantized = params.input.quantize_slice(features.as_slice());

        let raw = model
            .backend
            .call(|b| b.run(&quantized))
            .map_err(|e| DegradedReason::InferenceFailed(e.to_string()))?;
        validate_output(&raw, &model.labels)?;

        if params.output.all_at_zero_point(&raw) {
            tracing::warn!(
                "Model {} returned only the zero point ({}); output may not be written",
                backend.name(),
                params.output.zero_point
            );
        }

        let logits = params.output.dequantize_slice(&raw);
        tracing::debug!(?raw, ?logits, "hashing model output");

        Ok(self.inner.decoder.decode(&logits, &model.labels))
    }
}

#[async_trait]
impl SmsClassifier for HashingClassifier {
    async fn classify(&self, text: &str) -> ClassificationOutcome {
        let outcome = self.evaluate(text).await;
        self.record(&outcome);
        outcome
    }

    fn name(&self) -> &str {
        VARIANT
    }

    fn is_ready(&self) -> bool {
        self.inner.model.get().is_ok()
    }
}
