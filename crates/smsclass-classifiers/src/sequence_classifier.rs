//! Token-sequence SMS classifier
//!
//! raw SMS → WordPiece ids + attention mask (128) → model → INT8 logits → decode

use crate::backend::{BackendGate, SequenceBackend};
use crate::classifier::{finish, task_failed, validate_output, SmsClassifier};
use crate::decoder::ClassificationDecoder;
use crate::metrics::ClassificationMetrics;
use crate::resources::LazyResource;
use crate::vocabulary::Vocabulary;
use crate::wordpiece::WordPieceTokenizer;
use async_trait::async_trait;
use smsclass_core::{ClassificationOutcome, ClassificationResult, DegradedReason, LabelTable, Result};
use std::sync::Arc;
use std::time::Instant;

const VARIANT: &str = "sequence";

/// Tokenizer, labels and backend for the sequence model
#[derive(Debug)]
pub struct SequenceModel {
    tokenizer: WordPieceTokenizer,
    labels: LabelTable,
    backend: BackendGate<dyn SequenceBackend>,
}

impl SequenceModel {
    pub fn new(
        backend: Arc<dyn SequenceBackend>,
        vocab: Arc<Vocabulary>,
        labels: LabelTable,
    ) -> Result<Self> {
        Ok(Self {
            tokenizer: WordPieceTokenizer::new(vocab)?,
            labels,
            backend: BackendGate::sequence(backend),
        })
    }

    pub fn tokenizer(&self) -> &WordPieceTokenizer {
        &self.tokenizer
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

/// Classifier over WordPiece token sequences
#[derive(Clone)]
pub struct SequenceClassifier {
    inner: Arc<Inner>,
}

struct Inner {
    decoder: ClassificationDecoder,
    model: LazyResource<SequenceModel>,
    metrics: ClassificationMetrics,
}

impl SequenceClassifier {
    pub fn new(
        model: LazyResource<SequenceModel>,
        decoder: ClassificationDecoder,
        metrics: ClassificationMetrics,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                decoder,
                model,
                metrics,
            }),
        }
    }

    /// Create a ready classifier with default decision settings
    pub fn from_backend(
        backend: Arc<dyn SequenceBackend>,
        vocab: Arc<Vocabulary>,
        labels: LabelTable,
    ) -> Result<Self> {
        let model = SequenceModel::new(backend, vocab, labels)?;
        Ok(Self::new(
            LazyResource::ready("sequence model", model),
            ClassificationDecoder::default(),
            ClassificationMetrics::new(),
        ))
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

        let (normalized, run) = match self.inner.model.get() {
            Ok(model) => {
                let normalized = model.tokenizer.normalize(text);
                let run = self.run(model, text);
                (normalized, run)
            }
            Err(reason) => (text.to_lowercase(), Err(reason)),
        };

        finish(VARIANT, started, normalized, run)
    }

    fn run(
        &self,
        model: &SequenceModel,
        text: &str,
    ) -> std::result::Result<ClassificationResult, DegradedReason> {
        let sequence = model.tokenizer.tokenize(text);
        tracing::debug!(
            attended = sequence.attended(),
            ids = ?&sequence.input_ids[..sequence.attended().min(20)],
            "tokenized message"
        );

        let backend = model.backend.backend();
        let raw = model
            .backend
            .call(|b| b.run(&sequence.input_ids, &sequence.attention_mask))
            .map_err(|e| DegradedReason::InferenceFailed(e.to_string()))?;
        validate_output(&raw, &model.labels)?;

        let params = backend.output_quantization();
        if params.all_at_zero_point(&raw) {
            tracing::warn!(
                "Model {} returned only the zero point ({}); output may not be written",
                backend.name(),
                params.zero_point
            );
        }

        let logits = params.dequantize_slice(&raw);
        tracing::debug!(?raw, ?logits, "sequence model output");

        Ok(self.inner.decoder.decode(&logits, &model.labels))
    }
}

#[async_trait]
impl SmsClassifier for SequenceClassifier {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantization::QuantParams;
    use crate::wordpiece::MAX_SEQUENCE_LENGTH;
    use smsclass_core::labels::{CREDIT_TRANSACTION, OTHER};
    use smsclass_core::Error;

    /// Echoes the number of attended positions into the credit logit
    struct LengthEcho;

    impl SequenceBackend for LengthEcho {
        fn name(&self) -> &str {
            "length-echo"
        }

        fn output_quantization(&self) -> QuantParams {
            QuantParams::new(0.5, -10)
        }

        fn run(
            &self,
            _input_ids: &[i32; MAX_SEQUENCE_LENGTH],
            attention_mask: &[i32; MAX_SEQUENCE_LENGTH],
        ) -> Result<Vec<i8>> {
            let attended: i32 = attention_mask.iter().sum();
            Ok(vec![-10, -10 + attended as i8, -10, -10, -10])
        }
    }

    struct Broken;

    impl SequenceBackend for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn output_quantization(&self) -> QuantParams {
            QuantParams::identity()
        }

        fn run(
            &self,
            _input_ids: &[i32; MAX_SEQUENCE_LENGTH],
            _attention_mask: &[i32; MAX_SEQUENCE_LENGTH],
        ) -> Result<Vec<i8>> {
            Err(Error::backend("interpreter closed"))
        }
    }

    fn vocab() -> Arc<Vocabulary> {
        let mut tokens: Vec<String> = (0..103).map(|i| format!("[unused{}]", i)).collect();
        tokens[0] = "[PAD]".into();
        tokens[100] = "[UNK]".into();
        tokens[101] = "[CLS]".into();
        tokens[102] = "[SEP]".into();
        tokens.extend(["credited", "to", "account"].map(String::from));
        Arc::new(Vocabulary::from_tokens(tokens))
    }

    #[test]
    fn test_classifies_through_backend() {
        let classifier =
            SequenceClassifier::from_backend(Arc::new(LengthEcho), vocab(), LabelTable::sms_default())
                .unwrap();

        // [CLS] credited to account [SEP] -> 5 attended -> credit logit 2.5
        let outcome = classifier.classify_blocking("  Credited TO   account ");
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.label(), CREDIT_TRANSACTION);
        assert!(outcome.is_actionable());
        assert_eq!(outcome.result().cleaned_text, "credited to account");
    }

    #[test]
    fn test_backend_error_falls_back() {
        let classifier =
            SequenceClassifier::from_backend(Arc::new(Broken), vocab(), LabelTable::sms_default())
                .unwrap();

        let outcome = classifier.classify_blocking("credited");
        assert!(matches!(
            outcome.degraded_reason(),
            Some(DegradedReason::InferenceFailed(msg)) if msg.contains("interpreter closed")
        ));
        assert_eq!(outcome.label(), OTHER);
        assert_eq!(outcome.confidence(), 0.0);
        assert!(outcome.result().probabilities.is_empty());
    }

    struct Panicking;

    impl SequenceBackend for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn output_quantization(&self) -> QuantParams {
            QuantParams::identity()
        }

        fn run(
            &self,
            _input_ids: &[i32; MAX_SEQUENCE_LENGTH],
            _attention_mask: &[i32; MAX_SEQUENCE_LENGTH],
        ) -> Result<Vec<i8>> {
            panic!("delegate aborted");
        }
    }

    #[tokio::test]
    async fn test_backend_panic_degrades() {
        let classifier =
            SequenceClassifier::from_backend(Arc::new(Panicking), vocab(), LabelTable::sms_default())
                .unwrap();

        let outcome = classifier.classify("credited to account").await;
        assert!(matches!(
            outcome.degraded_reason(),
            Some(DegradedReason::InferenceFailed(msg)) if msg.contains("delegate aborted")
        ));
        assert_eq!(outcome.label(), OTHER);
        assert_eq!(classifier.metrics().snapshot().total, 1);
    }

    #[test]
    fn test_not_ready_falls_back() {
        let classifier = SequenceClassifier::new(
            LazyResource::failed("sequence model", "vocab.txt missing"),
            ClassificationDecoder::default(),
            ClassificationMetrics::new(),
        );

        let outcome = classifier.classify_blocking("Credited");
        assert!(outcome.is_degraded());
        assert!(!classifier.is_ready());
        assert_eq!(classifier.metrics().snapshot().skipped_inference_failed, 1);
    }
}
