//! Classifier registry: builds both classifiers over shared lazy resources

use crate::backend::BackendLoader;
use crate::classifier::SmsClassifier;
use crate::config::ClassifierConfig;
use crate::hashing_classifier::{HashingClassifier, HashingModel};
use crate::metrics::ClassificationMetrics;
use crate::resources::{LazyResource, ResourceSource};
use crate::sequence_classifier::{SequenceClassifier, SequenceModel};
use crate::vocabulary::Vocabulary;
use smsclass_core::{ClassificationOutcome, DegradedReason, Error, LabelTable, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Owner of the configured classifiers
///
/// The label table and vocabulary are each loaded once and shared by both
/// classifiers; model files load on first use.
pub struct ClassifierRegistry {
    config: ClassifierConfig,
    hashing: Option<HashingClassifier>,
    sequence: Option<SequenceClassifier>,
    metrics: ClassificationMetrics,
}

impl ClassifierRegistry {
    /// Build the classifiers named in `config`
    pub fn new(config: ClassifierConfig, loader: Arc<dyn BackendLoader>) -> Result<Self> {
        config.validate()?;
        let metrics = ClassificationMetrics::new();

        let labels = Arc::new(label_resource(config.label_mapping.clone()));

        let hashing = match &config.hashing {
            Some(settings) => {
                let model = hashing_resource(
                    settings.model.clone(),
                    labels.clone(),
                    loader.clone(),
                    &config,
                );
                Some(HashingClassifier::new(
                    model,
                    config.decoder(settings),
                    metrics.clone(),
                )?)
            }
            None => None,
        };

        let sequence = match (&config.sequence, &config.vocabulary) {
            (Some(settings), Some(vocabulary)) => {
                let vocab = Arc::new(vocabulary_resource(vocabulary.clone()));
                let model = sequence_resource(
                    settings.model.clone(),
                    vocab,
                    labels.clone(),
                    loader.clone(),
                    &config,
                );
                Some(SequenceClassifier::new(
                    model,
                    config.decoder(settings),
                    metrics.clone(),
                ))
            }
            _ => None,
        };

        info!(
            "Configured classifiers: hashing={}, sequence={}",
            hashing.is_some(),
            sequence.is_some()
        );

        Ok(Self {
            config,
            hashing,
            sequence,
            metrics,
        })
    }

    /// Load registry from configuration file
    pub fn from_file(path: impl AsRef<Path>, loader: Arc<dyn BackendLoader>) -> Result<Self> {
        let config = ClassifierConfig::from_file(path)?;
        Self::new(config, loader)
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn hashing(&self) -> Option<&HashingClassifier> {
        self.hashing.as_ref()
    }

    pub fn sequence(&self) -> Option<&SequenceClassifier> {
        self.sequence.as_ref()
    }

    /// Metrics shared by every classifier in the registry
    pub fn metrics(&self) -> &ClassificationMetrics {
        &self.metrics
    }

    /// Get a classifier by name (`hashing` or `sequence`)
    pub fn get(&self, name: &str) -> Option<Arc<dyn SmsClassifier>> {
        match name {
            "hashing" => self
                .hashing
                .clone()
                .map(|c| Arc::new(c) as Arc<dyn SmsClassifier>),
            "sequence" => self
                .sequence
                .clone()
                .map(|c| Arc::new(c) as Arc<dyn SmsClassifier>),
            _ => None,
        }
    }

    /// Get all configured classifier names
    pub fn classifier_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.sequence.is_some() {
            names.push("sequence");
        }
        if self.hashing.is_some() {
            names.push("hashing");
        }
        names
    }

    /// Load every resource now instead of on the first message
    ///
    /// Returns the names of classifiers that are ready.
    pub async fn warm_up(&self) -> Vec<&'static str> {
        let mut ready = Vec::new();

        if let Some(sequence) = &self.sequence {
            let classifier = sequence.clone();
            if tokio::task::spawn_blocking(move || classifier.is_ready())
                .await
                .unwrap_or(false)
            {
                ready.push("sequence");
            } else {
                warn!("Sequence classifier not ready");
            }
        }

        if let Some(hashing) = &self.hashing {
            let classifier = hashing.clone();
            if tokio::task::spawn_blocking(move || classifier.is_ready())
                .await
                .unwrap_or(false)
            {
                ready.push("hashing");
            } else {
                warn!("Hashing classifier not ready");
            }
        }

        ready
    }

    /// Classify with the sequence model, falling back to the hashing model
    /// when the former is degraded
    ///
    /// Exactly one outcome is recorded per message: the one returned.
    pub async fn classify(&self, text: &str) -> ClassificationOutcome {
        let started = Instant::now();
        let (variant, outcome) = self.evaluate(text).await;
        self.metrics
            .record(variant, &outcome, started.elapsed().as_micros() as u64);
        outcome
    }

    async fn evaluate(&self, text: &str) -> (&'static str, ClassificationOutcome) {
        if let Some(sequence) = &self.sequence {
            let primary = sequence.evaluate(text).await;
            return match (&primary, &self.hashing) {
                (ClassificationOutcome::Degraded { reason, .. }, Some(hashing)) => {
                    warn!("Sequence classifier degraded ({}), using hashing classifier", reason);
                    ("hashing", hashing.evaluate(text).await)
                }
                _ => ("sequence", primary),
            };
        }

        match &self.hashing {
            Some(hashing) => ("hashing", hashing.evaluate(text).await),
            None => (
                "none",
                ClassificationOutcome::degraded(DegradedReason::NotReady(
                    "no classifier configured".to_string(),
                )),
            ),
        }
    }

    /// Classify many messages, preserving order
    pub async fn classify_batch(&self, texts: &[String]) -> Vec<ClassificationOutcome> {
        futures::future::join_all(texts.iter().map(|text| self.classify(text))).await
    }
}

fn label_resource(source: Option<ResourceSource>) -> LazyResource<LabelTable> {
    match source {
        Some(source) => LazyResource::new("label mapping", move || {
            let path = source.resolve()?;
            LabelTable::from_file(path)
        }),
        None => LazyResource::ready("label mapping", LabelTable::sms_default()),
    }
}

fn vocabulary_resource(source: ResourceSource) -> LazyResource<Arc<Vocabulary>> {
    LazyResource::new("vocabulary", move || {
        let path = source.resolve()?;
        Ok(Arc::new(Vocabulary::from_file(path)?))
    })
}

fn shared<T: Clone>(resource: &LazyResource<T>) -> Result<T> {
    resource
        .get()
        .cloned()
        .map_err(|reason| Error::resource(format!("{}: {}", resource.name(), reason)))
}

fn hashing_resource(
    source: ResourceSource,
    labels: Arc<LazyResource<LabelTable>>,
    loader: Arc<dyn BackendLoader>,
    config: &ClassifierConfig,
) -> LazyResource<HashingModel> {
    let options = config.backend_options();
    LazyResource::new("hashing model", move || {
        let labels = shared(&labels)?;
        let path = source.resolve()?;
        let backend = loader.load_hashed(&path, &options)?;
        info!("Loaded hashing model {} from {}", backend.name(), source);
        HashingModel::new(backend, labels)
    })
}

fn sequence_resource(
    source: ResourceSource,
    vocab: Arc<LazyResource<Arc<Vocabulary>>>,
    labels: Arc<LazyResource<LabelTable>>,
    loader: Arc<dyn BackendLoader>,
    config: &ClassifierConfig,
) -> LazyResource<SequenceModel> {
    let options = config.backend_options();
    LazyResource::new("sequence model", move || {
        let vocab = shared(&vocab)?;
        let labels = shared(&labels)?;
        let path = source.resolve()?;
        let backend = loader.load_sequence(&path, &options)?;
        info!("Loaded sequence model {} from {}", backend.name(), source);
        SequenceModel::new(backend, vocab, labels)
    })
}
