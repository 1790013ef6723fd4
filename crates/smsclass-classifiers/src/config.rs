//! Classifier configuration (YAML)

use crate::backend::{BackendOptions, DeviceSpec};
use crate::decoder::{ClassificationDecoder, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::resources::ResourceSource;
use serde::{Deserialize, Serialize};
use smsclass_core::labels::TRANSACTION_LABELS;
use smsclass_core::{Error, Result};
use std::path::Path;

/// Configuration for both classifiers and their shared resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// WordPiece vocabulary for the sequence classifier
    #[serde(default)]
    pub vocabulary: Option<ResourceSource>,

    /// `id2label` mapping; the built-in SMS table when absent
    #[serde(default)]
    pub label_mapping: Option<ResourceSource>,

    /// Hashed-feature model
    #[serde(default)]
    pub hashing: Option<ModelSettings>,

    /// Token-sequence model
    #[serde(default)]
    pub sequence: Option<ModelSettings>,

    /// Labels that may be flagged actionable
    #[serde(default = "default_actionable_labels")]
    pub actionable_labels: Vec<String>,

    /// Device for model backends
    #[serde(default)]
    pub device: DeviceSpec,
}

/// One model and its decision threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: ResourceSource,

    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl ModelSettings {
    pub fn new(model: ResourceSource) -> Self {
        Self {
            model,
            threshold: default_threshold(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            vocabulary: None,
            label_mapping: None,
            hashing: None,
            sequence: None,
            actionable_labels: default_actionable_labels(),
            device: DeviceSpec::Cpu,
        }
    }
}

impl ClassifierConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Invalid classifier config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        for (name, settings) in [("hashing", &self.hashing), ("sequence", &self.sequence)] {
            if let Some(settings) = settings {
                if !(0.0..=1.0).contains(&settings.threshold) {
                    return Err(Error::config(format!(
                        "{} threshold must be within [0, 1], got {}",
                        name, settings.threshold
                    )));
                }
            }
        }

        if self.sequence.is_some() && self.vocabulary.is_none() {
            return Err(Error::config(
                "sequence model configured without a vocabulary",
            ));
        }

        Ok(())
    }

    /// Decoder for a model's threshold and the shared actionable set
    pub fn decoder(&self, settings: &ModelSettings) -> ClassificationDecoder {
        ClassificationDecoder::new(settings.threshold, self.actionable_labels.iter().cloned())
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            device: self.device,
        }
    }
}

fn default_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_actionable_labels() -> Vec<String> {
    TRANSACTION_LABELS.iter().map(|l| l.to_string()).collect()
}
