//! Ordered category labels
//!
//! The position of each label is the contract with the model's output tensor:
//! index `i` of the logits always belongs to `labels[i]`. Tables are never
//! reordered after construction.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Debit (money out) transaction notification
pub const DEBIT_TRANSACTION: &str = "debit_transaction";

/// Credit (money in) transaction notification
pub const CREDIT_TRANSACTION: &str = "credit_transaction";

/// One-time passcode
pub const OTP: &str = "otp";

/// Promotional message
pub const PROMO: &str = "promo";

/// Catch-all category, also reported when the pipeline is unavailable
pub const OTHER: &str = "other";

/// Labels that drive transaction bookkeeping downstream
pub const TRANSACTION_LABELS: [&str; 2] = [DEBIT_TRANSACTION, CREDIT_TRANSACTION];

/// Immutable, ordered list of category names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Arc<[String]>,
}

#[derive(Debug, Deserialize)]
struct LabelMappingFile {
    id2label: BTreeMap<String, String>,
}

impl LabelTable {
    /// Create a table from labels in model output order
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();

        if labels.is_empty() {
            return Err(Error::config("label table must contain at least one label"));
        }

        for (idx, label) in labels.iter().enumerate() {
            if labels[..idx].contains(label) {
                return Err(Error::config(format!("duplicate label '{}' at index {}", label, idx)));
            }
        }

        Ok(Self {
            labels: labels.into(),
        })
    }

    /// The five SMS categories in the order the trained models emit them
    pub fn sms_default() -> Self {
        Self {
            labels: [DEBIT_TRANSACTION, CREDIT_TRANSACTION, OTP, PROMO, OTHER]
                .iter()
                .map(|l| l.to_string())
                .collect(),
        }
    }

    /// Parse a `{"id2label": {"0": "...", ...}}` mapping
    ///
    /// Ids must be dense from 0 to N-1.
    pub fn from_id2label_json(json: &str) -> Result<Self> {
        let mapping: LabelMappingFile = serde_json::from_str(json)?;

        let mut by_id = BTreeMap::new();
        for (key, label) in mapping.id2label {
            let id: usize = key.trim().parse().map_err(|_| {
                Error::resource(format!("label id '{}' is not a non-negative integer", key))
            })?;
            by_id.insert(id, label);
        }

        for (expected, id) in by_id.keys().enumerate() {
            if *id != expected {
                return Err(Error::resource(format!(
                    "label ids must be dense from 0, missing id {}",
                    expected
                )));
            }
        }

        Self::new(by_id.into_values())
    }

    /// Load a label mapping file from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::resource(format!(
                "failed to read label mapping {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let table = Self::from_id2label_json(&content)?;
        tracing::info!(
            "Loaded {} labels from {}",
            table.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// Label at the given model output index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Output index of the given label
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a constructed table
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in output order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::sms_default()
    }
}
