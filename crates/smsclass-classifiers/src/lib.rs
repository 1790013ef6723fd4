//! smsclass Classifiers
//!
//! Preprocessing, encoding and decoding for SMS category classification.
//!
//! Two classifiers share the same decoder and label table:
//! - Hashing: cleaned text → 65,536 hashed unigram/bigram counts → INT8 model
//! - Sequence: WordPiece ids + attention mask (128 positions) → INT8 model
//!
//! The model runtime sits behind the [`backend`] traits; when it cannot be
//! loaded or fails, classification degrades to a fixed fallback instead of
//! returning an error.

pub mod backend;
pub mod classifier;
pub mod cleaner;
pub mod config;
pub mod decoder;
pub mod hash;
pub mod hashing_classifier;
pub mod metrics;
pub mod quantization;
pub mod registry;
pub mod resources;
pub mod sequence_classifier;
pub mod vectorizer;
pub mod vocabulary;
pub mod wordpiece;

pub use backend::{
    BackendGate, BackendLoader, BackendOptions, DeviceSpec, HashedFeatureBackend, SequenceBackend,
};
pub use classifier::SmsClassifier;
pub use cleaner::TextCleaner;
pub use config::{ClassifierConfig, ModelSettings};
pub use decoder::{ClassificationDecoder, DEFAULT_CONFIDENCE_THRESHOLD};
pub use hash::{hash32, hash_str};
pub use hashing_classifier::{HashingClassifier, HashingModel};
pub use metrics::{ClassificationMetrics, MetricsSnapshot, SkipReason};
pub use quantization::{QuantParams, TensorQuantization};
pub use registry::ClassifierRegistry;
pub use resources::{LazyResource, ResourceSource};
pub use sequence_classifier::{SequenceClassifier, SequenceModel};
pub use vectorizer::{FeatureVector, HashingVectorizer, N_FEATURES};
pub use vocabulary::{SpecialTokens, Vocabulary};
pub use wordpiece::{TokenSequence, WordPieceTokenizer, MAX_SEQUENCE_LENGTH};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::SmsClassifier;
    pub use crate::cleaner::TextCleaner;
    pub use crate::hashing_classifier::HashingClassifier;
    pub use crate::registry::ClassifierRegistry;
    pub use crate::sequence_classifier::SequenceClassifier;
    pub use crate::vectorizer::HashingVectorizer;
    pub use crate::wordpiece::WordPieceTokenizer;
    pub use smsclass_core::prelude::*;
}
