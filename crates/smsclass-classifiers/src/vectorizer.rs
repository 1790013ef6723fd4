//! Hashing-trick feature vectorizer
//!
//! Unigrams and bigrams of cleaned text are hashed into a fixed 65,536-bucket
//! count vector. Configuration mirrors the training-time vectorizer:
//! - n_features: 65536
//! - ngram_range: (1, 2)
//! - no sign alternation, no normalization, no lowercasing (text is pre-cleaned)

use crate::hash::hash_str;
use regex::Regex;
use smsclass_core::{Error, Result};

/// Number of hashed feature buckets
pub const N_FEATURES: usize = 65_536;

const NGRAM_MIN: usize = 1;
const NGRAM_MAX: usize = 2;

/// Fixed-length vector of raw bucket counts
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    counts: Vec<f32>,
}

impl FeatureVector {
    fn zeros() -> Self {
        Self {
            counts: vec![0.0; N_FEATURES],
        }
    }

    /// Bucket counts, always `N_FEATURES` long
    pub fn as_slice(&self) -> &[f32] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count in a single bucket
    pub fn get(&self, bucket: usize) -> Option<f32> {
        self.counts.get(bucket).copied()
    }

    /// Non-zero buckets as `(index, count)` in index order
    pub fn nonzero(&self) -> Vec<(usize, f32)> {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != 0.0)
            .map(|(i, c)| (i, *c))
            .collect()
    }

    /// Total number of n-grams hashed into the vector
    pub fn total(&self) -> f32 {
        self.counts.iter().sum()
    }
}

/// Unigram + bigram hashing vectorizer
#[derive(Debug, Clone)]
pub struct HashingVectorizer {
    token_pattern: Regex,
}

impl HashingVectorizer {
    pub fn new() -> Result<Self> {
        // two or more word characters, the default scikit-learn token pattern
        let token_pattern = Regex::new(r"\b\w\w+\b")
            .map_err(|e| Error::internal(format!("Failed to compile token regex: {}", e)))?;
        Ok(Self { token_pattern })
    }

    /// Word tokens of `text`; single characters and punctuation are dropped
    pub fn tokens<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.token_pattern
            .find_iter(text)
            .map(|m| m.as_str())
            .collect()
    }

    /// All unigrams followed by all bigrams
    pub fn ngrams(&self, text: &str) -> Vec<String> {
        let words = self.tokens(text);
        let mut ngrams = Vec::new();

        for n in NGRAM_MIN..=NGRAM_MAX {
            for window in words.windows(n) {
                ngrams.push(window.join(" "));
            }
        }

        ngrams
    }

    /// Bucket index for one n-gram
    pub fn bucket(ngram: &str) -> usize {
        ((hash_str(ngram) & 0x7FFF_FFFF) as usize) % N_FEATURES
    }

    /// Transform cleaned text into its feature vector
    pub fn transform(&self, cleaned: &str) -> FeatureVector {
        let mut features = FeatureVector::zeros();

        for ngram in self.ngrams(cleaned) {
            features.counts[Self::bucket(&ngram)] += 1.0;
        }

        features
    }
}

impl Default for HashingVectorizer {
    fn default() -> Self {
        Self::new().expect("Failed to create hashing vectorizer")
    }
}
