//! WordPiece tokenizer producing fixed-length model inputs
//!
//! Sequences are always `MAX_SEQUENCE_LENGTH` ids:
//! `[CLS] pieces... [SEP] [PAD]...` with a parallel attention mask.

use crate::vocabulary::{SpecialTokens, Vocabulary};
use regex::Regex;
use smsclass_core::{Error, Result};
use std::sync::Arc;

/// Fixed input length of the sequence model
pub const MAX_SEQUENCE_LENGTH: usize = 128;

// Ids in use before another word is started; one slot stays free for [SEP]
const WORD_LIMIT: usize = MAX_SEQUENCE_LENGTH - 1;

/// Continuation-piece prefix
const CONTINUATION: &str = "##";

/// Token ids and attention mask for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSequence {
    pub input_ids: [i32; MAX_SEQUENCE_LENGTH],
    pub attention_mask: [i32; MAX_SEQUENCE_LENGTH],
}

impl TokenSequence {
    /// Number of positions attended to
    pub fn attended(&self) -> usize {
        self.attention_mask.iter().filter(|m| **m == 1).count()
    }

    /// Ids up to and including the last attended position
    pub fn active_ids(&self) -> &[i32] {
        let end = self
            .attention_mask
            .iter()
            .rposition(|m| *m == 1)
            .map_or(0, |i| i + 1);
        &self.input_ids[..end]
    }
}

/// Greedy longest-match-first WordPiece tokenizer
#[derive(Debug, Clone)]
pub struct WordPieceTokenizer {
    vocab: Arc<Vocabulary>,
    special: SpecialTokens,
    whitespace: Regex,
}

impl WordPieceTokenizer {
    /// Build over a vocabulary; `[CLS]` and `[SEP]` must resolve to distinct ids
    pub fn new(vocab: Arc<Vocabulary>) -> Result<Self> {
        let special = vocab.special_tokens();
        if special.cls == special.sep {
            return Err(Error::tokenizer(format!(
                "[CLS] and [SEP] both resolve to id {}",
                special.cls
            )));
        }

        let whitespace = Regex::new(r"\s+")
            .map_err(|e| Error::tokenizer(format!("Failed to compile whitespace regex: {}", e)))?;

        Ok(Self {
            special,
            vocab,
            whitespace,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Lowercase, trim and collapse whitespace
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        self.whitespace
            .replace_all(lowered.trim(), " ")
            .into_owned()
    }

    /// Tokenize a message into a padded sequence. Never fails.
    pub fn tokenize(&self, text: &str) -> TokenSequence {
        let normalized = self.normalize(text);
        let mut ids: Vec<i32> = Vec::with_capacity(MAX_SEQUENCE_LENGTH);
        ids.push(self.special.cls);

        for word in normalized.split(' ').filter(|w| !w.is_empty()) {
            if ids.len() >= WORD_LIMIT {
                break;
            }

            if let Some(id) = self.vocab.get(word) {
                ids.push(id);
                continue;
            }

            ids.extend(self.word_pieces(word));
            if ids.len() >= WORD_LIMIT {
                // the word overflowed; drop back below the limit and stop
                while ids.len() >= WORD_LIMIT {
                    ids.pop();
                }
                break;
            }
        }

        if ids.len() < MAX_SEQUENCE_LENGTH {
            ids.push(self.special.sep);
        }
        let sep_position = ids.len() - 1;

        let mut input_ids = [self.special.pad; MAX_SEQUENCE_LENGTH];
        input_ids[..ids.len()].copy_from_slice(&ids);

        let mut attention_mask = [0i32; MAX_SEQUENCE_LENGTH];
        for (mask, id) in attention_mask.iter_mut().zip(input_ids.iter()) {
            *mask = i32::from(*id != self.special.pad);
        }
        attention_mask[0] = 1;
        attention_mask[sep_position] = 1;

        self.check_range(&input_ids);

        TokenSequence {
            input_ids,
            attention_mask,
        }
    }

    /// Split one word into vocabulary pieces
    ///
    /// Pieces found before an unmatched remainder are kept, followed by a
    /// single `[UNK]`.
    pub fn word_pieces(&self, word: &str) -> Vec<i32> {
        if word.is_empty() {
            return vec![self.special.unk];
        }
        if let Some(id) = self.vocab.get(word) {
            return vec![id];
        }

        let chars: Vec<char> = word.chars().collect();
        let mut pieces = Vec::new();
        let mut candidate = String::with_capacity(word.len() + CONTINUATION.len());
        let mut start = 0;

        while start < chars.len() {
            let mut end = chars.len();
            let mut matched = None;

            while start < end {
                candidate.clear();
                if start > 0 {
                    candidate.push_str(CONTINUATION);
                }
                candidate.extend(&chars[start..end]);

                if let Some(id) = self.vocab.get(&candidate) {
                    matched = Some(id);
                    break;
                }
                end -= 1;
            }

            match matched {
                Some(id) => {
                    pieces.push(id);
                    start = end;
                }
                None => {
                    pieces.push(self.special.unk);
                    break;
                }
            }
        }

        pieces
    }

    fn check_range(&self, ids: &[i32]) {
        let size = self.vocab.len();
        let out_of_range = ids
            .iter()
            .filter(|id| **id < 0 || **id as usize >= size)
            .count();

        if out_of_range > 0 {
            tracing::warn!(
                "{} token ids fall outside the vocabulary of {} entries",
                out_of_range,
                size
            );
        }
    }
}
