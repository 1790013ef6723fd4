//! WordPiece vocabulary loading

use smsclass_core::{Error, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Padding token
pub const TOKEN_PAD: &str = "[PAD]";
/// Unknown-word token
pub const TOKEN_UNK: &str = "[UNK]";
/// Sequence start ("class") token
pub const TOKEN_CLS: &str = "[CLS]";
/// Separator token
pub const TOKEN_SEP: &str = "[SEP]";

// BERT uncased ids, used when the vocabulary file omits a special token
const DEFAULT_PAD_ID: i32 = 0;
const DEFAULT_UNK_ID: i32 = 100;
const DEFAULT_CLS_ID: i32 = 101;
const DEFAULT_SEP_ID: i32 = 102;

/// Resolved ids of the four special tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad: i32,
    pub unk: i32,
    pub cls: i32,
    pub sep: i32,
}

/// Ordered token → id table where line N of the source is id N
#[derive(Debug, Clone)]
pub struct Vocabulary {
    ids: HashMap<String, i32>,
    size: usize,
    special: SpecialTokens,
}

impl Vocabulary {
    /// Build from tokens in id order
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = HashMap::new();
        let mut size = 0;

        for (index, token) in tokens.into_iter().enumerate() {
            // a later duplicate line wins
            ids.insert(token.as_ref().trim().to_string(), index as i32);
            size = index + 1;
        }

        let lookup = |token: &str, fallback: i32| ids.get(token).copied().unwrap_or(fallback);
        let special = SpecialTokens {
            pad: lookup(TOKEN_PAD, DEFAULT_PAD_ID),
            unk: lookup(TOKEN_UNK, DEFAULT_UNK_ID),
            cls: lookup(TOKEN_CLS, DEFAULT_CLS_ID),
            sep: lookup(TOKEN_SEP, DEFAULT_SEP_ID),
        };

        Self { ids, size, special }
    }

    /// Read a line-oriented vocabulary
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let lines = reader.lines().collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self::from_tokens(lines))
    }

    /// Load a `vocab.txt` file
    ///
    /// An empty file loads: every word maps to `[UNK]` and the special tokens
    /// take their fallback ids.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            Error::resource(format!("Failed to open vocabulary {}: {}", path.display(), e))
        })?;

        let vocab = Self::from_reader(std::io::BufReader::new(file))?;
        if vocab.is_empty() {
            tracing::warn!(
                "Vocabulary {} is empty; every word will tokenize to [UNK]",
                path.display()
            );
        }

        tracing::info!("Loaded vocabulary: {} tokens from {}", vocab.len(), path.display());
        Ok(vocab)
    }

    /// Id of an exact token
    pub fn get(&self, token: &str) -> Option<i32> {
        self.ids.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    /// Number of lines read, i.e. one past the largest id
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.special
    }
}
