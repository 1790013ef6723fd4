//! SMS text normalization
//!
//! Rules run in a fixed order on lowercased text. The hashing model was
//! trained on text produced by exactly this sequence, so any change to the
//! order or to a pattern moves n-grams into different buckets.
//!
//! 1. Lowercase (placeholder tags keep their case, control characters become spaces)
//! 2. `₹` → `rs`, `xxxx` masked accounts → `xxxx<NUM>`
//! 3. URLs → `<URL>`
//! 4. `inr`, `rs.` → `rs`, repeated `rs rs` → `rs`
//! 5. Remaining masked accounts and numbers → `x<NUM>`, `<NUM>`
//! 6. Alphanumeric runs of 10+ characters → `<UTR>`
//! 7. Whitespace runs → single space, trimmed
//!
//! `₹` and `xxxx` masks are rewritten first because the text they produce
//! (letters, a word boundary after `>`) would otherwise only be seen by the
//! URL and currency rules on a second pass.

use regex::{NoExpand, Regex};
use smsclass_core::{Error, Result};

/// Placeholder tag for URLs
pub const URL_TAG: &str = "<URL>";

/// Placeholder tag for numbers
pub const NUM_TAG: &str = "<NUM>";

/// Placeholder tag for transaction references and other long ids
pub const UTR_TAG: &str = "<UTR>";

const RULES: &[(&str, &str)] = &[
    ("₹", "rs"),
    (r"x{4,}[0-9]+", "xxxx<NUM>"),
    // URLs
    (r"https?://\S+", URL_TAG),
    (r"www\.\S+", URL_TAG),
    (
        r"\b[a-z0-9][a-z0-9-]*\.(?:com|in|org|net|co|io|me|tv|app|dev)\S*",
        URL_TAG,
    ),
    // Currency
    (r"\binr\b", "rs"),
    (r"\brs\.\s*", "rs "),
    (r"\brs(?:\s+rs)+\b", "rs"),
    // Masked accounts, then numbers
    (r"\bx\s*[0-9]+\b", "x<NUM>"),
    (r"\b[0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]+)?\b", NUM_TAG),
    (r"\b[0-9]+(?:\.[0-9]+)?\b", NUM_TAG),
    // Long references
    (r"\b[a-z0-9]{10,}\b", UTR_TAG),
];

/// Ordered regex normalizer for raw SMS bodies
#[derive(Debug, Clone)]
pub struct TextCleaner {
    placeholder: Regex,
    rules: Vec<(Regex, &'static str)>,
    whitespace: Regex,
}

impl TextCleaner {
    /// Compile the cleaning rules
    pub fn new() -> Result<Self> {
        let rules = RULES
            .iter()
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|re| (re, *replacement))
                    .map_err(|e| {
                        Error::internal(format!("Failed to compile cleaning rule {}: {}", pattern, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            placeholder: Regex::new(r"<(?:URL|NUM|UTR)>")
                .map_err(|e| Error::internal(format!("Failed to compile tag regex: {}", e)))?,
            rules,
            whitespace: Regex::new(r"\s+")
                .map_err(|e| Error::internal(format!("Failed to compile whitespace regex: {}", e)))?,
        })
    }

    /// Clean an SMS body. Empty input yields an empty string.
    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut cleaned = self.lowercase(text);

        for (pattern, replacement) in &self.rules {
            cleaned = pattern
                .replace_all(&cleaned, NoExpand(*replacement))
                .into_owned();
        }

        self.whitespace
            .replace_all(&cleaned, " ")
            .trim()
            .to_string()
    }

    /// Clean a possibly missing body; `None` yields an empty string
    pub fn clean_optional(&self, text: Option<&str>) -> String {
        text.map(|t| self.clean(t)).unwrap_or_default()
    }

    fn lowercase(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for tag in self.placeholder.find_iter(text) {
            push_lowercase(&mut out, &text[last..tag.start()]);
            out.push_str(tag.as_str());
            last = tag.end();
        }
        push_lowercase(&mut out, &text[last..]);

        out
    }
}

fn push_lowercase(out: &mut String, segment: &str) {
    for c in segment.chars().flat_map(char::to_lowercase) {
        out.push(if c.is_control() { ' ' } else { c });
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new().expect("Failed to compile text cleaning rules")
    }
}
