//! smsclass Core
//!
//! Core types shared across the smsclass components.
//!
//! This crate provides:
//! - The error type and `Result` alias used by every pipeline stage
//! - The ordered label table that mirrors the model's output layout
//! - Classification results and the tagged outcome returned to callers

pub mod error;
pub mod labels;
pub mod types;

pub use error::{Error, Result};
pub use labels::LabelTable;
pub use types::{ClassificationOutcome, ClassificationResult, DegradedReason};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::labels::LabelTable;
    pub use crate::types::{ClassificationOutcome, ClassificationResult, DegradedReason};
}
