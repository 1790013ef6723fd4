//! Candle inference backends for `smsclass-classifiers`.
//!
//! This crate provides a safetensors-backed implementation of
//! `BackendLoader` that can be handed to
//! `smsclass_classifiers::ClassifierRegistry::new`.

pub mod candle_backend;

pub use candle_backend::{CandleBackendLoader, LinearHashingBackend, PooledSequenceBackend};
