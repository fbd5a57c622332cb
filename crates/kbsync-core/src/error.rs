//! Matchable error conditions.
//!
//! Most failures travel as [`anyhow::Error`]. The variants here are the
//! ones callers need to tell apart, recovered with
//! `err.downcast_ref::<SyncError>()`.

use thiserror::Error;

use crate::models::StoreId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    #[error("store {0} not found")]
    StoreNotFound(StoreId),

    #[error("unsupported store type: '{0}'")]
    UnsupportedStoreType(String),

    #[error("invalid repository coordinate '{0}', expected 'owner/repo'")]
    InvalidCoordinate(String),

    #[error("invalid embedding dimension: got {got}, want {want}")]
    EmbeddingDimension { got: usize, want: usize },

    #[error("invalid embedding value at position {index}: {value}")]
    NonFiniteEmbedding { index: usize, value: f32 },

    #[error("text too long for embedding: {chars} chars (max {max} chars)")]
    InputTooLong { chars: usize, max: usize },

    #[error("skipping binary file: {0}")]
    BinaryContent(String),
}

