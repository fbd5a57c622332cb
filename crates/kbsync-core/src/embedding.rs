//! Embedding trait and vector validation.
//!
//! Defines the [`Embedder`] trait that embedding backends implement, plus
//! the pure checks applied on either side of an embedding call: the input
//! size guard and the output vector validation.
//!
//! Concrete providers (OpenAI) live in the `kbsync` app crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::SyncError;

/// Input budget for a single embedding request, in characters.
///
/// Derived from the provider token limit at roughly four characters per
/// token.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 120_000;

/// Dimensionality of the vectors stored in the `documents` and `memories`
/// tables.
pub const DEFAULT_EMBEDDING_DIMS: usize = 1536;

/// A backend producing a fixed-length vector for a text blob.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Reject inputs longer than `max_chars` characters.
///
/// Oversized text fails fast instead of being truncated or sent upstream.
pub fn check_input_len(text: &str, max_chars: usize) -> Result<(), SyncError> {
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(SyncError::InputTooLong {
            chars,
            max: max_chars,
        });
    }
    Ok(())
}

/// Check a vector's dimensionality and that every component is finite.
pub fn validate_embedding(vector: &[f32], dims: usize) -> Result<(), SyncError> {
    if vector.len() != dims {
        return Err(SyncError::EmbeddingDimension {
            got: vector.len(),
            want: dims,
        });
    }
    if let Some((index, &value)) = vector.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(SyncError::NonFiniteEmbedding { index, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_within_budget() {
        assert!(check_input_len("hello", 5).is_ok());
    }

    #[test]
    fn test_input_budget_counts_chars_not_bytes() {
        // 3 chars, 9 bytes
        assert!(check_input_len("タグ!", 3).is_ok());
        assert_eq!(
            check_input_len("タグ!", 2),
            Err(SyncError::InputTooLong { chars: 3, max: 2 })
        );
    }

    #[test]
    fn test_validate_ok() {
        assert!(validate_embedding(&[0.1, -0.2, 0.3], 3).is_ok());
    }

    #[test]
    fn test_validate_wrong_dims() {
        assert_eq!(
            validate_embedding(&[0.1, 0.2], 3),
            Err(SyncError::EmbeddingDimension { got: 2, want: 3 })
        );
    }

    #[test]
    fn test_validate_nan_reports_index() {
        let err = validate_embedding(&[0.1, f32::NAN, 0.3], 3).unwrap_err();
        match err {
            SyncError::NonFiniteEmbedding { index, value } => {
                assert_eq!(index, 1);
                assert!(value.is_nan());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_infinity() {
        let err = validate_embedding(&[0.1, 0.2, f32::INFINITY], 3).unwrap_err();
        assert!(matches!(err, SyncError::NonFiniteEmbedding { index: 2, .. }));
    }
}
