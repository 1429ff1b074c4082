//! Voice embedding extraction and aggregation.
//!
//! One speaker's scattered utterances become a single normalized d-vector:
//! per-segment embeddings from an encoder model, averaged and scaled to
//! unit norm for downstream cosine comparison.

mod aggregate;
mod encoder;

pub use aggregate::{aggregate_embeddings, AggregatedEmbedding};
pub use encoder::{MockEncoder, OnnxEncoder, VoiceEncoder};

use std::path::PathBuf;
use thiserror::Error;

/// Embedding dimension produced by the default encoder models.
pub const EMBEDDING_DIM: usize = 256;

/// Errors from encoder setup or speaker-level aggregation.
///
/// Segment-scoped encoder failures never escape the aggregator; what
/// surfaces here is fatal for one speaker at most.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("encoder inference failed: {0}")]
    Inference(String),

    #[error("failed to load encoder model: {0}")]
    ModelLoad(String),

    #[error("encoder model not found at path: {0}")]
    ModelNotFound(PathBuf),

    #[error("this build does not include the onnx encoder (rebuild with --features onnx)")]
    FeatureNotEnabled,
}

/// L2-normalize a vector in place.
///
/// The all-zero vector is left unchanged; scaling it to unit norm is
/// undefined.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Compute cosine similarity between two L2-normalized vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same length");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Element-wise arithmetic mean of a set of vectors.
///
/// All vectors must share the first vector's dimension. An empty set yields
/// an empty vector.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Result<Vec<f32>, EmbedError> {
    let Some(first) = vectors.first() else {
        return Ok(Vec::new());
    };
    let expected = first.len();
    let mut mean = vec![0.0f32; expected];
    for v in vectors {
        if v.len() != expected {
            return Err(EmbedError::DimensionMismatch {
                expected,
                got: v.len(),
            });
        }
        for (m, x) in mean.iter_mut().zip(v.iter()) {
            *m += x;
        }
    }
    let count = vectors.len() as f32;
    for m in mean.iter_mut() {
        *m /= count;
    }
    Ok(mean)
}
