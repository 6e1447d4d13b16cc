//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus the similarity function used by the clusterer.
//!
//! Concrete provider implementations (OpenAI, Ollama, Bedrock, fastembed)
//! live in the `question-clusters` app crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::ShapeError;

/// Trait for embedding providers.
///
/// Implementations are constructed by the application and passed into
/// [`group_similar_texts`](crate::cluster::group_similar_texts).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    ///
    /// `0` means the dimensionality is not known up front and is not checked.
    fn dims(&self) -> usize;

    /// Embed a batch of texts.
    ///
    /// Must return exactly one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Incomparable inputs are errors rather than a silent `0.0` or `NaN`. In
/// the returned [`ShapeError`], `index` is `0` for `a` and `1` for `b`.
///
/// ```rust
/// use question_clusters_core::embedding::cosine_similarity;
///
/// let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
/// assert!((sim - 1.0).abs() < 1e-6);
/// assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).is_err());
/// ```
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, ShapeError> {
    if a.len() != b.len() {
        return Err(ShapeError::DimensionMismatch {
            index: 1,
            expected: a.len(),
            actual: b.len(),
        });
    }
    if a.is_empty() {
        return Err(ShapeError::Empty { index: 0 });
    }

    if let Some(index) = [a, b].iter().position(|v| !all_finite(v)) {
        return Err(ShapeError::NonFinite { index });
    }

    // Squares of finite f32 components cannot overflow or underflow in f64.
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 {
        return Err(ShapeError::ZeroVector { index: 0 });
    }
    if norm_b == 0.0 {
        return Err(ShapeError::ZeroVector { index: 1 });
    }

    // Rounding can push parallel vectors just past ±1.
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32)
}

fn all_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Squared magnitude, accumulated in `f64`.
fn norm_squared(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum()
}

/// Check a provider response before any pairwise comparison.
///
/// Every vector must be non-empty, finite, non-zero, and share one
/// dimensionality; `dims` (when non-zero) pins that dimensionality.
pub fn check_embeddings(
    embeddings: &[Vec<f32>],
    expected_count: usize,
    dims: usize,
) -> Result<(), ShapeError> {
    if embeddings.len() != expected_count {
        return Err(ShapeError::CountMismatch {
            expected: expected_count,
            actual: embeddings.len(),
        });
    }

    let expected_dims = match (dims, embeddings.first()) {
        (0, Some(first)) => first.len(),
        (0, None) => return Ok(()),
        (d, _) => d,
    };

    for (index, vec) in embeddings.iter().enumerate() {
        if vec.is_empty() {
            return Err(ShapeError::Empty { index });
        }
        if vec.len() != expected_dims {
            return Err(ShapeError::DimensionMismatch {
                index,
                expected: expected_dims,
                actual: vec.len(),
            });
        }
        if !all_finite(vec) {
            return Err(ShapeError::NonFinite { index });
        }
        if norm_squared(vec) == 0.0 {
            return Err(ShapeError::ZeroVector { index });
        }
    }

    Ok(())
}
