//! Typed failures of a grouping run.
//!
//! The clusterer never returns partial output: any of these aborts the
//! whole call.

use thiserror::Error;

/// Errors returned by [`group_similar_texts`](crate::cluster::group_similar_texts)
/// and [`cosine_similarity`](crate::embedding::cosine_similarity).
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The embedding provider failed (network, service, or configuration fault).
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(#[source] anyhow::Error),

    /// The provider returned vectors that cannot be compared.
    #[error("embedding shape error: {0}")]
    EmbeddingShape(#[from] ShapeError),

    /// The similarity threshold is NaN or infinite.
    #[error("invalid similarity threshold: {0}")]
    InvalidThreshold(f32),

    /// `max_groups` is above the padding limit.
    #[error("max_groups {requested} exceeds the limit of {limit}")]
    MaxGroupsTooLarge { requested: usize, limit: usize },
}

/// Malformed embedding output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("expected {expected} embeddings, provider returned {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding {index} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("embedding {index} is empty")]
    Empty { index: usize },

    #[error("embedding {index} has zero magnitude")]
    ZeroVector { index: usize },

    #[error("embedding {index} contains a non-finite component")]
    NonFinite { index: usize },
}

impl ClusterError {
    /// Short machine-readable tag, used in error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterError::EmbeddingProvider(_) => "EmbeddingProviderError",
            ClusterError::EmbeddingShape(_) => "EmbeddingShapeError",
            ClusterError::InvalidThreshold(_) => "InvalidThreshold",
            ClusterError::MaxGroupsTooLarge { .. } => "MaxGroupsTooLarge",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_converts() {
        let err: ClusterError = ShapeError::ZeroVector { index: 2 }.into();
        assert_eq!(err.kind(), "EmbeddingShapeError");
        assert!(err.to_string().contains("zero magnitude"));
    }

    #[test]
    fn test_provider_error_keeps_source() {
        let err = ClusterError::EmbeddingProvider(anyhow::anyhow!("connection refused"));
        assert_eq!(err.kind(), "EmbeddingProviderError");
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
