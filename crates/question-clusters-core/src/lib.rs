//! # Question Clusters Core
//!
//! Pure grouping logic for question-clusters: text normalization, the
//! embedding provider trait, cosine similarity, and the seed-linkage
//! clustering routine.
//!
//! This crate contains no tokio runtime, HTTP client, filesystem I/O, or
//! configuration parsing. Concrete embedding providers and the `qc` CLI
//! live in the `question-clusters` app crate.
//!
//! ## Pipeline
//!
//! ```text
//! raw texts ──▶ normalize ──▶ embed (provider) ──▶ cosine vs seed ──▶ groups
//! ```

pub mod cluster;
pub mod embedding;
pub mod error;
pub mod normalize;

pub use cluster::{group_similar_texts, ClusterGroup, ClusterOptions};
pub use embedding::{cosine_similarity, EmbeddingProvider};
pub use error::{ClusterError, ShapeError};
pub use normalize::{DefaultNormalizer, TextNormalizer};
