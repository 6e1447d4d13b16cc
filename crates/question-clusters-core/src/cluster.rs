//! Seed-linkage grouping of near-duplicate texts.
//!
//! # Algorithm
//!
//! 1. Normalize every input. Empty results are dropped. A map from the
//!    normalized form back to the raw text keeps the **last** raw text seen
//!    for each normalized key.
//! 2. Embed the per-input normalized sequence (duplicates kept, order kept).
//! 3. Walk indices in order. Each unused index seeds a new group; every
//!    later unused index whose cosine similarity **to the seed** is
//!    `>= threshold` joins it. Members are never compared with each other,
//!    so two members of one group may be dissimilar.
//! 4. Stable sort by member count, descending.
//! 5. Apply `max_groups`: truncate, or pad by cycling through the groups
//!    already produced.
//!
//! # Example
//!
//! ```rust
//! use question_clusters_core::cluster::{apply_max_groups, ClusterGroup};
//!
//! let groups = vec![
//!     ClusterGroup::new(vec!["a".into(), "b".into()]),
//!     ClusterGroup::new(vec!["c".into()]),
//! ];
//! let padded = apply_max_groups(groups, Some(3)).unwrap();
//! assert_eq!(padded.len(), 3);
//! assert_eq!(padded[2].representative, "a");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::embedding::{check_embeddings, cosine_similarity, EmbeddingProvider};
use crate::error::{ClusterError, ShapeError};
use crate::normalize::TextNormalizer;

/// Similarity threshold used when none is given.
pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// Largest accepted `max_groups`. Padding materializes every entry, so
/// larger requests are errors rather than unbounded allocations.
pub const MAX_GROUPS_LIMIT: usize = 100_000;

/// One group of similar texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGroup {
    /// Raw text of the seed.
    pub representative: String,
    /// All members in insertion order; the first is the seed.
    pub similar_questions: Vec<String>,
}

impl ClusterGroup {
    /// Build a group from its members. The first member is the representative.
    pub fn new(similar_questions: Vec<String>) -> Self {
        let representative = similar_questions.first().cloned().unwrap_or_default();
        Self {
            representative,
            similar_questions,
        }
    }

    pub fn len(&self) -> usize {
        self.similar_questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.similar_questions.is_empty()
    }
}

/// Tuning for a single grouping call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    /// Minimum cosine similarity to the seed for a text to join its group.
    pub threshold: f32,
    /// Exact number of groups to return. `None` or `Some(0)` means no limit.
    pub max_groups: Option<usize>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_groups: None,
        }
    }
}

/// Group `texts` by embedding similarity.
///
/// Returns an empty result without calling the provider when every input
/// normalizes to an empty string. A provider failure or a malformed
/// provider response aborts the whole call; no partial groups are returned.
pub async fn group_similar_texts<T: AsRef<str>>(
    provider: &dyn EmbeddingProvider,
    normalizer: &dyn TextNormalizer,
    texts: &[T],
    options: &ClusterOptions,
) -> Result<Vec<ClusterGroup>, ClusterError> {
    if !options.threshold.is_finite() {
        return Err(ClusterError::InvalidThreshold(options.threshold));
    }
    if let Some(max) = options.max_groups {
        check_max_groups(max)?;
    }

    let mut raw_by_key: HashMap<String, &str> = HashMap::new();
    let mut cleaned: Vec<(String, &str)> = Vec::with_capacity(texts.len());
    for text in texts {
        let raw = text.as_ref();
        let key = normalizer.normalize(raw);
        if key.is_empty() {
            continue;
        }
        raw_by_key.insert(key.clone(), raw);
        cleaned.push((key, raw));
    }

    if cleaned.is_empty() {
        tracing::debug!(inputs = texts.len(), "no non-empty texts after normalization");
        return Ok(Vec::new());
    }

    let keys: Vec<String> = cleaned.iter().map(|(key, _)| key.clone()).collect();
    let labels: Vec<String> = cleaned
        .iter()
        .map(|(key, own)| raw_by_key.get(key.as_str()).copied().unwrap_or(*own).to_string())
        .collect();

    let embeddings = provider
        .embed(&keys)
        .await
        .map_err(ClusterError::EmbeddingProvider)?;
    check_embeddings(&embeddings, keys.len(), provider.dims())?;

    let groups = cluster_embeddings(&labels, &embeddings, options.threshold)?;
    tracing::debug!(
        inputs = texts.len(),
        embedded = keys.len(),
        groups = groups.len(),
        threshold = options.threshold,
        "grouped texts"
    );

    apply_max_groups(groups, options.max_groups)
}

/// Seed-linkage grouping over precomputed embeddings.
///
/// `labels[i]` is the text reported for `embeddings[i]`. The result is sorted
/// by member count, descending, with ties in seed order.
pub fn cluster_embeddings(
    labels: &[String],
    embeddings: &[Vec<f32>],
    threshold: f32,
) -> Result<Vec<ClusterGroup>, ShapeError> {
    if labels.len() != embeddings.len() {
        return Err(ShapeError::CountMismatch {
            expected: labels.len(),
            actual: embeddings.len(),
        });
    }

    let n = embeddings.len();
    let mut used = vec![false; n];
    let mut groups = Vec::new();

    for i in 0..n {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut members = vec![labels[i].clone()];

        for j in (i + 1)..n {
            if used[j] {
                continue;
            }
            let sim = cosine_similarity(&embeddings[i], &embeddings[j])
                .map_err(|e| at_pair(e, i, j))?;
            if sim >= threshold {
                members.push(labels[j].clone());
                used[j] = true;
            }
        }

        groups.push(ClusterGroup::new(members));
    }

    // `sort_by` is stable: equal sizes keep seed order.
    groups.sort_by(|a, b| b.len().cmp(&a.len()));
    Ok(groups)
}

/// Truncate or cyclically pad `groups` to exactly `max_groups` entries.
///
/// `None`, `Some(0)`, and an empty `groups` return the input unchanged.
/// A request above [`MAX_GROUPS_LIMIT`] is rejected before anything is
/// allocated.
pub fn apply_max_groups(
    mut groups: Vec<ClusterGroup>,
    max_groups: Option<usize>,
) -> Result<Vec<ClusterGroup>, ClusterError> {
    let max = match max_groups {
        Some(max) if max > 0 => check_max_groups(max)?,
        _ => return Ok(groups),
    };

    if groups.len() >= max {
        groups.truncate(max);
        return Ok(groups);
    }
    if groups.is_empty() {
        return Ok(groups);
    }

    let produced = groups.len();
    groups.reserve(max - produced);
    for k in produced..max {
        let repeat = groups[k % produced].clone();
        groups.push(repeat);
    }
    Ok(groups)
}

fn check_max_groups(max: usize) -> Result<usize, ClusterError> {
    if max > MAX_GROUPS_LIMIT {
        return Err(ClusterError::MaxGroupsTooLarge {
            requested: max,
            limit: MAX_GROUPS_LIMIT,
        });
    }
    Ok(max)
}

/// Map a pairwise error's argument position (0 = seed, 1 = candidate) to input indices.
fn at_pair(err: ShapeError, seed: usize, candidate: usize) -> ShapeError {
    let pick = |index: usize| if index == 0 { seed } else { candidate };
    match err {
        ShapeError::DimensionMismatch {
            index,
            expected,
            actual,
        } => ShapeError::DimensionMismatch {
            index: pick(index),
            expected,
            actual,
        },
        ShapeError::Empty { index } => ShapeError::Empty { index: pick(index) },
        ShapeError::ZeroVector { index } => ShapeError::ZeroVector { index: pick(index) },
        ShapeError::NonFinite { index } => ShapeError::NonFinite { index: pick(index) },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::DefaultNormalizer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed vector per normalized text.
    struct TableProvider {
        table: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl TableProvider {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TableProvider {
        fn model_name(&self) -> &str {
            "table"
        }
        fn dims(&self) -> usize {
            0
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            texts
                .iter()
                .map(|t| {
                    self.table
                        .get(t)
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("no vector for '{}'", t))
                })
                .collect()
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("service unavailable")
        }
    }

    /// Always answers with one vector, whatever the batch size.
    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            0
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]])
        }
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn unit(deg: f32) -> Vec<f32> {
        let r = deg.to_radians();
        vec![r.cos(), r.sin()]
    }

    fn opts(threshold: f32, max_groups: Option<usize>) -> ClusterOptions {
        ClusterOptions {
            threshold,
            max_groups,
        }
    }

    #[tokio::test]
    async fn test_password_refund_example() {
        let provider = TableProvider::new(&[
            ("how do i reset my password", vec![1.0, 0.0, 0.0]),
            ("how to reset password", vec![1.0, 0.0, 0.0]),
            ("what is your refund policy", vec![0.0, 1.0, 0.0]),
        ]);
        let texts = [
            "How do I reset my password?",
            "how to reset password",
            "What is your refund policy?",
        ];

        let groups = group_similar_texts(
            &provider,
            &DefaultNormalizer::default(),
            &texts,
            &ClusterOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].representative, "How do I reset my password?");
        assert_eq!(
            groups[0].similar_questions,
            vec!["How do I reset my password?", "how to reset password"]
        );
        assert_eq!(groups[1].representative, "What is your refund policy?");
        assert_eq!(groups[1].len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_skips_provider() {
        let provider = TableProvider::new(&[]);
        let texts: [&str; 0] = [];
        let groups = group_similar_texts(
            &provider,
            &DefaultNormalizer::default(),
            &texts,
            &opts(0.85, Some(5)),
        )
        .await
        .unwrap();
        assert!(groups.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_filtered_input_is_empty() {
        let provider = TableProvider::new(&[]);
        let groups = group_similar_texts(
            &provider,
            &DefaultNormalizer::default(),
            &["", "???", "   "],
            &opts(0.85, Some(3)),
        )
        .await
        .unwrap();
        assert!(groups.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_member_count_matches_non_empty_inputs() {
        let provider = TableProvider::new(&[
            ("alpha", vec![1.0, 0.0]),
            ("beta", vec![0.9, 0.1]),
            ("gamma", vec![0.0, 1.0]),
        ]);
        let texts = ["alpha", "", "beta", "!!", "gamma", "Alpha"];
        let groups = group_similar_texts(
            &provider,
            &DefaultNormalizer::default(),
            &texts,
            &opts(0.85, None),
        )
        .await
        .unwrap();

        let total: usize = groups.iter().map(ClusterGroup::len).sum();
        assert_eq!(total, 4);
        for g in &groups {
            assert!(!g.is_empty());
            assert_eq!(g.similar_questions[0], g.representative);
        }
    }

    #[tokio::test]
    async fn test_duplicate_keys_use_last_raw_text() {
        let provider = TableProvider::new(&[
            ("reset password", vec![1.0, 0.0]),
            ("refund", vec![0.0, 1.0]),
        ]);
        let texts = ["Reset password", "Refund", "reset password!"];
        let groups = group_similar_texts(
            &provider,
            &DefaultNormalizer::default(),
            &texts,
            &opts(0.85, None),
        )
        .await
        .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].representative, "reset password!");
        assert_eq!(
            groups[0].similar_questions,
            vec!["reset password!", "reset password!"]
        );
        assert_eq!(groups[1].similar_questions, vec!["Refund"]);
    }

    #[tokio::test]
    async fn test_impossible_threshold_gives_singletons() {
        let provider = TableProvider::new(&[("a", vec![1.0, 0.0]), ("b", vec![1.0, 0.0])]);
        let groups = group_similar_texts(
            &provider,
            &DefaultNormalizer::default(),
            &["a", "b", "a"],
            &opts(1.01, None),
        )
        .await
        .unwrap();
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 1));
        let reps: Vec<&str> = groups.iter().map(|g| g.representative.as_str()).collect();
        assert_eq!(reps, vec!["a", "b", "a"]);
    }

    #[tokio::test]
    async fn test_minimum_threshold_joins_everything() {
        let provider = TableProvider::new(&[
            ("x", unit(0.0)),
            ("y", unit(90.0)),
            ("z", unit(180.0)),
        ]);
        let groups = group_similar_texts(
            &provider,
            &DefaultNormalizer::default(),
            &["x", "y", "z"],
            &opts(-1.0, None),
        )
        .await
        .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].similar_questions, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let err = group_similar_texts(
            &FailingProvider,
            &DefaultNormalizer::default(),
            &["hello"],
            &ClusterOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClusterError::EmbeddingProvider(_)));
        assert!(err.to_string().contains("service unavailable"));
    }

    // Hardening: the provider response is checked before comparing.
    #[tokio::test]
    async fn test_short_provider_response_is_shape_error() {
        let err = group_similar_texts(
            &ShortProvider,
            &DefaultNormalizer::default(),
            &["one", "two"],
            &ClusterOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::EmbeddingShape(ShapeError::CountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_zero_vector_is_shape_error() {
        let provider = TableProvider::new(&[("one", vec![1.0, 0.0]), ("two", vec![0.0, 0.0])]);
        let err = group_similar_texts(
            &provider,
            &DefaultNormalizer::default(),
            &["one", "two"],
            &ClusterOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::EmbeddingShape(ShapeError::ZeroVector { index: 1 })
        ));
    }

    #[tokio::test]
    async fn test_nan_threshold_rejected() {
        let provider = TableProvider::new(&[]);
        let err = group_similar_texts(
            &provider,
            &DefaultNormalizer::default(),
            &["one"],
            &opts(f32::NAN, None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClusterError::InvalidThreshold(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_membership_checked_against_seed_only() {
        // b and c are each 40° from a but 80° from each other.
        let embeddings = vec![unit(0.0), unit(40.0), unit(-40.0)];
        let groups = cluster_embeddings(&labels(&["a", "b", "c"]), &embeddings, 0.7).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].similar_questions, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_not_transitive() {
        // c is close to b but not to the seed a.
        let embeddings = vec![unit(0.0), unit(45.0), unit(90.0)];
        let groups = cluster_embeddings(&labels(&["a", "b", "c"]), &embeddings, 0.7).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].similar_questions, vec!["a", "b"]);
        assert_eq!(groups[1].similar_questions, vec!["c"]);
    }

    #[test]
    fn test_sorted_by_size_with_stable_ties() {
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        let groups =
            cluster_embeddings(&labels(&["a", "b", "c", "d"]), &embeddings, 0.85).unwrap();
        let reps: Vec<&str> = groups.iter().map(|g| g.representative.as_str()).collect();
        assert_eq!(reps, vec!["b", "a", "d"]);
        assert_eq!(groups[0].similar_questions, vec!["b", "c"]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let groups = cluster_embeddings(&labels(&["a", "b"]), &embeddings, 1.0).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_cluster_embeddings_reports_pair_index() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]];
        let err = cluster_embeddings(&labels(&["a", "b"]), &embeddings, 0.5).unwrap_err();
        assert_eq!(
            err,
            ShapeError::DimensionMismatch {
                index: 1,
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_cluster_embeddings_large_and_tiny_vectors() {
        let embeddings = vec![vec![1e20, 1e20], vec![2e20, 2e20], vec![1e-8, -1e-8]];
        check_embeddings(&embeddings, 3, 2).unwrap();
        let groups =
            cluster_embeddings(&labels(&["a", "b", "c"]), &embeddings, 0.99).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].similar_questions, vec!["a", "b"]);
        assert_eq!(groups[1].similar_questions, vec!["c"]);
    }

    #[test]
    fn test_cluster_embeddings_label_count() {
        let err = cluster_embeddings(&labels(&["a"]), &[], 0.5).unwrap_err();
        assert!(matches!(err, ShapeError::CountMismatch { .. }));
    }

    fn sample_groups(n: usize) -> Vec<ClusterGroup> {
        (0..n)
            .map(|i| ClusterGroup::new(vec![format!("g{}", i)]))
            .collect()
    }

    #[test]
    fn test_padding_cycles_through_groups() {
        let padded = apply_max_groups(sample_groups(2), Some(5)).unwrap();
        let reps: Vec<&str> = padded.iter().map(|g| g.representative.as_str()).collect();
        assert_eq!(reps, vec!["g0", "g1", "g0", "g1", "g0"]);
    }

    #[test]
    fn test_truncates_to_max_groups() {
        let truncated = apply_max_groups(sample_groups(4), Some(2)).unwrap();
        let reps: Vec<&str> = truncated.iter().map(|g| g.representative.as_str()).collect();
        assert_eq!(reps, vec!["g0", "g1"]);
    }

    #[test]
    fn test_padding_empty_terminates() {
        assert!(apply_max_groups(Vec::new(), Some(1000)).unwrap().is_empty());
    }

    #[test]
    fn test_zero_or_none_is_unlimited() {
        assert_eq!(apply_max_groups(sample_groups(3), None).unwrap().len(), 3);
        assert_eq!(apply_max_groups(sample_groups(3), Some(0)).unwrap().len(), 3);
    }

    #[test]
    fn test_large_padding_preserved() {
        let padded = apply_max_groups(sample_groups(2), Some(1000)).unwrap();
        assert_eq!(padded.len(), 1000);
        assert_eq!(padded[999].representative, "g1");
    }

    #[test]
    fn test_padding_at_limit_allowed() {
        let padded = apply_max_groups(sample_groups(1), Some(MAX_GROUPS_LIMIT)).unwrap();
        assert_eq!(padded.len(), MAX_GROUPS_LIMIT);
    }

    #[test]
    fn test_huge_max_groups_is_error() {
        for requested in [MAX_GROUPS_LIMIT + 1, 1_000_000_000, usize::MAX] {
            let err = apply_max_groups(sample_groups(2), Some(requested)).unwrap_err();
            assert!(matches!(
                err,
                ClusterError::MaxGroupsTooLarge { requested: r, limit: MAX_GROUPS_LIMIT } if r == requested
            ));
        }
    }

    #[tokio::test]
    async fn test_huge_max_groups_rejected_before_embedding() {
        let err = group_similar_texts(
            &FailingProvider,
            &DefaultNormalizer::default(),
            &["a", "b"],
            &opts(0.5, Some(usize::MAX)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "MaxGroupsTooLarge");
    }

    #[test]
    fn test_group_serializes_with_wire_names() {
        let g = ClusterGroup::new(vec!["a".into(), "b".into()]);
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["representative"], "a");
        assert_eq!(json["similar_questions"][1], "b");
    }
}
