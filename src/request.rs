//! Grouping request input and validation.
//!
//! Texts arrive either as plain text (one per line) or as JSON: a bare
//! array of strings, or an object
//! `{ "texts": [...], "threshold": 0.9, "max_groups": 5 }`.
//!
//! Precedence for tuning values: CLI flag, then request body, then config.

use question_clusters_core::cluster::MAX_GROUPS_LIMIT;
use question_clusters_core::ClusterOptions;
use serde::Deserialize;

use crate::config::ClusteringConfig;
use crate::report::{ApiError, FieldError};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GroupRequest {
    pub texts: Vec<String>,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub max_groups: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RequestBody {
    Texts(Vec<String>),
    Request(GroupRequest),
}

impl GroupRequest {
    /// One text per line. Blank lines are kept; the normalizer drops them.
    pub fn from_lines(input: &str) -> Self {
        Self {
            texts: input.lines().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn from_json(input: &str) -> Result<Self, ApiError> {
        let body: RequestBody = serde_json::from_str(input)
            .map_err(|e| ApiError::bad_request(format!("invalid JSON request: {}", e)))?;
        Ok(match body {
            RequestBody::Texts(texts) => Self {
                texts,
                ..Self::default()
            },
            RequestBody::Request(req) => req,
        })
    }

    /// Apply CLI flags over the values from the request body.
    pub fn with_overrides(mut self, threshold: Option<f32>, max_groups: Option<i64>) -> Self {
        self.threshold = threshold.or(self.threshold);
        self.max_groups = max_groups.or(self.max_groups);
        self
    }

    /// Resolve clustering options, collecting every invalid field.
    pub fn options(&self, defaults: &ClusteringConfig) -> Result<ClusterOptions, ApiError> {
        let mut errors = Vec::new();

        let threshold = self.threshold.unwrap_or(defaults.threshold);
        if !threshold.is_finite() {
            errors.push(FieldError::new("threshold", "must be a finite number"));
        }

        let max_groups = match self.max_groups {
            Some(n) if n < 0 => {
                errors.push(FieldError::new("max_groups", "must be >= 0"));
                None
            }
            Some(n) => match usize::try_from(n) {
                Ok(n) if n <= MAX_GROUPS_LIMIT => Some(n),
                _ => {
                    errors.push(FieldError::new(
                        "max_groups",
                        format!("must be <= {}", MAX_GROUPS_LIMIT),
                    ));
                    None
                }
            },
            None => defaults.max_groups,
        };

        if !errors.is_empty() {
            return Err(ApiError::validation("invalid request", errors));
        }

        Ok(ClusterOptions {
            threshold,
            max_groups,
        })
    }
}
