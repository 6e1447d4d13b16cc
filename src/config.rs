//! TOML configuration parsing and validation.
//!
//! ```toml
//! [embedding]
//! provider = "openai"            # disabled | openai | ollama | bedrock | local
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [clustering]
//! threshold = 0.85
//! max_groups = 10
//!
//! [normalize]
//! lowercase = true
//! strip_punctuation = true
//! ```
//!
//! Every section is optional; missing values take the defaults below.

use anyhow::{Context, Result};
use question_clusters_core::cluster::{DEFAULT_THRESHOLD, MAX_GROUPS_LIMIT};
use question_clusters_core::normalize::DefaultNormalizer;
use serde::Deserialize;
use std::path::Path;

/// Provider names accepted in `[embedding].provider`.
pub const PROVIDERS: &[&str] = &["disabled", "openai", "ollama", "bedrock", "local"];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Endpoint override. Ollama: base URL (default `http://localhost:11434`).
    /// Bedrock: custom `https://` endpoint such as a VPC endpoint; other
    /// schemes are rejected.
    #[serde(default)]
    pub url: Option<String>,
    /// AWS region for the Bedrock provider (falls back to `AWS_REGION`).
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
            region: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusteringConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub max_groups: Option<usize>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_groups: None,
        }
    }
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

#[derive(Debug, Deserialize, Clone)]
pub struct NormalizeConfig {
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default = "default_true")]
    pub strip_punctuation: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl NormalizeConfig {
    pub fn normalizer(&self) -> DefaultNormalizer {
        DefaultNormalizer {
            lowercase: self.lowercase,
            strip_punctuation: self.strip_punctuation,
        }
    }
}

impl Config {
    /// All defaults with embeddings disabled, for commands that can run
    /// without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate clustering
    if !config.clustering.threshold.is_finite() {
        anyhow::bail!("clustering.threshold must be a finite number");
    }
    if config.clustering.max_groups.is_some_and(|n| n > MAX_GROUPS_LIMIT) {
        anyhow::bail!("clustering.max_groups must be <= {}", MAX_GROUPS_LIMIT);
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0 when set");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" | "bedrock" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be one of: {}.",
            other,
            PROVIDERS.join(", ")
        ),
    }

    Ok(config)
}
