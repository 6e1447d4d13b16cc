//! Text normalization applied before embedding.
//!
//! The normalized form is both the embedding input and the lookup key back
//! to the raw text. An empty normalized string means "drop this input".
//!
//! # Example
//!
//! ```rust
//! use question_clusters_core::normalize::{DefaultNormalizer, TextNormalizer};
//!
//! let n = DefaultNormalizer::default();
//! assert_eq!(n.normalize("  How do I reset my Password?? "), "how do i reset my password");
//! assert_eq!(n.normalize("???"), "");
//! ```

/// Turns a raw input string into its canonical form.
///
/// Implementations must be deterministic and pure.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}

/// Lowercases, strips punctuation, and collapses whitespace.
#[derive(Debug, Clone, Copy)]
pub struct DefaultNormalizer {
    pub lowercase: bool,
    pub strip_punctuation: bool,
}

impl Default for DefaultNormalizer {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
        }
    }
}

impl TextNormalizer for DefaultNormalizer {
    fn normalize(&self, raw: &str) -> String {
        let mut cleaned = String::with_capacity(raw.len());

        for ch in raw.chars() {
            if self.strip_punctuation && !ch.is_alphanumeric() && !ch.is_whitespace() {
                // Apostrophes join the word ("don't" -> "dont"); anything else splits it.
                if ch != '\'' && ch != '\u{2019}' {
                    cleaned.push(' ');
                }
                continue;
            }
            if self.lowercase {
                cleaned.extend(ch.to_lowercase());
            } else {
                cleaned.push(ch);
            }
        }

        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
