//! # Question Clusters
//!
//! Groups short, similar texts (support questions, search queries, FAQ
//! candidates) into clusters using embedding similarity.
//!
//! The algorithm lives in `question-clusters-core` and has no I/O of its
//! own. This crate supplies everything around it: configuration, concrete
//! embedding providers, request parsing, error reporting, and the `qc` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌─────────────┐   ┌───────────┐
//! │   Input    │──▶│ Normalize  │──▶│   Embed     │──▶│  Cluster  │
//! │ lines/JSON │   │ + dedupe   │   │ (provider)  │   │ by cosine │
//! └────────────┘   └────────────┘   └─────────────┘   └─────┬─────┘
//!                                                           ▼
//!                                                     ┌──────────┐
//!                                                     │ qc group │
//!                                                     └──────────┘
//! ```
//!
//! ## Library use
//!
//! ```rust,no_run
//! use question_clusters::config::Config;
//! use question_clusters::group_cmd::group_texts;
//! use question_clusters::request::GroupRequest;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::minimal();
//! let request = GroupRequest::from_lines("How do I reset my password?\nhow to reset password");
//! for group in group_texts(&config, &request).await? {
//!     println!("{} ({})", group.representative, group.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Concrete embedding providers |
//! | [`request`] | Grouping request parsing and validation |
//! | [`report`] | Error classification and notifications |
//! | [`group_cmd`] | `group`, `normalize`, and `similarity` commands |
//! | [`providers`] | Provider listing |

pub mod config;
pub mod embedding;
pub mod group_cmd;
pub mod providers;
pub mod report;
pub mod request;

pub use question_clusters_core::{
    group_similar_texts, ClusterError, ClusterGroup, ClusterOptions, ShapeError,
};
