//! `qc group`, `qc normalize`, and `qc similarity` commands.
//!
//! `group` is the main entry point: it reads texts, resolves options
//! (flag → request body → config), clusters them with the configured
//! embedding provider, and prints or writes the groups.
//!
//! # Output
//!
//! `--format text` (default):
//!
//! ```text
//! [1] How do I reset my password? (2)
//!     How do I reset my password?
//!     how to reset password
//! [2] What is your refund policy? (1)
//!     What is your refund policy?
//! ```
//!
//! `--format json` prints the groups as
//! `[{ "representative": ..., "similar_questions": [...] }]`.

use anyhow::{bail, Context, Result};
use question_clusters_core::embedding::check_embeddings;
use question_clusters_core::{
    cosine_similarity, group_similar_texts, ClusterError, ClusterGroup, TextNormalizer,
};
use std::fmt::Write as _;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::report::{
    handle_error, handle_success, ApiError, ConsoleNotifier, ErrorResponse, Notifier,
};
use crate::request::GroupRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Options for `qc group`, as parsed from the command line.
#[derive(Debug, Clone)]
pub struct GroupArgs {
    /// Input file; `None` or `-` reads stdin.
    pub input: Option<PathBuf>,
    /// Parse input as a JSON request instead of one text per line.
    pub json: bool,
    pub threshold: Option<f32>,
    pub max_groups: Option<i64>,
    pub format: OutputFormat,
    /// Write groups here instead of stdout.
    pub output: Option<PathBuf>,
    /// Suppress notifications on stderr.
    pub silent: bool,
}

/// Run `qc group`. Returns `Ok(false)` when grouping failed and the failure
/// has already been reported.
pub async fn run_group(config: &Config, args: &GroupArgs) -> Result<bool> {
    let mut stdout = std::io::stdout();
    run_group_with(config, args, None, &ConsoleNotifier, &mut stdout).await
}

/// `run_group` with its collaborators passed in. `provider` of `None`
/// builds the one named in `config`.
pub(crate) async fn run_group_with(
    config: &Config,
    args: &GroupArgs,
    provider: Option<&dyn EmbeddingProvider>,
    notifier: &dyn Notifier,
    stdout: &mut dyn Write,
) -> Result<bool> {
    let outcome = async {
        let input = read_input(args.input.as_deref())?;
        let parsed = if args.json {
            GroupRequest::from_json(&input)?
        } else {
            GroupRequest::from_lines(&input)
        };
        let request = parsed.with_overrides(args.threshold, args.max_groups);
        let groups = group_texts_with(config, &request, provider).await?;

        let rendered = render(&groups, args.format)?;
        match &args.output {
            Some(path) => std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write output: {}", path.display()))?,
            None => stdout
                .write_all(rendered.as_bytes())
                .context("Failed to write output")?,
        }
        Ok::<_, anyhow::Error>((groups.len(), request.texts.len()))
    }
    .await;

    match outcome {
        Ok((groups, count)) => {
            if !args.silent {
                handle_success(notifier, &format!("{} groups from {} texts", groups, count));
            }
            Ok(true)
        }
        Err(e) => {
            let api = ApiError::from_error(&e);
            handle_error(notifier, &api, "Failed to group texts", args.silent);
            if args.format == OutputFormat::Json {
                let body = serde_json::to_string_pretty(&ErrorResponse::from(&api))?;
                writeln!(stdout, "{}", body)?;
            }
            Ok(false)
        }
    }
}

/// Group the texts of `request` using the provider and normalizer from `config`.
pub async fn group_texts(config: &Config, request: &GroupRequest) -> Result<Vec<ClusterGroup>> {
    group_texts_with(config, request, None).await
}

async fn group_texts_with(
    config: &Config,
    request: &GroupRequest,
    provider: Option<&dyn EmbeddingProvider>,
) -> Result<Vec<ClusterGroup>> {
    let options = request.options(&config.clustering)?;
    let created;
    let provider: &dyn EmbeddingProvider = match provider {
        Some(provider) => provider,
        None => {
            created = embedding::create_provider(&config.embedding)
                .map_err(ClusterError::EmbeddingProvider)?;
            created.as_ref()
        }
    };
    let normalizer = config.normalize.normalizer();

    let groups = group_similar_texts(provider, &normalizer, &request.texts, &options).await?;

    tracing::info!(
        provider = %config.embedding.provider,
        model = provider.model_name(),
        texts = request.texts.len(),
        groups = groups.len(),
        "grouping complete"
    );
    Ok(groups)
}

/// Run `qc normalize`: print each input line's normalized form.
pub fn run_normalize(config: &Config, input: Option<&Path>) -> Result<()> {
    let text = read_input(input)?;
    let normalizer = config.normalize.normalizer();
    for line in text.lines() {
        println!("{}", normalizer.normalize(line));
    }
    Ok(())
}

/// Run `qc similarity`: embed two texts and print their cosine similarity.
pub async fn run_similarity(config: &Config, a: &str, b: &str) -> Result<()> {
    let provider =
        embedding::create_provider(&config.embedding).map_err(ClusterError::EmbeddingProvider)?;
    let normalizer = config.normalize.normalizer();

    let texts = vec![normalizer.normalize(a), normalizer.normalize(b)];
    if texts.iter().any(String::is_empty) {
        bail!("Both texts must contain at least one word after normalization");
    }

    let vectors = provider
        .embed(&texts)
        .await
        .map_err(ClusterError::EmbeddingProvider)?;
    check_embeddings(&vectors, texts.len(), provider.dims()).map_err(ClusterError::from)?;
    let sim = cosine_similarity(&vectors[0], &vectors[1]).map_err(ClusterError::from)?;

    let threshold = config.clustering.threshold;
    println!("similarity: {:.4}", sim);
    println!(
        "threshold {:.2}: {}",
        threshold,
        if sim >= threshold {
            "same group"
        } else {
            "different groups"
        }
    );
    Ok(())
}

/// Render groups for output.
pub fn render(groups: &[ClusterGroup], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(groups)?)),
        OutputFormat::Text => Ok(render_text(groups)),
    }
}

fn render_text(groups: &[ClusterGroup]) -> String {
    let mut out = String::new();
    for (i, group) in groups.iter().enumerate() {
        let _ = writeln!(
            out,
            "[{}] {} ({})",
            i + 1,
            group.representative,
            group.len()
        );
        for member in &group.similar_questions {
            let _ = writeln!(out, "    {}", member);
        }
    }
    out
}

/// Read all input from `path`, or from stdin when `path` is `None` or `-`.
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read input file: {}", p.display())),
        _ => {
            if path.is_none() && atty::is(atty::Stream::Stdin) {
                bail!("No input: pass a FILE or pipe texts on stdin");
            }
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}
