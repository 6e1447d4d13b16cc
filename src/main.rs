//! # Question Clusters CLI (`qc`)
//!
//! The `qc` binary groups short texts (support questions, search queries,
//! FAQ candidates) into clusters of near-duplicates using embeddings.
//!
//! ## Usage
//!
//! ```bash
//! qc --config ./config/qc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qc group [FILE]` | Cluster texts from FILE or stdin and print the groups |
//! | `qc normalize [FILE]` | Print the normalized form of each input line |
//! | `qc similarity <A> <B>` | Print the cosine similarity of two texts |
//! | `qc providers` | List embedding providers and the active one |
//! | `qc completions <SHELL>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Group one question per line
//! qc group questions.txt --config ./config/qc.toml
//!
//! # Tighter groups, at most 5, as JSON
//! qc group questions.txt --threshold 0.9 --max-groups 5 --format json
//!
//! # JSON request on stdin
//! echo '{"texts": ["Reset password?", "how to reset password"]}' | qc group --json
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use question_clusters::config;
use question_clusters::group_cmd::{self, GroupArgs, OutputFormat};
use question_clusters::providers;

/// Question Clusters CLI: group similar texts by embedding similarity.
///
/// Commands that embed text accept a `--config` flag pointing to a TOML
/// configuration file. See `config/qc.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qc",
    about = "Group similar questions by embedding similarity",
    version,
    long_about = "Question Clusters normalizes short texts, embeds them with a configurable \
    provider (OpenAI, Ollama, Bedrock, or a local model), and groups them greedily by cosine \
    similarity against a threshold."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/qc.toml`. Embedding, clustering, and
    /// normalization settings are read from this file.
    #[arg(long, global = true, default_value = "./config/qc.toml")]
    config: PathBuf,

    /// Increase log verbosity (`-v` info, `-vv` debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Group similar texts.
    ///
    /// Reads one text per line (or a JSON request with `--json`),
    /// normalizes and deduplicates them, embeds them, and prints groups
    /// ordered by size, largest first.
    Group {
        /// Input file. Reads stdin when omitted or `-`.
        file: Option<PathBuf>,

        /// Parse input as JSON: an array of strings, or
        /// `{"texts": [...], "threshold": 0.9, "max_groups": 5}`.
        #[arg(long)]
        json: bool,

        /// Minimum cosine similarity to join a group (overrides config).
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<f32>,

        /// Exact number of groups to return: truncates, or repeats groups
        /// cyclically when fewer exist. `0` means no limit.
        #[arg(long, allow_negative_numbers = true)]
        max_groups: Option<i64>,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write groups to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Do not print notifications to stderr.
        #[arg(long)]
        silent: bool,
    },

    /// Print the normalized form of each input line.
    ///
    /// Uses the `[normalize]` settings from config when present.
    Normalize {
        /// Input file. Reads stdin when omitted or `-`.
        file: Option<PathBuf>,
    },

    /// Embed two texts and print their cosine similarity.
    Similarity {
        /// First text.
        a: String,
        /// Second text.
        b: String,
    },

    /// List embedding providers and show which one is active.
    Providers,

    /// Print shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "qc", &mut std::io::stdout());
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Normalize { file } => {
            // Use config if available, otherwise defaults
            let cfg =
                config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
            group_cmd::run_normalize(&cfg, file.as_deref())?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Group {
            file,
            json,
            threshold,
            max_groups,
            format,
            output,
            silent,
        } => {
            let args = GroupArgs {
                input: file,
                json,
                threshold,
                max_groups,
                format,
                output,
                silent,
            };
            if !group_cmd::run_group(&cfg, &args).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Similarity { a, b } => {
            group_cmd::run_similarity(&cfg, &a, &b).await?;
        }
        Commands::Providers => {
            providers::list_providers(&cfg)?;
        }
        Commands::Normalize { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(ExitCode::SUCCESS)
}
