//! # wut CLI
//!
//! ```bash
//! wut [OPTIONS] <FILES>...
//! ```
//!
//! Prints one line per file: `<file>: <description>`, or a `Skipping` /
//! `Failed to guess file` line when that file could not be handled. Always
//! exits 0 once at least one file was given, whatever happened to the
//! individual files.
//!
//! ## Examples
//!
//! ```bash
//! # Local model served by LM Studio (the default endpoint)
//! wut notes.txt report.pdf
//!
//! # Hosted endpoint, key from OPENAI_API_KEY
//! wut --base-url https://api.openai.com/v1 --model gpt-4o-mini logo.png
//!
//! # Describe a directory's files and how they fit together
//! wut --summary src/*
//! ```

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wut::command::SystemRunner;
use wut::config::{self, LlmOverrides};
use wut::llm::OpenAiChatClient;
use wut::progress::ProgressMode;
use wut::run::{run_batch, RunOptions};
use wut::summarize::LlmSummarizer;

/// Describe unfamiliar files in one sentence using a language model.
#[derive(Parser)]
#[command(
    name = "wut",
    version,
    about = "Describe unfamiliar files in one sentence using a language model",
    long_about = "Classifies each file, extracts text (or a binary report, or image data), \
    and asks an OpenAI-compatible chat endpoint for a one-sentence description. \
    With --summary, also writes a summary of how the files relate."
)]
struct Cli {
    /// Files to describe.
    files: Vec<PathBuf>,

    /// Model name, passed to the endpoint verbatim.
    /// [default: mistralai/magistral-small-2509]
    #[arg(long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API. [default: http://localhost:1234/v1]
    #[arg(long)]
    base_url: Option<String>,

    /// API key. Falls back to WUT_API_KEY, then OPENAI_API_KEY.
    #[arg(long)]
    api_key: Option<String>,

    /// Print the detected content type and extracted content of each file.
    #[arg(long)]
    verbose: bool,

    /// Finish with an overall summary of all files.
    #[arg(long)]
    summary: bool,

    /// Model context length in tokens; bounds how much content is sent.
    /// [default: 128000]
    #[arg(long)]
    context_length: Option<usize>,

    /// Optional TOML configuration file with an `[llm]` section.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Progress on stderr: `auto` (human when stderr is a TTY), `off`, `human`, or `json`.
    #[arg(long, default_value = "auto", value_parser = ProgressMode::parse)]
    progress: ProgressMode,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.files.is_empty() {
        println!("Please specify at least one file");
        std::process::exit(1);
    }

    let overrides = LlmOverrides {
        model: cli.model,
        base_url: cli.base_url,
        api_key: cli.api_key,
        context_length: cli.context_length,
    };
    let cfg = config::resolve(cli.config.as_deref(), overrides, |name| {
        std::env::var(name).ok()
    })?;

    let client = OpenAiChatClient::new(&cfg.llm)?;
    let summarizer = LlmSummarizer::new(client, cfg.llm.context_length);
    let reporter = cli.progress.reporter();
    let options = RunOptions {
        model: cfg.llm.model.clone(),
        verbose: cli.verbose,
        summary: cli.summary,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_batch(
        &cli.files,
        &options,
        &SystemRunner,
        &summarizer,
        reporter.as_ref(),
        &mut out,
    )
    .await?;

    Ok(())
}
