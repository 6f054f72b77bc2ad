//! ctxwatch-learn - session-end learning hook
//!
//! Summarizes the finished session into one analytics line in
//! `.claude/learning/sessions/YYYY-MM-DD.jsonl`, then drops partitions older
//! than the retention window. Always exits 0.

use anyhow::{Context, Result};
use clap::Parser;
use ctxwatch_core::{Config, HookInput, LearningLogger, LearningOutcome, HOOK_INPUT_TIMEOUT};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ctxwatch-learn")]
#[command(about = "Append a session summary to the learning log")]
#[command(version)]
struct Args {
    /// Session ID to summarize (defaults to the hook payload, then history.jsonl)
    #[arg(short, long)]
    session: Option<String>,

    /// Transcript to read instead of searching ~/.claude/projects
    #[arg(short, long)]
    transcript: Option<PathBuf>,

    /// Keep old partitions
    #[arg(long)]
    no_prune: bool,

    /// Print the record as JSON instead of appending it
    #[arg(long)]
    dry_run: bool,
}

fn load_config() -> Result<Config> {
    let path = Config::config_path();
    Config::load().with_context(|| format!("failed to load {}", path.display()))
}

fn run(args: Args, config: &Config) -> Result<()> {
    let hook =
        HookInput::from_stdin(HOOK_INPUT_TIMEOUT).with_overrides(args.session, args.transcript);

    let mut logger = LearningLogger::from_config(config);
    if args.no_prune {
        logger = logger.without_prune();
    }

    if args.dry_run {
        if let Some((_, record)) = logger.summarize(&hook) {
            let json =
                serde_json::to_string_pretty(&record).context("failed to serialize record")?;
            println!("{}", json);
        }
        return Ok(());
    }

    match logger.run(&hook) {
        LearningOutcome::Skipped => tracing::debug!("No qualifying session"),
        LearningOutcome::Appended { outcome, pruned } => {
            tracing::debug!(?outcome, ?pruned, "Learning run finished");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (config, config_error) = match load_config() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let _log_guard = ctxwatch_core::logging::init(&config.logging).ok();
    if let Some(e) = config_error {
        tracing::warn!(error = %format!("{:#}", e), "Using default configuration");
    }

    // The session is ending; never get in its way
    if let Err(e) = run(args, &config) {
        tracing::warn!(error = %format!("{:#}", e), "Learning logger failed");
    }
    ExitCode::SUCCESS
}
