//! ctxwatch-monitor - context pressure hook
//!
//! Runs after tool calls. Prints a yellow advisory when the session's context
//! crosses the warn threshold and a red one, with a blocking exit code, when
//! it crosses the stop threshold. Anything else exits 0 silently.

use anyhow::{Context, Result};
use clap::Parser;
use ctxwatch_core::{Config, ContextMonitor, HookInput, HOOK_INPUT_TIMEOUT};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ctxwatch-monitor")]
#[command(about = "Warn or block when a session's context window fills up")]
#[command(version)]
struct Args {
    /// Session ID to check (defaults to the hook payload, then history.jsonl)
    #[arg(short, long)]
    session: Option<String>,

    /// Transcript to read instead of searching ~/.claude/projects
    #[arg(short, long)]
    transcript: Option<PathBuf>,

    /// Always rescan the transcript; neither read nor write the cache
    #[arg(long)]
    no_cache: bool,
}

fn load_config() -> Result<Config> {
    let path = Config::config_path();
    Config::load().with_context(|| format!("failed to load {}", path.display()))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (config, config_error) = match load_config() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // stderr belongs to the advisory, so a logging failure stays silent
    let _log_guard = ctxwatch_core::logging::init(&config.logging).ok();
    if let Some(e) = config_error {
        tracing::warn!(error = %format!("{:#}", e), "Using default configuration");
    }

    let hook =
        HookInput::from_stdin(HOOK_INPUT_TIMEOUT).with_overrides(args.session, args.transcript);

    let mut monitor = ContextMonitor::from_config(&config);
    if args.no_cache {
        monitor = monitor.without_cache();
    }

    let exit = monitor.run(&hook, &mut std::io::stderr().lock());
    tracing::debug!(code = exit.code(), event = ?hook.hook_event_name, "Monitor finished");
    exit.into()
}
