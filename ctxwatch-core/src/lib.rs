//! # ctxwatch-core
//!
//! Core library for ctxwatch - context pressure and session learning hooks
//! for an interactive coding agent.
//!
//! This library provides:
//! - Lenient decoding of the agent's JSONL session transcripts
//! - Aggregators for context pressure and end-of-session analytics
//! - A per-session freshness cache and a date-partitioned learning log
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Every hook run is a single synchronous pass:
//! - **Locate:** find the active session and its transcript under `~/.claude`
//! - **Aggregate:** stream the transcript once, skipping lines that do not decode
//! - **Report:** print an advisory and pick an exit code, or append a log line
//!
//! ## Example
//!
//! ```rust,no_run
//! use ctxwatch_core::{Config, HookInput, LearningLogger};
//!
//! let config = Config::load().unwrap_or_default();
//! let outcome = LearningLogger::from_config(&config).run(&HookInput::default());
//! println!("{:?}", outcome);
//! ```

// Re-export commonly used items at the crate root
pub use alert::{Alert, ContextLevel, HookExit, Thresholds};
pub use config::Config;
pub use error::{Error, Result};
pub use hooks::{ContextMonitor, LearningLogger, LearningOutcome};
pub use session::{HookInput, SessionLocator, HOOK_INPUT_TIMEOUT};
pub use types::*;

// Public modules
pub mod aggregate;
pub mod alert;
pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod hooks;
pub mod learning;
pub mod logging;
pub mod session;
pub mod transcript;
pub mod types;
