//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/ctxwatch/config.toml`. The file is
//! optional and every field has a default, so a missing file behaves exactly
//! like the built-in constants.
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/ctxwatch/` (~/.config/ctxwatch/)
//! - State/Logs: `$XDG_STATE_HOME/ctxwatch/` (~/.local/state/ctxwatch/)

use crate::alert::Thresholds;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Percentage at which the monitor starts warning.
pub const DEFAULT_WARN_THRESHOLD: f64 = 65.0;
/// Percentage at which the monitor blocks.
pub const DEFAULT_STOP_THRESHOLD: f64 = 85.0;
/// Context budget in tokens.
pub const DEFAULT_CONTEXT_LIMIT: u64 = 200_000;
/// Seconds a cached pressure value stays fresh.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;
/// Days a learning log partition is kept.
pub const DEFAULT_RETENTION_DAYS: u64 = 90;
/// Error excerpts kept per analytics record.
pub const DEFAULT_MAX_ERRORS: usize = 5;
/// Tool histogram entries kept per analytics record.
pub const DEFAULT_TOP_TOOLS: usize = 20;

/// Returns a best-effort home directory path.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Context pressure monitor
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Session learning log
    #[serde(default)]
    pub learning: LearningConfig,

    /// Where the agent host keeps its data
    #[serde(default)]
    pub claude: ClaudeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Context pressure monitor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Warn at or above this percentage
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: f64,

    /// Block at or above this percentage
    #[serde(default = "default_stop_threshold")]
    pub stop_threshold: f64,

    /// Context budget in tokens
    #[serde(default = "default_context_limit")]
    pub context_limit: u64,

    /// Freshness window for cached pressure values
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Override for the cache directory (defaults to `<tmp>/.claude_context_cache`)
    pub cache_dir: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            warn_threshold: default_warn_threshold(),
            stop_threshold: default_stop_threshold(),
            context_limit: default_context_limit(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_dir: None,
        }
    }
}

impl MonitorConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            warn: self.warn_threshold,
            stop: self.stop_threshold,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(".claude_context_cache"))
    }
}

fn default_warn_threshold() -> f64 {
    DEFAULT_WARN_THRESHOLD
}

fn default_stop_threshold() -> f64 {
    DEFAULT_STOP_THRESHOLD
}

fn default_context_limit() -> u64 {
    DEFAULT_CONTEXT_LIMIT
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

/// Learning log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LearningConfig {
    /// Directory holding `YYYY-MM-DD.jsonl` partitions, relative to the
    /// working directory unless absolute
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Partitions older than this are pruned
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Sessions with fewer user turns are not recorded
    #[serde(default = "default_min_turns")]
    pub min_turns: u32,

    /// Error excerpts kept per record
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,

    /// Tool histogram entries kept per record
    #[serde(default = "default_top_tools")]
    pub top_tools: usize,

    /// Prompt previews kept per record
    #[serde(default = "default_max_prompts")]
    pub max_prompts: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            retention_days: default_retention_days(),
            min_turns: default_min_turns(),
            max_errors: default_max_errors(),
            top_tools: default_top_tools(),
            max_prompts: default_max_prompts(),
        }
    }
}

impl LearningConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 3600)
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".claude/learning/sessions")
}

fn default_retention_days() -> u64 {
    DEFAULT_RETENTION_DAYS
}

fn default_min_turns() -> u32 {
    2
}

fn default_max_errors() -> usize {
    DEFAULT_MAX_ERRORS
}

fn default_top_tools() -> usize {
    DEFAULT_TOP_TOOLS
}

fn default_max_prompts() -> usize {
    3
}

/// Agent host data location
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ClaudeConfig {
    /// Override for the host data root (defaults to `~/.claude`)
    pub root: Option<PathBuf>,
}

impl ClaudeConfig {
    pub fn root_path(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| home_dir().join(".claude"))
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of rotated log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let m = &self.monitor;
        if !(m.warn_threshold > 0.0 && m.warn_threshold < m.stop_threshold) {
            return Err(Error::Config(format!(
                "monitor thresholds must satisfy 0 < warn < stop (got warn={}, stop={})",
                m.warn_threshold, m.stop_threshold
            )));
        }
        if m.context_limit == 0 {
            return Err(Error::Config(
                "monitor.context_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/ctxwatch/config.toml` (~/.config/ctxwatch/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("ctxwatch").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/ctxwatch/` (~/.local/state/ctxwatch/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("ctxwatch")
    }
}
