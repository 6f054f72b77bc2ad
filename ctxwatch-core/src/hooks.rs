//! Hook pipelines
//!
//! The two entry points the host runs:
//!
//! ```text
//! ┌──────────────┐     ┌────────────┐     ┌──────────────────┐     ┌─────────┐
//! │ HookInput /  │ ──► │  Session   │ ──► │ FreshnessCache   │ ──► │ Alert   │  ContextMonitor
//! │ history.jsonl│     │  Locator   │     │  └─ Pressure agg │     │ (stderr)│
//! └──────────────┘     └────────────┘     └──────────────────┘     └─────────┘
//!                            │
//!                            ▼
//!                  ┌──────────────────────┐     ┌─────────────┐
//!                  │ SessionSummary agg   │ ──► │ LearningLog │                LearningLogger
//!                  └──────────────────────┘     └─────────────┘
//! ```
//!
//! Neither pipeline returns an error. A missing session, transcript or
//! usage snapshot ends the run quietly with [`HookExit::Continue`]; only a
//! stop-level alert blocks.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ctxwatch_core::{Config, ContextMonitor, HookInput, HOOK_INPUT_TIMEOUT};
//!
//! let config = Config::default();
//! let hook = HookInput::from_stdin(HOOK_INPUT_TIMEOUT);
//! let exit = ContextMonitor::from_config(&config).run(&hook, &mut std::io::stderr());
//! std::process::exit(exit.code() as i32);
//! ```

use crate::aggregate::{
    aggregate, ContextPressure, PressureAggregator, SessionSummaryAggregator, SummaryLimits,
};
use crate::alert::{Alert, HookExit, Thresholds};
use crate::cache::{CacheLookup, FreshnessCache};
use crate::config::Config;
use crate::learning::{AppendOutcome, LearningLog, PruneReport};
use crate::session::{HookInput, SessionLocator};
use crate::types::AnalyticsRecord;
use std::io::Write;

/// Periodic context pressure check.
#[derive(Debug, Clone)]
pub struct ContextMonitor {
    locator: SessionLocator,
    cache: Option<FreshnessCache>,
    context_limit: u64,
    thresholds: Thresholds,
}

impl ContextMonitor {
    pub fn new(
        locator: SessionLocator,
        cache: Option<FreshnessCache>,
        context_limit: u64,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            locator,
            cache,
            context_limit,
            thresholds,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SessionLocator::from_config(&config.claude),
            Some(FreshnessCache::from_config(&config.monitor)),
            config.monitor.context_limit,
            config.monitor.thresholds(),
        )
    }

    /// Always rescan the transcript and leave the cache untouched.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Current pressure for the active session, or `None` if there is no
    /// session, no transcript, or no usage reported yet.
    pub fn measure(&self, hook: &HookInput) -> Option<ContextPressure> {
        let session_id = self.locator.resolve_session_id(hook)?;

        if let Some(cache) = &self.cache {
            if let CacheLookup::Hit(tokens) = cache.read(&session_id) {
                return Some(ContextPressure::new(tokens, self.context_limit));
            }
        }

        let Some(transcript) = self.locator.resolve_transcript(&session_id, hook) else {
            tracing::debug!(session_id = %session_id, "No transcript for session");
            return None;
        };

        let snapshot = match aggregate(&transcript, PressureAggregator::new()) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!(path = %transcript.display(), "No usage reported yet");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %transcript.display(), error = %e, "Transcript unavailable");
                return None;
            }
        };

        let pressure = ContextPressure::from_snapshot(&snapshot, self.context_limit);
        if let Some(cache) = &self.cache {
            cache.write(&session_id, pressure.tokens);
        }
        Some(pressure)
    }

    /// Classified alert for the active session.
    pub fn check(&self, hook: &HookInput) -> Option<Alert> {
        self.measure(hook)
            .map(|pressure| Alert::new(pressure, self.thresholds))
    }

    /// Measure, write any advisory to `out`, and return the exit decision.
    pub fn run<W: Write>(&self, hook: &HookInput, out: &mut W) -> HookExit {
        let Some(alert) = self.check(hook) else {
            return HookExit::Continue;
        };

        tracing::info!(
            tokens = alert.pressure.tokens,
            percentage = alert.pressure.percentage(),
            level = ?alert.level,
            "Context pressure checked"
        );

        if let Err(e) = alert.emit(out) {
            tracing::warn!(error = %e, "Failed to write advisory");
        }
        alert.exit()
    }
}

/// What a learning run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearningOutcome {
    /// No session, no transcript, or too few turns
    Skipped,
    Appended {
        outcome: AppendOutcome,
        pruned: Option<PruneReport>,
    },
}

/// Session-end analytics writer.
#[derive(Debug, Clone)]
pub struct LearningLogger {
    locator: SessionLocator,
    limits: SummaryLimits,
    log: LearningLog,
    prune: bool,
}

impl LearningLogger {
    pub fn new(locator: SessionLocator, limits: SummaryLimits, log: LearningLog) -> Self {
        Self {
            locator,
            limits,
            log,
            prune: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SessionLocator::from_config(&config.claude),
            SummaryLimits::from(&config.learning),
            LearningLog::from_config(&config.learning),
        )
    }

    /// Skip the retention pass after appending.
    pub fn without_prune(mut self) -> Self {
        self.prune = false;
        self
    }

    /// Session id and analytics record for the active session, if it
    /// qualifies.
    pub fn summarize(&self, hook: &HookInput) -> Option<(String, AnalyticsRecord)> {
        let session_id = self.locator.resolve_session_id(hook)?;
        let Some(transcript) = self.locator.resolve_transcript(&session_id, hook) else {
            tracing::debug!(session_id = %session_id, "No transcript for session");
            return None;
        };

        match aggregate(&transcript, SessionSummaryAggregator::new(self.limits)) {
            Ok(Some(record)) => Some((session_id, record)),
            Ok(None) => {
                tracing::debug!(session_id = %session_id, "Session too short to record");
                None
            }
            Err(e) => {
                tracing::warn!(path = %transcript.display(), error = %e, "Transcript unavailable");
                None
            }
        }
    }

    /// Summarize, append, and prune. Pruning follows any run that produced a
    /// record, even when the append was discarded.
    pub fn run(&self, hook: &HookInput) -> LearningOutcome {
        let Some((session_id, record)) = self.summarize(hook) else {
            return LearningOutcome::Skipped;
        };

        let outcome = self.log.append(&session_id, &record);
        let pruned = self.prune.then(|| self.log.prune());

        LearningOutcome::Appended { outcome, pruned }
    }
}
