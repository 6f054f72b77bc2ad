//! Learning log writer
//!
//! Appends one JSON line per qualifying session to a daily partition,
//! `<log_dir>/YYYY-MM-DD.jsonl` (local date), and prunes partitions whose
//! modification time falls outside the retention window.
//!
//! Each line is an [`AnalyticsRecord`] with three envelope fields in front:
//!
//! ```json
//! {"ts":1760000000,"session_id":"0f3c2a9e-77b1-4c","date":"2025-10-09","turn_count":4,...}
//! ```
//!
//! Lines are never deduplicated; running the logger twice for a session
//! appends twice. Write failures are reported as
//! [`AppendOutcome::Discarded`] and per-file prune failures are counted in
//! the [`PruneReport`], so nothing here interrupts the host.

use crate::config::LearningConfig;
use crate::error::Result;
use crate::format::truncate_chars;
use crate::types::AnalyticsRecord;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Characters of the session id kept in a log line.
const SESSION_ID_CHARS: usize = 16;

#[derive(Serialize)]
struct LogEntry<'a> {
    ts: i64,
    session_id: String,
    date: String,
    #[serde(flatten)]
    record: &'a AnalyticsRecord,
}

/// Result of [`LearningLog::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The line was appended to this partition
    Written(PathBuf),
    /// The write failed and was dropped
    Discarded,
}

/// What a prune pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: Vec<PathBuf>,
    pub kept: usize,
    pub failed: usize,
}

/// Date-partitioned append-only analytics log.
#[derive(Debug, Clone)]
pub struct LearningLog {
    dir: PathBuf,
    retention: Duration,
}

impl LearningLog {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn from_config(config: &LearningConfig) -> Self {
        Self::new(&config.log_dir, config.retention())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Partition file for a local date.
    pub fn partition_path(&self, date: &DateTime<Local>) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Append a record for `session_id` to today's partition.
    pub fn append(&self, session_id: &str, record: &AnalyticsRecord) -> AppendOutcome {
        self.append_at(session_id, record, Local::now())
    }

    /// Append a record stamped with `now`.
    pub fn append_at(
        &self,
        session_id: &str,
        record: &AnalyticsRecord,
        now: DateTime<Local>,
    ) -> AppendOutcome {
        let path = self.partition_path(&now);
        match self.try_append(&path, session_id, record, now) {
            Ok(()) => {
                tracing::info!(
                    path = %path.display(),
                    turns = record.turn_count,
                    "Learning entry written"
                );
                AppendOutcome::Written(path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Learning entry discarded");
                AppendOutcome::Discarded
            }
        }
    }

    fn try_append(
        &self,
        path: &Path,
        session_id: &str,
        record: &AnalyticsRecord,
        now: DateTime<Local>,
    ) -> Result<()> {
        let entry = LogEntry {
            ts: now.timestamp(),
            session_id: truncate_chars(session_id, SESSION_ID_CHARS),
            date: now.format("%Y-%m-%d").to_string(),
            record,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        // One write of the whole line so concurrent appenders never interleave
        file.write_all(&line)?;
        Ok(())
    }

    /// Delete partitions last modified before the retention window.
    pub fn prune(&self) -> PruneReport {
        self.prune_at(SystemTime::now())
    }

    /// Prune relative to `now`.
    pub fn prune_at(&self, now: SystemTime) -> PruneReport {
        let mut report = PruneReport::default();
        let Some(cutoff) = now.checked_sub(self.retention) else {
            return report;
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %self.dir.display(), error = %e, "Nothing to prune");
                return report;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Cannot stat partition");
                    report.failed += 1;
                    continue;
                }
            };

            if modified >= cutoff {
                report.kept += 1;
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "Pruned learning partition");
                    report.deleted.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to prune partition");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
