//! Freshness cache for context pressure
//!
//! The monitor hook can fire after every tool call. Re-reading a long
//! transcript each time is wasteful, so the last computed token count is
//! kept per session in `<cache_dir>/<session>.json`:
//!
//! ```json
//! {"tokens": 131072, "timestamp": 1760000000.25}
//! ```
//!
//! An entry is a hit only while `now - timestamp < ttl`. Any problem with
//! the cache directory (missing, unreadable, unwritable, torn write from a
//! concurrent hook) turns into a miss or a discarded write. The cost of a
//! cache failure is one extra transcript scan, never an error.

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::session::is_plain_file_stem;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// On-disk cache entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct CacheEntry {
    tokens: u64,
    /// Seconds since the Unix epoch, fractional
    timestamp: f64,
}

/// Result of a cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// Fresh value; no need to rescan the transcript
    Hit(u64),
    /// No usable entry; the caller recomputes
    Miss,
}

impl CacheLookup {
    /// The `(value, hit)` view: `(0, false)` on a miss.
    pub fn as_pair(&self) -> (u64, bool) {
        match self {
            CacheLookup::Hit(tokens) => (*tokens, true),
            CacheLookup::Miss => (0, false),
        }
    }
}

/// Result of a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Stored,
    /// The write failed and was dropped
    Discarded,
}

/// Per-session token count cache with a time-to-live.
#[derive(Debug, Clone)]
pub struct FreshnessCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FreshnessCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.cache_dir(), config.cache_ttl())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, session_id: &str) -> Option<PathBuf> {
        is_plain_file_stem(session_id).then(|| self.dir.join(format!("{}.json", session_id)))
    }

    /// Look up a session's cached token count.
    pub fn read(&self, session_id: &str) -> CacheLookup {
        self.read_at(session_id, unix_now())
    }

    /// Look up as of `now` (seconds since the epoch).
    pub fn read_at(&self, session_id: &str, now: f64) -> CacheLookup {
        let Some(path) = self.entry_path(session_id) else {
            return CacheLookup::Miss;
        };

        let entry = match Self::load(&path) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::trace!(path = %path.display(), error = %e, "Cache miss");
                return CacheLookup::Miss;
            }
        };

        let age = now - entry.timestamp;
        if age < self.ttl.as_secs_f64() {
            tracing::debug!(session_id, tokens = entry.tokens, age, "Cache hit");
            CacheLookup::Hit(entry.tokens)
        } else {
            tracing::debug!(session_id, age, "Cache entry stale");
            CacheLookup::Miss
        }
    }

    fn load(path: &Path) -> Result<CacheEntry> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Store a session's token count stamped with the current time.
    pub fn write(&self, session_id: &str, tokens: u64) -> CacheWrite {
        self.write_at(session_id, tokens, unix_now())
    }

    /// Store a session's token count stamped with `now`.
    pub fn write_at(&self, session_id: &str, tokens: u64, now: f64) -> CacheWrite {
        let Some(path) = self.entry_path(session_id) else {
            return CacheWrite::Discarded;
        };

        let entry = CacheEntry {
            tokens,
            timestamp: now,
        };
        match self.try_write(&path, &entry) {
            Ok(()) => CacheWrite::Stored,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Cache write discarded");
                CacheWrite::Discarded
            }
        }
    }

    fn try_write(&self, path: &Path, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        // Write-then-rename so a concurrent reader sees the old or the new
        // entry, never half of one
        let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&tmp, serde_json::to_vec(entry)?)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
