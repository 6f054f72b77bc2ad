//! Session locator
//!
//! Works out which session is active and where its transcript lives, using
//! the host's own files under `~/.claude`:
//!
//! - `history.jsonl`: append-only; the last line's `sessionId` names the
//!   active session.
//! - `projects/<encoded-project>/<session-id>.jsonl`: one transcript per
//!   session, partitioned by project.
//!
//! A hook payload on stdin ([`HookInput`]) takes precedence when the host
//! provides one. Only the first JSON value is read, and only for up to
//! [`HOOK_INPUT_TIMEOUT`]. Every lookup here is read-only and absence is
//! reported as `None`, never as an error.

use crate::config::ClaudeConfig;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How long a hook waits for its stdin payload before going on without one.
pub const HOOK_INPUT_TIMEOUT: Duration = Duration::from_secs(2);

/// Payload the host writes to a hook's stdin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookInput {
    pub session_id: Option<String>,
    pub transcript_path: Option<PathBuf>,
    pub hook_event_name: Option<String>,
}

impl HookInput {
    /// Decode the first JSON value from `reader`, treating empty or malformed
    /// input as "no payload".
    ///
    /// Returns as soon as that value is complete; nothing after it is read.
    pub fn from_reader<R: Read>(reader: R) -> Self {
        let mut values = serde_json::Deserializer::from_reader(reader).into_iter::<Self>();
        match values.next() {
            Some(Ok(input)) => input,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Ignoring malformed hook payload");
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        Self::from_reader(raw.as_bytes())
    }

    /// Read the payload from the process's stdin, giving up after `timeout`.
    ///
    /// A terminal on stdin means no host is driving the hook. The reader
    /// thread is left behind on timeout; it ends with the process.
    pub fn from_stdin(timeout: Duration) -> Self {
        if std::io::stdin().is_terminal() {
            return Self::default();
        }
        Self::from_background_reader(|| std::io::stdin().lock(), timeout)
    }

    fn from_background_reader<R, F>(open: F, timeout: Duration) -> Self
    where
        R: Read,
        F: FnOnce() -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver is gone once the wait timed out
            let _ = tx.send(Self::from_reader(open()));
        });

        match rx.recv_timeout(timeout) {
            Ok(input) => input,
            Err(e) => {
                tracing::debug!(error = %e, "No hook payload, continuing without one");
                Self::default()
            }
        }
    }

    /// Apply command-line overrides on top of the payload.
    ///
    /// An explicit transcript without an explicit session takes its session
    /// id from the file stem. An explicit session other than the payload's
    /// drops the payload's transcript path. Either way the cache and log key
    /// match the transcript actually read.
    pub fn with_overrides(
        mut self,
        session_id: Option<String>,
        transcript: Option<PathBuf>,
    ) -> Self {
        match (session_id, transcript) {
            (None, None) => {}
            (None, Some(path)) => {
                self.session_id = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned());
                self.transcript_path = Some(path);
            }
            (Some(id), None) => {
                if self.session_id.as_deref() != Some(id.as_str()) {
                    self.transcript_path = None;
                }
                self.session_id = Some(id);
            }
            (Some(id), Some(path)) => {
                self.session_id = Some(id);
                self.transcript_path = Some(path);
            }
        }
        self
    }

    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
}

/// Finds the active session and its transcript.
#[derive(Debug, Clone)]
pub struct SessionLocator {
    root: PathBuf,
}

impl SessionLocator {
    /// Create a locator over a host data root (normally `~/.claude`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &ClaudeConfig) -> Self {
        Self::new(config.root_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join("history.jsonl")
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// Session id from the last line of the history pointer file.
    ///
    /// Returns `None` if the file is missing, empty, unreadable, or its last
    /// line does not carry a non-empty `sessionId`.
    pub fn current_session_id(&self) -> Option<String> {
        let path = self.history_path();
        let file = File::open(&path).ok()?;

        let mut last_line = None;
        for line in BufReader::new(file).lines() {
            match line {
                Ok(line) => last_line = Some(line),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "History unreadable");
                    return None;
                }
            }
        }

        let entry: HistoryEntry = serde_json::from_str(&last_line?).ok()?;
        entry.session_id.filter(|id| !id.is_empty())
    }

    /// Active session id, preferring the hook payload over the history file.
    pub fn resolve_session_id(&self, hook: &HookInput) -> Option<String> {
        hook.session_id()
            .map(str::to_string)
            .or_else(|| self.current_session_id())
    }

    /// Path of `<session_id>.jsonl` under any project partition.
    pub fn find_transcript(&self, session_id: &str) -> Option<PathBuf> {
        if !is_plain_file_stem(session_id) {
            tracing::debug!(session_id, "Refusing session id that is not a plain file stem");
            return None;
        }

        let projects = glob::Pattern::escape(&self.projects_dir().to_string_lossy());
        let pattern = Path::new(&projects)
            .join("*")
            .join(format!("{}.jsonl", glob::Pattern::escape(session_id)));

        let entries = glob::glob(&pattern.to_string_lossy()).ok()?;
        entries.flatten().find(|path| path.is_file())
    }

    /// Transcript for a session, preferring an existing path from the hook
    /// payload over a search of the project partitions.
    pub fn resolve_transcript(&self, session_id: &str, hook: &HookInput) -> Option<PathBuf> {
        hook.transcript_path
            .as_ref()
            .filter(|path| path.is_file())
            .cloned()
            .or_else(|| self.find_transcript(session_id))
    }
}

pub(crate) fn is_plain_file_stem(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}
