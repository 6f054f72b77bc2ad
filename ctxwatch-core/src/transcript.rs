//! Transcript stream reader
//!
//! Reads a session transcript (`~/.claude/projects/<project>/<session>.jsonl`)
//! one line at a time and yields decoded [`TranscriptRecord`]s in file order.
//!
//! # Error Handling
//!
//! - **Malformed JSON lines** (including invalid UTF-8): skipped, iteration
//!   continues.
//! - **Wrong shape** (valid JSON, not a record we understand): skipped.
//! - **Unknown record types**: decoded as [`TranscriptRecord::Other`]; the
//!   aggregators ignore them.
//! - **File cannot be opened, or a read fails mid-stream**: reported as
//!   [`Error::Unavailable`]. A partial scan is never passed off as a result.
//!
//! The reader holds no state beyond its file handle, so opening the same
//! path again restarts the scan from the first line.

use crate::error::{Error, Result};
use crate::types::TranscriptRecord;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Lazy iterator over the records of one transcript.
///
/// Yields `Err(Error::Unavailable)` at most once, after which it is fused.
pub struct TranscriptReader {
    path: PathBuf,
    reader: BufReader<File>,
    buf: Vec<u8>,
    line_number: usize,
    skipped: usize,
    failed: bool,
}

impl TranscriptReader {
    /// Open a transcript for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            buf: Vec::new(),
            line_number: 0,
            skipped: 0,
            failed: false,
        })
    }

    /// Number of non-empty lines dropped so far because they did not decode.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for TranscriptReader {
    type Item = Result<TranscriptRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(source) => {
                    self.failed = true;
                    return Some(Err(Error::Unavailable {
                        path: self.path.clone(),
                        source,
                    }));
                }
            }
            self.line_number += 1;

            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<TranscriptRecord>(&self.buf) {
                Ok(record) => return Some(Ok(record)),
                Err(e) => {
                    self.skipped += 1;
                    tracing::trace!(
                        path = %self.path.display(),
                        line = self.line_number,
                        error = %e,
                        "Skipping undecodable transcript line"
                    );
                }
            }
        }
    }
}
