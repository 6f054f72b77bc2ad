//! Error types for ctxwatch-core
//!
//! Most failure modes in this crate are absorbed close to where they happen
//! and surface as named outcomes ([`CacheLookup`](crate::cache::CacheLookup),
//! [`AppendOutcome`](crate::learning::AppendOutcome), `Option`). The variants
//! below are what is left for the hook pipelines to log.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the ctxwatch-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transcript could not be opened or read to the end
    #[error("transcript unavailable at {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// True when the error means "the transcript is not there to read".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable { .. })
    }
}

/// Result type alias for ctxwatch-core
pub type Result<T> = std::result::Result<T, Error>;
