//! Transcript aggregation
//!
//! An [`Aggregator`] folds the record stream of one transcript into a single
//! output. Two are built in:
//!
//! | Aggregator | Output | Used by |
//! |------------|--------|---------|
//! | [`PressureAggregator`] | last non-empty [`UsageSnapshot`](crate::types::UsageSnapshot) | context monitor |
//! | [`SessionSummaryAggregator`] | [`AnalyticsRecord`](crate::types::AnalyticsRecord) for qualifying sessions | learning logger |
//!
//! Aggregators only read records, so running them in one pass (a tuple of
//! aggregators is itself an aggregator) or in separate passes gives the same
//! results.

mod pressure;
mod summary;

pub use pressure::{ContextPressure, PressureAggregator};
pub use summary::{classify_command, SessionSummaryAggregator, SummaryLimits};

use crate::error::Result;
use crate::transcript::TranscriptReader;
use crate::types::TranscriptRecord;
use std::path::Path;

/// Folds transcript records into an output value.
pub trait Aggregator {
    type Output;

    /// Called once per decoded record, in file order.
    fn observe(&mut self, record: &TranscriptRecord);

    /// Consume the aggregator after the last record.
    fn finish(self) -> Self::Output;
}

impl<A: Aggregator, B: Aggregator> Aggregator for (A, B) {
    type Output = (A::Output, B::Output);

    fn observe(&mut self, record: &TranscriptRecord) {
        self.0.observe(record);
        self.1.observe(record);
    }

    fn finish(self) -> Self::Output {
        (self.0.finish(), self.1.finish())
    }
}

/// Run an aggregator over every record of the transcript at `path`.
///
/// Returns [`Error::Unavailable`](crate::Error::Unavailable) if the file
/// cannot be opened or read to the end; undecodable lines are skipped.
pub fn aggregate<A: Aggregator>(path: &Path, mut aggregator: A) -> Result<A::Output> {
    let mut reader = TranscriptReader::open(path)?;
    let mut records = 0usize;

    for record in reader.by_ref() {
        aggregator.observe(&record?);
        records += 1;
    }

    tracing::debug!(
        path = %path.display(),
        records,
        skipped = reader.skipped(),
        "Transcript aggregated"
    );

    Ok(aggregator.finish())
}
