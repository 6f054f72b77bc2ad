//! Context pressure
//!
//! The host reports input, cache-creation and cache-read tokens as running
//! totals on every assistant record, so the last snapshot in file order is
//! the current context size. Snapshots are never summed.

use super::Aggregator;
use crate::types::{TranscriptRecord, UsageSnapshot};

/// Keeps the last non-empty usage snapshot seen on an assistant record.
#[derive(Debug, Default)]
pub struct PressureAggregator {
    last: Option<UsageSnapshot>,
}

impl PressureAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for PressureAggregator {
    type Output = Option<UsageSnapshot>;

    fn observe(&mut self, record: &TranscriptRecord) {
        if let TranscriptRecord::Assistant { message } = record {
            if let Some(usage) = message.usage.filter(|u| !u.is_empty()) {
                self.last = Some(usage);
            }
        }
    }

    fn finish(self) -> Self::Output {
        self.last
    }
}

/// Context tokens in use against a fixed budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextPressure {
    pub tokens: u64,
    pub limit: u64,
}

impl ContextPressure {
    pub fn new(tokens: u64, limit: u64) -> Self {
        Self { tokens, limit }
    }

    pub fn from_snapshot(snapshot: &UsageSnapshot, limit: u64) -> Self {
        Self::new(snapshot.context_tokens(), limit)
    }

    /// Percentage of the budget in use. Can exceed 100.
    pub fn percentage(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        (self.tokens as f64 * 100.0) / self.limit as f64
    }
}
