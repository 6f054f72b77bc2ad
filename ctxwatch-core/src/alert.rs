//! Threshold alerter
//!
//! Maps a context percentage to one of three levels and renders the
//! advisory for it. Classification is stateless: every invocation looks at
//! the current percentage only.
//!
//! | Level | Condition | Advisory | Exit |
//! |-------|-----------|----------|------|
//! | `Normal` | `p < warn` | none | continue (0) |
//! | `Warn` | `warn <= p < stop` | yellow, wrap up soon | continue (0) |
//! | `Stop` | `p >= stop` | red, reset context | block (2) |

use crate::aggregate::ContextPressure;
use crate::config::{DEFAULT_STOP_THRESHOLD, DEFAULT_WARN_THRESHOLD};
use crate::format::format_thousands;
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Ascending warn/stop percentages. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warn: f64,
    pub stop: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn: DEFAULT_WARN_THRESHOLD,
            stop: DEFAULT_STOP_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn classify(&self, percentage: f64) -> ContextLevel {
        if percentage >= self.stop {
            ContextLevel::Stop
        } else if percentage >= self.warn {
            ContextLevel::Warn
        } else {
            ContextLevel::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextLevel {
    Normal,
    Warn,
    Stop,
}

impl ContextLevel {
    pub fn exit(&self) -> HookExit {
        match self {
            ContextLevel::Stop => HookExit::Block,
            ContextLevel::Normal | ContextLevel::Warn => HookExit::Continue,
        }
    }
}

/// What the hook tells its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookExit {
    Continue,
    /// Host shows stderr to the model and holds the turn
    Block,
}

impl HookExit {
    pub fn code(&self) -> u8 {
        match self {
            HookExit::Continue => 0,
            HookExit::Block => 2,
        }
    }
}

impl From<HookExit> for std::process::ExitCode {
    fn from(exit: HookExit) -> Self {
        std::process::ExitCode::from(exit.code())
    }
}

/// A classified pressure reading, ready to be reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alert {
    pub level: ContextLevel,
    pub pressure: ContextPressure,
    pub thresholds: Thresholds,
}

impl Alert {
    pub fn new(pressure: ContextPressure, thresholds: Thresholds) -> Self {
        Self {
            level: thresholds.classify(pressure.percentage()),
            pressure,
            thresholds,
        }
    }

    pub fn exit(&self) -> HookExit {
        self.level.exit()
    }

    fn usage_label(&self) -> String {
        format!(
            "{:.0}% ({}/{}k)",
            self.pressure.percentage(),
            format_thousands(self.pressure.tokens),
            self.pressure.limit / 1000
        )
    }

    /// Plain advisory lines; empty for `Normal`.
    pub fn lines(&self) -> Vec<String> {
        match self.level {
            ContextLevel::Normal => Vec::new(),
            ContextLevel::Warn => vec![
                format!("Context: {}", self.usage_label()),
                format!(
                    "   Complete current task, wrap up at {}% maximum",
                    self.thresholds.stop
                ),
            ],
            ContextLevel::Stop => vec![
                format!("CONTEXT LIMIT: {}", self.usage_label()),
                "Ask user to run /clear to reset context.".to_string(),
            ],
        }
    }

    /// Write the colored advisory, preceded by a blank line. Writes nothing
    /// for `Normal`.
    pub fn emit<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let lines = self.lines();
        if lines.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        for line in &lines {
            match self.level {
                ContextLevel::Stop => writeln!(out, "{}", line.red())?,
                _ => writeln!(out, "{}", line.yellow())?,
            }
        }
        out.flush()
    }
}
