//! Session summary for the learning log
//!
//! Collects, in one pass over the transcript:
//!
//! | Field | Source |
//! |-------|--------|
//! | `turn_count` | every `user` record |
//! | `user_prompts_preview` | first few user prompts with text |
//! | `tokens` | `usage.input_tokens` / `usage.output_tokens`, summed over assistant records |
//! | `tools_called` | `tool_use` blocks by name, top N |
//! | `agents_spawned` | `Task` tool `subagent_type`, in order |
//! | `commands_used` | `Bash` tool commands matched against `COMMAND_RULES` |
//! | `errors` | `tool` records mentioning "error" or "failed" |
//! | `slash_commands` | `/command` tokens in the captured prompts |
//!
//! Unlike the pressure reading, token totals are additive: they sum the
//! per-turn counts the host reports on each assistant record.

use super::Aggregator;
use crate::config::LearningConfig;
use crate::format::truncate_chars;
use crate::types::{
    AnalyticsRecord, CommandCategory, ContentBlock, MessageContent, TokenTotals, ToolHistogram,
    TranscriptRecord,
};
use std::collections::{BTreeSet, HashMap};

/// Tool that spawns a sub-agent.
const SUBAGENT_TOOL: &str = "Task";
/// Tool that runs a shell command.
const SHELL_TOOL: &str = "Bash";

/// Characters kept per captured prompt (scanned for slash commands).
const PROMPT_CAPTURE_CHARS: usize = 200;
/// Characters kept per persisted prompt preview.
const PROMPT_PREVIEW_CHARS: usize = 100;
/// Bare-string prompts this short are not worth a preview.
const MIN_BARE_PROMPT_CHARS: usize = 10;
/// Characters kept per error excerpt.
const ERROR_EXCERPT_CHARS: usize = 300;

const ERROR_MARKERS: &[&str] = &["error", "failed"];

enum CommandMatch {
    Prefix(&'static str),
    Contains(&'static str),
}

/// Ordered shell command rules; the first match wins.
const COMMAND_RULES: &[(CommandMatch, CommandCategory)] = &[
    (CommandMatch::Prefix("git "), CommandCategory::Git),
    (CommandMatch::Prefix("gh "), CommandCategory::Gh),
    (CommandMatch::Contains("gemini"), CommandCategory::Gemini),
    (CommandMatch::Contains("opencode"), CommandCategory::Opencode),
];

/// Best-effort command family detection. Unmatched commands return `None`.
pub fn classify_command(command: &str) -> Option<CommandCategory> {
    COMMAND_RULES
        .iter()
        .find(|(rule, _)| match rule {
            CommandMatch::Prefix(prefix) => command.starts_with(prefix),
            CommandMatch::Contains(needle) => command.contains(needle),
        })
        .map(|(_, category)| *category)
}

/// Caps applied while summarizing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLimits {
    /// Sessions with fewer user turns produce no record
    pub min_turns: u32,
    pub max_errors: usize,
    pub top_tools: usize,
    pub max_prompts: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self::from(&LearningConfig::default())
    }
}

impl From<&LearningConfig> for SummaryLimits {
    fn from(config: &LearningConfig) -> Self {
        Self {
            min_turns: config.min_turns,
            max_errors: config.max_errors,
            top_tools: config.top_tools,
            max_prompts: config.max_prompts,
        }
    }
}

/// Builds an [`AnalyticsRecord`] from a session transcript.
#[derive(Debug, Default)]
pub struct SessionSummaryAggregator {
    limits: SummaryLimits,
    turn_count: u32,
    prompts: Vec<String>,
    tokens: TokenTotals,
    // Counts in first-seen order, so ties keep a stable order after sorting
    tool_counts: Vec<(String, u64)>,
    tool_index: HashMap<String, usize>,
    agents_spawned: Vec<String>,
    commands_used: BTreeSet<CommandCategory>,
    errors: Vec<String>,
}

impl SessionSummaryAggregator {
    pub fn new(limits: SummaryLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }

    fn observe_prompt(&mut self, content: &MessageContent) {
        if self.prompts.len() >= self.limits.max_prompts {
            return;
        }

        let Some(text) = content.text() else {
            return;
        };
        if content.is_bare_text() && text.chars().count() <= MIN_BARE_PROMPT_CHARS {
            return;
        }

        self.prompts.push(truncate_chars(text, PROMPT_CAPTURE_CHARS));
    }

    fn observe_tool_use(&mut self, block: &ContentBlock) {
        let Some(name) = block.tool_name() else {
            return;
        };

        match self.tool_index.get(name).copied() {
            Some(i) => self.tool_counts[i].1 += 1,
            None => {
                self.tool_index.insert(name.to_string(), self.tool_counts.len());
                self.tool_counts.push((name.to_string(), 1));
            }
        }

        match name {
            SUBAGENT_TOOL => {
                let agent = block.input_str("subagent_type").unwrap_or("unknown");
                self.agents_spawned.push(agent.to_string());
            }
            SHELL_TOOL => {
                if let Some(category) = block.input_str("command").and_then(classify_command) {
                    self.commands_used.insert(category);
                }
            }
            _ => {}
        }
    }

    fn observe_tool_result(&mut self, content: Option<&serde_json::Value>) {
        if self.errors.len() >= self.limits.max_errors {
            return;
        }

        let Some(text) = content.and_then(|c| c.as_str()) else {
            return;
        };

        let lowered = text.to_lowercase();
        if ERROR_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            self.errors.push(truncate_chars(text, ERROR_EXCERPT_CHARS));
        }
    }
}

impl Aggregator for SessionSummaryAggregator {
    /// `None` for sessions below the minimum turn count.
    type Output = Option<AnalyticsRecord>;

    fn observe(&mut self, record: &TranscriptRecord) {
        match record {
            TranscriptRecord::User { message } => {
                self.turn_count += 1;
                self.observe_prompt(&message.content);
            }
            TranscriptRecord::Assistant { message } => {
                if let Some(usage) = &message.usage {
                    self.tokens.input = self
                        .tokens
                        .input
                        .saturating_add(usage.input_tokens.unwrap_or(0));
                    self.tokens.output = self
                        .tokens
                        .output
                        .saturating_add(usage.output_tokens.unwrap_or(0));
                }
                for block in &message.content {
                    self.observe_tool_use(block);
                }
            }
            TranscriptRecord::Tool { content } => self.observe_tool_result(content.as_ref()),
            TranscriptRecord::Other => {}
        }
    }

    fn finish(self) -> Self::Output {
        if self.turn_count < self.limits.min_turns {
            tracing::debug!(
                turns = self.turn_count,
                min_turns = self.limits.min_turns,
                "Session too short to summarize"
            );
            return None;
        }

        let slash_commands = self
            .prompts
            .iter()
            .flat_map(|prompt| prompt.split_whitespace())
            .filter(|word| word.len() > 1 && word.starts_with('/') && !word.starts_with("//"))
            .map(str::to_lowercase)
            .collect();

        let mut tools = self.tool_counts;
        // Stable sort keeps first-seen order among equal counts
        tools.sort_by(|a, b| b.1.cmp(&a.1));
        tools.truncate(self.limits.top_tools);

        let user_prompts_preview = self
            .prompts
            .iter()
            .map(|p| truncate_chars(p, PROMPT_PREVIEW_CHARS))
            .collect();

        Some(AnalyticsRecord {
            turn_count: self.turn_count,
            tools_called: ToolHistogram::new(tools),
            agents_spawned: self.agents_spawned,
            commands_used: self.commands_used,
            slash_commands,
            errors: self.errors,
            tokens: TokenTotals {
                total: self.tokens.input.saturating_add(self.tokens.output),
                ..self.tokens
            },
            user_prompts_preview,
        })
    }
}
