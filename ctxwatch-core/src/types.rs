//! Core domain types for ctxwatch
//!
//! Two families live here:
//!
//! - **Transcript types** ([`TranscriptRecord`] and friends) are read-only
//!   views over the host's JSONL transcript. They deserialize leniently:
//!   unknown record types and unknown content blocks are kept as opaque
//!   variants instead of failing the line.
//! - **Derived types** ([`UsageSnapshot`], [`AnalyticsRecord`]) are what the
//!   aggregators produce and what gets persisted.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One continuous interactive run, identified by an opaque id |
//! | **Transcript** | The append-only JSONL log the host writes for a session |
//! | **Turn** | One `user` record in the transcript |
//! | **Pressure** | Context tokens in use as a percentage of the budget |

use serde::de::IgnoredAny;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

// ============================================
// Transcript records
// ============================================

/// One decoded line of a session transcript, discriminated by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TranscriptRecord {
    /// A human turn
    User {
        #[serde(default)]
        message: UserMessage,
    },
    /// A model turn with usage and content blocks
    Assistant {
        #[serde(default)]
        message: AssistantMessage,
    },
    /// A tool execution result
    Tool {
        #[serde(default)]
        content: Option<serde_json::Value>,
    },
    /// Any other record type (summaries, snapshots, system records)
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserMessage {
    pub content: MessageContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssistantMessage {
    pub usage: Option<UsageSnapshot>,
    #[serde(deserialize_with = "lenient_blocks")]
    pub content: Vec<ContentBlock>,
}

/// Message content: either a bare string or an ordered list of typed blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    #[serde(deserialize_with = "lenient_blocks")]
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Text of the content, whichever shape it arrived in.
    ///
    /// A bare string is returned as is; for block lists the first non-empty
    /// `text` block wins.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Blocks(blocks) => blocks.iter().find_map(|b| match b {
                ContentBlock::Text { text } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    pub fn is_bare_text(&self) -> bool {
        matches!(self, MessageContent::Text(_))
    }
}

/// A typed content block inside a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: serde_json::Value,
    },
    // Catch-all for unknown block types (thinking, tool_result, image, ...)
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    /// Tool name for `tool_use` blocks; nameless invocations count as `unknown`.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ContentBlock::ToolUse { name, .. } => Some(name.as_deref().unwrap_or("unknown")),
            _ => None,
        }
    }

    /// String field of a `tool_use` block's input.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        match self {
            ContentBlock::ToolUse { input, .. } => input.get(key).and_then(|v| v.as_str()),
            _ => None,
        }
    }
}

/// Keeps the blocks that decode and drops the rest, so one odd block does
/// not cost the whole record. Anything that is not a list reads as no blocks.
fn lenient_blocks<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Slot {
        Block(ContentBlock),
        Skipped(IgnoredAny),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        List(Vec<Slot>),
        Other(IgnoredAny),
    }

    let blocks = match Shape::deserialize(deserializer)? {
        Shape::List(slots) => slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Block(block) => Some(block),
                Slot::Skipped(_) => None,
            })
            .collect(),
        Shape::Other(_) => Vec::new(),
    };
    Ok(blocks)
}

// ============================================
// Usage
// ============================================

/// Token usage attached to an assistant record.
///
/// The host reports context-related fields cumulatively, so pressure reads
/// the last snapshot only. `output_tokens` is per turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSnapshot {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cache_creation_input_tokens: Option<u64>,
    pub cache_read_input_tokens: Option<u64>,
}

impl UsageSnapshot {
    /// Snapshot with only the context fields set.
    pub fn context(input: u64, cache_creation: u64, cache_read: u64) -> Self {
        Self {
            input_tokens: Some(input),
            output_tokens: None,
            cache_creation_input_tokens: Some(cache_creation),
            cache_read_input_tokens: Some(cache_read),
        }
    }

    /// True for `usage: {}`, which the host emits on some partial records.
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none()
            && self.output_tokens.is_none()
            && self.cache_creation_input_tokens.is_none()
            && self.cache_read_input_tokens.is_none()
    }

    /// Tokens occupying the context window.
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens
            .unwrap_or(0)
            .saturating_add(self.cache_creation_input_tokens.unwrap_or(0))
            .saturating_add(self.cache_read_input_tokens.unwrap_or(0))
    }
}

// ============================================
// Analytics
// ============================================

/// Known shell command families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandCategory {
    Git,
    Gh,
    Gemini,
    Opencode,
}

impl CommandCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandCategory::Git => "git",
            CommandCategory::Gh => "gh",
            CommandCategory::Gemini => "gemini",
            CommandCategory::Opencode => "opencode",
        }
    }
}

impl std::fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool name -> call count, most frequent first.
///
/// Serialized as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolHistogram(Vec<(String, u64)>);

impl ToolHistogram {
    pub fn new(entries: Vec<(String, u64)>) -> Self {
        Self(entries)
    }

    pub fn get(&self, tool: &str) -> Option<u64> {
        self.0
            .iter()
            .find(|(name, _)| name == tool)
            .map(|(_, count)| *count)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

impl Serialize for ToolHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, count) in &self.0 {
            map.serialize_entry(name, count)?;
        }
        map.end()
    }
}

/// Token totals summed over all assistant records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

/// Per-session summary persisted to the learning log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsRecord {
    pub turn_count: u32,
    pub tools_called: ToolHistogram,
    pub agents_spawned: Vec<String>,
    pub commands_used: BTreeSet<CommandCategory>,
    pub slash_commands: Vec<String>,
    pub errors: Vec<String>,
    pub tokens: TokenTotals,
    pub user_prompts_preview: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_record_type_is_other() {
        let record: TranscriptRecord =
            serde_json::from_str(r#"{"type":"file-history-snapshot","snapshot":{}}"#).unwrap();
        assert!(matches!(record, TranscriptRecord::Other));
    }

    #[test]
    fn test_user_text_from_string_and_blocks() {
        let record: TranscriptRecord =
            serde_json::from_str(r#"{"type":"user","message":{"content":"plain prompt"}}"#)
                .unwrap();
        let TranscriptRecord::User { message } = record else {
            panic!("expected user record");
        };
        assert_eq!(message.content.text(), Some("plain prompt"));
        assert!(message.content.is_bare_text());

        let record: TranscriptRecord = serde_json::from_str(
            r#"{"type":"user","message":{"content":[
                {"type":"tool_result","tool_use_id":"t1","content":"ok"},
                {"type":"text","text":"first text"},
                {"type":"text","text":"second text"}
            ]}}"#,
        )
        .unwrap();
        let TranscriptRecord::User { message } = record else {
            panic!("expected user record");
        };
        assert_eq!(message.content.text(), Some("first text"));
    }

    #[test]
    fn test_user_text_skips_empty_blocks() {
        let content: MessageContent = serde_json::from_str(
            r#"[{"type":"text","text":""},{"type":"text","text":"/deploy now please"}]"#,
        )
        .unwrap();
        assert_eq!(content.text(), Some("/deploy now please"));
        assert!(!content.is_bare_text());

        let content: MessageContent = serde_json::from_str(r#"[{"type":"text","text":""}]"#).unwrap();
        assert_eq!(content.text(), None);
    }

    #[test]
    fn test_non_object_blocks_are_dropped() {
        let record: TranscriptRecord = serde_json::from_str(
            r#"{"type":"assistant","message":{"content":["stray", 7, {"type":"tool_use","name":"Read","input":{}}]}}"#,
        )
        .unwrap();
        let TranscriptRecord::Assistant { message } = record else {
            panic!("expected assistant record");
        };
        assert_eq!(message.content.len(), 1);
        assert_eq!(message.content[0].tool_name(), Some("Read"));
    }

    #[test]
    fn test_nameless_tool_use_counts_as_unknown() {
        let block: ContentBlock =
            serde_json::from_str(r#"{"type":"tool_use","input":{"command":"ls"}}"#).unwrap();
        assert_eq!(block.tool_name(), Some("unknown"));
        assert_eq!(block.input_str("command"), Some("ls"));
    }

    #[test]
    fn test_usage_context_tokens() {
        let usage: UsageSnapshot = serde_json::from_str(
            r#"{"input_tokens":10,"cache_creation_input_tokens":200,"cache_read_input_tokens":3000,"output_tokens":5}"#,
        )
        .unwrap();
        assert_eq!(usage.context_tokens(), 3210);
        assert!(!usage.is_empty());

        let empty: UsageSnapshot = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.context_tokens(), 0);
    }

    #[test]
    fn test_tool_histogram_serializes_in_order() {
        let histogram = ToolHistogram::new(vec![("Bash".to_string(), 5), ("Read".to_string(), 3)]);
        let json = serde_json::to_string(&histogram).unwrap();
        assert_eq!(json, r#"{"Bash":5,"Read":3}"#);
        assert_eq!(histogram.get("Read"), Some(3));
        assert_eq!(histogram.get("Edit"), None);
    }
}
