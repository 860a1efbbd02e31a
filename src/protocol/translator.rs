//! Protocol translator: raw agent records → canonical domain events.
//!
//! Pure mapping with no state and no failure path. One raw record yields
//! zero, one or many [`DomainEvent`]s; composite assistant turns are split
//! into one event per meaningful content block, in block order. Anything
//! unrecognised degrades to a generic output event carrying the payload.

use serde_json::{json, Map, Value};

use super::codex;
use super::record::{first_str, ContentBlock, MessageBody, RawRecord};
use crate::models::event::EventKind;

/// Tool results are cut to this many characters.
pub const TOOL_RESULT_MAX_CHARS: usize = 300;

/// Runtime identifier whose records go through the Codex normalizer.
pub const CODEX_RUNTIME: &str = "codex";

/// A canonical event produced from one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// Non-blank reasoning.
    Thinking {
        /// Reasoning text.
        text: String,
    },
    /// Tool invocation.
    ToolCall {
        /// Tool name.
        tool: String,
        /// Tool arguments.
        input: Value,
        /// Correlation id.
        tool_use_id: Option<String>,
    },
    /// Tool response, truncated to [`TOOL_RESULT_MAX_CHARS`].
    ToolResult {
        /// Result text.
        result: String,
        /// Id of the originating tool call.
        tool_use_id: Option<String>,
    },
    /// Non-blank narration.
    Output {
        /// Narration text.
        text: String,
    },
    /// The run's final result.
    FinalOutput {
        /// Result text, if the record had one.
        text: Option<String>,
        /// Total cost in USD, if reported.
        cost_usd: Option<f64>,
    },
    /// An unrecognised record carried verbatim.
    RawOutput(Value),
    /// A runtime-reported error carried as output.
    ErrorOutput(Value),
    /// File modifications.
    FileChange(Value),
}

impl DomainEvent {
    /// Canonical kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Thinking { .. } => EventKind::Thinking,
            Self::ToolCall { .. } => EventKind::ToolCall,
            Self::ToolResult { .. } => EventKind::ToolResult,
            Self::Output { .. }
            | Self::FinalOutput { .. }
            | Self::RawOutput(_)
            | Self::ErrorOutput(_) => EventKind::Output,
            Self::FileChange(_) => EventKind::FileChange,
        }
    }

    /// Payload object stored on the canonical event.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Thinking { text } | Self::Output { text } => json!({ "text": text }),
            Self::ToolCall {
                tool,
                input,
                tool_use_id,
            } => json!({ "tool": tool, "input": input, "toolUseId": tool_use_id }),
            Self::ToolResult {
                result,
                tool_use_id,
            } => json!({ "result": result, "toolUseId": tool_use_id }),
            Self::FinalOutput { text, cost_usd } => {
                let mut payload = json!({ "text": text, "isFinal": true });
                if let (Some(cost), Some(map)) = (cost_usd, payload.as_object_mut()) {
                    map.insert("cost".into(), json!(cost));
                }
                payload
            }
            Self::RawOutput(raw) | Self::FileChange(raw) => raw.clone(),
            Self::ErrorOutput(raw) => {
                let mut map = match raw {
                    Value::Object(map) => map.clone(),
                    other => {
                        let mut map = Map::new();
                        map.insert("raw".into(), other.clone());
                        map
                    }
                };
                map.insert("isError".into(), Value::Bool(true));
                Value::Object(map)
            }
        }
    }

    /// Tool name when this event is a tool call.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolCall { tool, .. } => Some(tool.as_str()),
            _ => None,
        }
    }
}

/// Translate a record from the given runtime.
///
/// Records from [`CODEX_RUNTIME`] go through [`codex::normalize`]; every
/// other runtime speaks the Claude stream-json format handled by [`translate`].
#[must_use]
pub fn translate_for_runtime(runtime: &str, kind: &str, payload: Value) -> Vec<DomainEvent> {
    if runtime == CODEX_RUNTIME {
        codex::normalize(kind, payload)
    } else {
        translate(kind, payload)
    }
}

/// Translate one stream-json record into domain events.
#[must_use]
pub fn translate(kind: &str, payload: Value) -> Vec<DomainEvent> {
    match RawRecord::classify(kind, payload) {
        RawRecord::Assistant { message, raw } => match message {
            Some(MessageBody::Blocks(blocks)) => blocks.into_iter().filter_map(assistant_block).collect(),
            Some(MessageBody::Text(text)) => non_blank(text)
                .map(|text| DomainEvent::Output { text })
                .into_iter()
                .collect(),
            None => vec![DomainEvent::RawOutput(raw)],
        },
        RawRecord::User { message, raw } => match message {
            Some(MessageBody::Blocks(blocks)) => blocks.into_iter().filter_map(user_block).collect(),
            // Plain user text is the prompt echoed back; nothing to report.
            Some(MessageBody::Text(_)) => Vec::new(),
            None => vec![fallback(raw)],
        },
        RawRecord::Result { text, cost_usd } => vec![DomainEvent::FinalOutput { text, cost_usd }],
        RawRecord::System { .. } => Vec::new(),
        RawRecord::ToolUse(raw) => vec![DomainEvent::ToolCall {
            tool: first_str(&raw, &["tool", "name"]).unwrap_or("unknown").to_owned(),
            input: raw.get("input").cloned().unwrap_or(Value::Null),
            tool_use_id: first_str(&raw, &["id", "tool_use_id", "toolUseId"]).map(str::to_owned),
        }],
        RawRecord::ToolResult(raw) => {
            let content = ["content", "result", "output"]
                .iter()
                .find_map(|key| raw.get(*key))
                .unwrap_or(&Value::Null);
            vec![DomainEvent::ToolResult {
                result: truncate_chars(&result_text(content), TOOL_RESULT_MAX_CHARS),
                tool_use_id: first_str(&raw, &["tool_use_id", "toolUseId", "id"]).map(str::to_owned),
            }]
        }
        RawRecord::Thinking(raw) => vec![DomainEvent::Thinking {
            text: first_str(&raw, &["thinking", "text", "content"])
                .unwrap_or_default()
                .to_owned(),
        }],
        RawRecord::Other { raw, .. } => vec![fallback(raw)],
    }
}

fn assistant_block(block: ContentBlock) -> Option<DomainEvent> {
    match block {
        ContentBlock::ToolUse { id, name, input } => Some(DomainEvent::ToolCall {
            tool: name,
            input,
            tool_use_id: id,
        }),
        ContentBlock::Thinking { thinking } => {
            non_blank(thinking).map(|text| DomainEvent::Thinking { text })
        }
        ContentBlock::Text { text } => non_blank(text).map(|text| DomainEvent::Output { text }),
        ContentBlock::ToolResult { .. } | ContentBlock::Unknown => None,
    }
}

fn user_block(block: ContentBlock) -> Option<DomainEvent> {
    match block {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => Some(DomainEvent::ToolResult {
            result: truncate_chars(&result_text(&content), TOOL_RESULT_MAX_CHARS),
            tool_use_id,
        }),
        _ => None,
    }
}

/// Generic output: the record's `text` field if it has one, else the whole payload.
fn fallback(raw: Value) -> DomainEvent {
    match raw.get("text").and_then(Value::as_str) {
        Some(text) => DomainEvent::Output {
            text: text.to_owned(),
        },
        None => DomainEvent::RawOutput(raw),
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Flatten tool result content: strings pass through, block lists join their texts.
fn result_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// Keep at most `max` characters (not bytes) of `text`.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
