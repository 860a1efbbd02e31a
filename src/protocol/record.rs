//! Tagged union over the raw record kinds an agent process emits.
//!
//! Payloads arrive as arbitrary JSON. [`RawRecord::classify`] inspects the
//! record kind and guards every field access, so malformed input lands in a
//! fallback variant instead of failing.
//!
//! | Kind            | Variant                      |
//! |-----------------|------------------------------|
//! | `assistant`     | [`RawRecord::Assistant`]     |
//! | `user`          | [`RawRecord::User`]          |
//! | `result`        | [`RawRecord::Result`]        |
//! | `system`        | [`RawRecord::System`]        |
//! | `tool_use`      | [`RawRecord::ToolUse`]       |
//! | `tool_result`   | [`RawRecord::ToolResult`]    |
//! | `thinking`      | [`RawRecord::Thinking`]      |
//! | *(any other)*   | [`RawRecord::Other`]         |

use serde::Deserialize;
use serde_json::Value;

/// One content block inside an assistant or user message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Narration.
    Text {
        /// Block text.
        #[serde(default)]
        text: String,
    },
    /// Extended reasoning.
    Thinking {
        /// Reasoning text.
        #[serde(default)]
        thinking: String,
    },
    /// Tool invocation.
    ToolUse {
        /// Correlation id echoed by the matching `tool_result`.
        #[serde(default)]
        id: Option<String>,
        /// Tool name.
        #[serde(default)]
        name: String,
        /// Tool arguments.
        #[serde(default)]
        input: Value,
    },
    /// Tool response.
    ToolResult {
        /// Id of the originating `tool_use` block.
        #[serde(default)]
        tool_use_id: Option<String>,
        /// String or list of text blocks.
        #[serde(default)]
        content: Value,
        /// Whether the tool reported failure.
        #[serde(default)]
        is_error: bool,
    },
    /// Any block type this engine does not model, or a malformed block.
    #[serde(other)]
    Unknown,
}

/// Body of a message-carrying record.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Structured content blocks, in order.
    Blocks(Vec<ContentBlock>),
    /// Plain string content.
    Text(String),
}

/// A raw record classified by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// Assistant turn; `message` is `None` when no structured body is present.
    Assistant {
        /// Parsed message body.
        message: Option<MessageBody>,
        /// Original payload.
        raw: Value,
    },
    /// User turn (carries tool results).
    User {
        /// Parsed message body.
        message: Option<MessageBody>,
        /// Original payload.
        raw: Value,
    },
    /// Final result of the run.
    Result {
        /// Result text, if present.
        text: Option<String>,
        /// Total cost in USD, if present.
        cost_usd: Option<f64>,
    },
    /// Initialization metadata.
    System {
        /// Agent-assigned session id, if present.
        session_id: Option<String>,
    },
    /// Legacy flat tool invocation.
    ToolUse(Value),
    /// Legacy flat tool result.
    ToolResult(Value),
    /// Legacy flat reasoning record.
    Thinking(Value),
    /// Any other kind.
    Other {
        /// Original record kind.
        kind: String,
        /// Original payload.
        raw: Value,
    },
}

impl RawRecord {
    /// Classify a raw record by its kind.
    #[must_use]
    pub fn classify(kind: &str, payload: Value) -> Self {
        match kind {
            "assistant" => Self::Assistant {
                message: message_body(&payload),
                raw: payload,
            },
            "user" => Self::User {
                message: message_body(&payload),
                raw: payload,
            },
            "result" => Self::Result {
                text: first_str(&payload, &["result", "text", "content"]).map(str::to_owned),
                cost_usd: first_f64(&payload, &["total_cost_usd", "cost_usd", "cost"]),
            },
            "system" => Self::System {
                session_id: first_str(&payload, &["session_id"]).map(str::to_owned),
            },
            "tool_use" => Self::ToolUse(payload),
            "tool_result" => Self::ToolResult(payload),
            "thinking" => Self::Thinking(payload),
            other => Self::Other {
                kind: other.to_owned(),
                raw: payload,
            },
        }
    }
}

/// Extract `message.content` as a [`MessageBody`].
///
/// Each block is decoded on its own so one malformed block degrades to
/// [`ContentBlock::Unknown`] without discarding its neighbours.
fn message_body(payload: &Value) -> Option<MessageBody> {
    match payload.get("message")?.get("content")? {
        Value::Array(blocks) => Some(MessageBody::Blocks(
            blocks
                .iter()
                .map(|block| {
                    ContentBlock::deserialize(block).unwrap_or(ContentBlock::Unknown)
                })
                .collect(),
        )),
        Value::String(text) => Some(MessageBody::Text(text.clone())),
        _ => None,
    }
}

/// First string value among `keys`.
pub(crate) fn first_str<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
}

/// First numeric value among `keys`.
pub(crate) fn first_f64(payload: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_f64))
}
