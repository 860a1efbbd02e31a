//! Codex CLI record normalization.
//!
//! Codex emits flat JSONL records whose kinds differ from Claude's
//! stream-json. They map onto the same canonical events so consumers
//! never see which runtime is underneath:
//!
//! | Codex kind                              | Canonical      |
//! |-----------------------------------------|----------------|
//! | `plan`, `thinking`                      | `thinking`     |
//! | `tool_call`, `exec`, `function_call`    | `tool_call`    |
//! | `tool_result`, `function_result`        | `tool_result`  |
//! | `patch`, `apply`, `file_edit`           | `file_change`  |
//! | `error`                                 | `output` (`isError`) |
//! | *(any other)*                           | `output`       |

use serde_json::Value;

use super::record::first_str;
use super::translator::{truncate_chars, DomainEvent, TOOL_RESULT_MAX_CHARS};

/// Normalize one Codex record. Always yields exactly one event.
#[must_use]
pub fn normalize(kind: &str, payload: Value) -> Vec<DomainEvent> {
    let event = match kind {
        "plan" | "thinking" => DomainEvent::Thinking {
            text: first_str(&payload, &["text", "content", "plan", "thinking"])
                .map_or_else(|| payload.to_string(), str::to_owned),
        },
        "tool_call" | "exec" | "function_call" => DomainEvent::ToolCall {
            tool: first_str(&payload, &["name", "tool", "command"])
                .unwrap_or(kind)
                .to_owned(),
            input: ["arguments", "input", "args"]
                .iter()
                .find_map(|key| payload.get(*key).cloned())
                .unwrap_or(Value::Null),
            tool_use_id: first_str(&payload, &["call_id", "id"]).map(str::to_owned),
        },
        "tool_result" | "function_result" => DomainEvent::ToolResult {
            result: truncate_chars(
                first_str(&payload, &["output", "result", "content"]).unwrap_or_default(),
                TOOL_RESULT_MAX_CHARS,
            ),
            tool_use_id: first_str(&payload, &["call_id", "id"]).map(str::to_owned),
        },
        "patch" | "apply" | "file_edit" => DomainEvent::FileChange(payload),
        "error" => DomainEvent::ErrorOutput(payload),
        _ => match first_str(&payload, &["text", "message"]) {
            Some(text) => DomainEvent::Output {
                text: text.to_owned(),
            },
            None => DomainEvent::RawOutput(payload),
        },
    };
    vec![event]
}
