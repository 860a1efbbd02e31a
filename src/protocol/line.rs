//! Raw stdout line parsing.

use serde_json::{json, Value};

/// One raw record read from an agent process: its kind and untouched payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    /// Value of the record's `type` field, or `output` when absent.
    pub kind: String,
    /// The full JSON object (or `{"text": …}` for non-JSON output).
    pub payload: Value,
}

/// Parse one line of agent stdout.
///
/// - JSON with a string `type` field uses it as the kind.
/// - JSON without one is kind `output`.
/// - Anything that is not JSON is wrapped as `{"text": line}` of kind `output`.
/// - Blank lines yield `None`.
#[must_use]
pub fn parse_output_line(line: &str) -> Option<RawLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(payload) => {
            let kind = payload
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("output")
                .to_owned();
            Some(RawLine { kind, payload })
        }
        Err(_) => Some(RawLine {
            kind: "output".into(),
            payload: json!({ "text": trimmed }),
        }),
    }
}
