//! Agent stdout reader task.
//!
//! Reads newline-delimited records from an agent's stdout, publishes each one
//! as a [`BackendSignal::AgentOutput`], and reports the external session id
//! carried by the `system` record. When the stream ends, publishes
//! [`BackendSignal::SessionCompleted`] with the final result text, a
//! question-detection flag and the token/cost totals of the last `result`
//! record.
//!
//! The reader is driven by [`FramedRead`] backed by [`NdjsonCodec`], which
//! enforces the 1 MiB per-line limit before any JSON parsing.

use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::NdjsonCodec;
use super::line::{parse_output_line, RawLine};
use super::record::{first_f64, ContentBlock, MessageBody, RawRecord};
use crate::backend::signals::{BackendSignal, SignalBus};
use crate::models::session::SessionUsage;
use crate::{AppError, Result};

/// Final result texts are cut to this many characters (ellipsis included).
pub const RESULT_SUMMARY_MAX_CHARS: usize = 500;

/// Phrases that mark a final message as asking the user something.
const PROMPT_PHRASES: &[&str] = &[
    "would you like",
    "shall i",
    "do you want",
    "please confirm",
    "let me know",
    "what should i",
    "which option",
    "should i",
    "can i",
    "could you",
    "any preference",
];

/// Reader task: stream `stdout` into `bus` until EOF or cancellation.
///
/// Malformed or oversized lines are logged and skipped; they do **not**
/// terminate the reader. An I/O error ends the stream as if it had closed.
/// Reading pauses while a subscriber's queue is full.
///
/// # Cancellation
///
/// When `cancel` fires the reader exits without publishing a completion,
/// since the session is being torn down by someone else.
///
/// # Errors
///
/// Returns `Ok(())` on EOF, I/O failure or cancellation.
pub async fn run_reader<R>(
    session_id: String,
    stdout: R,
    bus: SignalBus,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stdout, NdjsonCodec::new());
    let mut tracker = CompletionTracker::default();
    let mut record_count: u64 = 0;
    // FramedRead yields one `None` after a decode error before it resumes.
    let mut resuming = false;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, "reader: cancellation received, stopping");
                return Ok(());
            }

            item = framed.next() => {
                match item {
                    None if resuming => {
                        resuming = false;
                    }

                    None => {
                        debug!(session_id, "reader: EOF detected");
                        break;
                    }

                    Some(Err(AppError::Protocol(ref msg))) => {
                        warn!(session_id, error = msg.as_str(), "reader: framing error, skipping");
                        resuming = true;
                    }

                    Some(Err(e)) => {
                        warn!(session_id, error = %e, "reader: IO error, closing stream");
                        break;
                    }

                    Some(Ok(line)) => {
                        resuming = false;
                        let Some(RawLine { kind, payload }) = parse_output_line(&line) else {
                            continue;
                        };
                        record_count += 1;

                        if let Some(external_id) = tracker.observe(&kind, &payload) {
                            bus.publish(BackendSignal::ExternalSessionAssigned {
                                session_id: session_id.clone(),
                                external_session_id: external_id,
                            })
                            .await;
                        }

                        bus.publish(BackendSignal::AgentOutput {
                            session_id: session_id.clone(),
                            record_kind: kind,
                            payload,
                        })
                        .await;
                    }
                }
            }
        }
    }

    info!(
        session_id,
        record_count,
        tokens = tracker.usage.map_or(0, |u| u.total_tokens),
        "reader: stream closed"
    );
    let last_result = tracker.final_text();
    bus.publish(BackendSignal::SessionCompleted {
        session_id,
        needs_input: last_result.as_deref().is_some_and(detect_question),
        last_result: last_result.map(|text| summarize(&text)),
        usage: tracker.usage,
    })
    .await;

    Ok(())
}

/// Whether `text` asks the user something: a trailing `?` or a
/// conversational prompt phrase, case-insensitive.
#[must_use]
pub fn detect_question(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.ends_with('?') {
        return true;
    }
    let lower = trimmed.to_lowercase();
    PROMPT_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Cut `text` to [`RESULT_SUMMARY_MAX_CHARS`], ending with `...` when shortened.
#[must_use]
pub fn summarize(text: &str) -> String {
    if text.chars().count() > RESULT_SUMMARY_MAX_CHARS {
        let mut out: String = text.chars().take(RESULT_SUMMARY_MAX_CHARS - 3).collect();
        out.push_str("...");
        out
    } else {
        text.to_owned()
    }
}

/// Token and cost totals reported by a `result` record.
///
/// Tokens come from `total_tokens`, else `input_tokens + output_tokens`,
/// looked up at the top level or under `usage`. Returns `None` when the
/// record reports neither tokens nor cost.
#[must_use]
pub fn extract_usage(payload: &Value) -> Option<SessionUsage> {
    let cost_usd = first_f64(payload, &["total_cost_usd", "cost_usd", "cost"]).unwrap_or(0.0);
    let counters = payload.get("usage").filter(|usage| usage.is_object());
    let count = |key: &str| {
        payload
            .get(key)
            .or_else(|| counters.and_then(|usage| usage.get(key)))
            .and_then(Value::as_u64)
    };
    let total_tokens = count("total_tokens")
        .or_else(|| {
            let input = count("input_tokens").unwrap_or(0);
            let output = count("output_tokens").unwrap_or(0);
            (input > 0 || output > 0).then_some(input.saturating_add(output))
        })
        .unwrap_or(0);

    (total_tokens > 0 || cost_usd > 0.0).then_some(SessionUsage {
        total_tokens,
        cost_usd,
    })
}

/// Remembers what the completion signal needs while records stream past.
#[derive(Debug, Default)]
struct CompletionTracker {
    external_id_seen: bool,
    result_text: Option<String>,
    last_assistant_text: Option<String>,
    usage: Option<SessionUsage>,
}

impl CompletionTracker {
    /// Inspect one record; returns a newly seen external session id.
    fn observe(&mut self, kind: &str, payload: &Value) -> Option<String> {
        if kind == "result" {
            self.usage = extract_usage(payload);
        }
        match RawRecord::classify(kind, payload.clone()) {
            RawRecord::System {
                session_id: Some(external_id),
            } if !self.external_id_seen => {
                self.external_id_seen = true;
                return Some(external_id);
            }
            RawRecord::Result { text: Some(text), .. } => self.result_text = Some(text),
            RawRecord::Assistant {
                message: Some(MessageBody::Blocks(blocks)),
                ..
            } => {
                for block in blocks {
                    if let ContentBlock::Text { text } = block {
                        if !text.trim().is_empty() {
                            self.last_assistant_text = Some(text);
                        }
                    }
                }
            }
            _ => {}
        }
        None
    }

    /// Result text, falling back to the last assistant narration.
    fn final_text(&self) -> Option<String> {
        self.result_text
            .clone()
            .or_else(|| self.last_assistant_text.clone())
    }
}
