//! Unit tests for the stream-json protocol translator.
//!
//! Covers block splitting and ordering, blank-block dropping, tool result
//! truncation, final results, system records and the generic fallback.

use serde_json::json;

use agent_ensemble::models::event::EventKind;
use agent_ensemble::protocol::translator::{
    translate, translate_for_runtime, DomainEvent, TOOL_RESULT_MAX_CHARS,
};

#[test]
fn assistant_turn_splits_blocks_in_order() {
    let payload = json!({
        "type": "assistant",
        "message": {
            "content": [
                { "type": "text", "text": "Looking at the failing test." },
                { "type": "thinking", "thinking": "The fixture is stale." },
                { "type": "tool_use", "id": "toolu_1", "name": "Read", "input": { "path": "src/lib.rs" } },
                { "type": "text", "text": "Found it." }
            ]
        }
    });

    let events = translate("assistant", payload);

    assert_eq!(
        events,
        vec![
            DomainEvent::Output {
                text: "Looking at the failing test.".into()
            },
            DomainEvent::Thinking {
                text: "The fixture is stale.".into()
            },
            DomainEvent::ToolCall {
                tool: "Read".into(),
                input: json!({ "path": "src/lib.rs" }),
                tool_use_id: Some("toolu_1".into()),
            },
            DomainEvent::Output {
                text: "Found it.".into()
            },
        ]
    );
}

#[test]
fn blank_text_and_thinking_blocks_are_dropped() {
    let payload = json!({
        "type": "assistant",
        "message": {
            "content": [
                { "type": "text", "text": "   \n" },
                { "type": "thinking", "thinking": "" },
                { "type": "tool_use", "name": "Bash", "input": { "command": "ls" } },
                { "type": "text" }
            ]
        }
    });

    let events = translate("assistant", payload);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), EventKind::ToolCall);
    assert_eq!(events[0].tool_name(), Some("Bash"));
}

#[test]
fn every_tool_use_block_yields_one_tool_call() {
    let payload = json!({
        "message": {
            "content": [
                { "type": "tool_use", "id": "a", "name": "Read", "input": {} },
                { "type": "tool_use", "id": "b", "name": "Edit", "input": {} },
                { "type": "tool_use", "id": "c", "name": "Read", "input": {} }
            ]
        }
    });

    let tools: Vec<_> = translate("assistant", payload)
        .iter()
        .filter_map(|event| event.tool_name().map(str::to_owned))
        .collect();

    assert_eq!(tools, vec!["Read", "Edit", "Read"]);
}

#[test]
fn assistant_without_body_wraps_raw_payload() {
    let payload = json!({ "type": "assistant", "delta": "partial" });

    let events = translate("assistant", payload.clone());

    assert_eq!(events, vec![DomainEvent::RawOutput(payload.clone())]);
    assert_eq!(events[0].kind(), EventKind::Output);
    assert_eq!(events[0].payload(), payload);
}

#[test]
fn unknown_blocks_do_not_discard_neighbours() {
    let payload = json!({
        "message": {
            "content": [
                { "type": "image", "source": {} },
                { "not_a_block": true },
                { "type": "text", "text": "still here" }
            ]
        }
    });

    let events = translate("assistant", payload);

    assert_eq!(
        events,
        vec![DomainEvent::Output {
            text: "still here".into()
        }]
    );
}

#[test]
fn user_tool_result_is_truncated_and_tagged() {
    let long = "x".repeat(1000);
    let payload = json!({
        "type": "user",
        "message": {
            "content": [
                { "type": "tool_result", "tool_use_id": "toolu_9", "content": long }
            ]
        }
    });

    let events = translate("user", payload);

    assert_eq!(events.len(), 1);
    match &events[0] {
        DomainEvent::ToolResult {
            result,
            tool_use_id,
        } => {
            assert_eq!(result.chars().count(), TOOL_RESULT_MAX_CHARS);
            assert_eq!(tool_use_id.as_deref(), Some("toolu_9"));
        }
        other => panic!("expected tool result, got {other:?}"),
    }
    assert_eq!(events[0].payload()["toolUseId"], "toolu_9");
}

#[test]
fn tool_result_truncation_counts_characters_not_bytes() {
    let payload = json!({
        "message": {
            "content": [
                { "type": "tool_result", "tool_use_id": "t", "content": "é".repeat(400) }
            ]
        }
    });

    let events = translate("user", payload);

    let DomainEvent::ToolResult { result, .. } = &events[0] else {
        panic!("expected tool result");
    };
    assert_eq!(result.chars().count(), 300);
}

#[test]
fn tool_result_block_list_content_is_flattened() {
    let payload = json!({
        "message": {
            "content": [
                {
                    "type": "tool_result",
                    "tool_use_id": "t",
                    "content": [ { "type": "text", "text": "line one" }, { "type": "text", "text": "line two" } ]
                }
            ]
        }
    });

    let events = translate("user", payload);

    assert_eq!(
        events,
        vec![DomainEvent::ToolResult {
            result: "line one\nline two".into(),
            tool_use_id: Some("t".into()),
        }]
    );
}

#[test]
fn user_plain_text_yields_nothing() {
    let payload = json!({ "message": { "content": "please fix the bug" } });

    assert!(translate("user", payload).is_empty());
}

#[test]
fn final_result_is_marked_and_carries_cost() {
    let payload = json!({
        "type": "result",
        "result": "All tests pass.",
        "total_cost_usd": 0.042
    });

    let events = translate("result", payload);

    assert_eq!(events.len(), 1);
    let rendered = events[0].payload();
    assert_eq!(events[0].kind(), EventKind::Output);
    assert_eq!(rendered["isFinal"], true);
    assert_eq!(rendered["text"], "All tests pass.");
    assert_eq!(rendered["cost"], 0.042);
}

#[test]
fn final_result_without_cost_omits_it() {
    let events = translate("result", json!({ "result": "done" }));

    let rendered = events[0].payload();
    assert_eq!(rendered["isFinal"], true);
    assert!(rendered.get("cost").is_none());
}

#[test]
fn system_records_yield_nothing_for_any_shape() {
    for payload in [
        json!({ "type": "system", "subtype": "init", "session_id": "abc" }),
        json!({}),
        json!(null),
        json!([1, 2, 3]),
        json!("text"),
    ] {
        assert!(translate("system", payload).is_empty());
    }
}

#[test]
fn flat_kinds_pass_through() {
    let tool_use = translate(
        "tool_use",
        json!({ "tool": "Grep", "input": { "pattern": "fn main" }, "id": "u1" }),
    );
    assert_eq!(
        tool_use,
        vec![DomainEvent::ToolCall {
            tool: "Grep".into(),
            input: json!({ "pattern": "fn main" }),
            tool_use_id: Some("u1".into()),
        }]
    );

    let tool_result = translate("tool_result", json!({ "content": "3 matches", "tool_use_id": "u1" }));
    assert_eq!(
        tool_result,
        vec![DomainEvent::ToolResult {
            result: "3 matches".into(),
            tool_use_id: Some("u1".into()),
        }]
    );

    let thinking = translate("thinking", json!({ "thinking": "hmm" }));
    assert_eq!(
        thinking,
        vec![DomainEvent::Thinking {
            text: "hmm".into()
        }]
    );
}

#[test]
fn unrecognised_kind_with_text_becomes_output() {
    let events = translate("output", json!({ "text": "plain line" }));

    assert_eq!(
        events,
        vec![DomainEvent::Output {
            text: "plain line".into()
        }]
    );
}

#[test]
fn unrecognised_kind_without_text_wraps_payload_unmodified() {
    let payload = json!({ "type": "rate_limit", "retry_after": 30 });

    let events = translate("rate_limit", payload.clone());

    assert_eq!(events, vec![DomainEvent::RawOutput(payload.clone())]);
    assert_eq!(events[0].payload(), payload);
}

#[test]
fn non_object_payloads_degrade_to_output() {
    for kind in ["assistant", "user", "mystery"] {
        let events = translate(kind, json!(42));
        assert_eq!(events.len(), 1, "kind {kind}");
        assert_eq!(events[0].kind(), EventKind::Output);
    }
}

#[test]
fn claude_runtime_uses_stream_json_rules() {
    let events = translate_for_runtime("claude-code", "system", json!({ "session_id": "x" }));
    assert!(events.is_empty());
}
