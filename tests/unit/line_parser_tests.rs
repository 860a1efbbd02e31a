//! Unit tests for stdout line parsing and NDJSON framing.

use bytes::BytesMut;
use serde_json::json;
use tokio_util::codec::Decoder;

use agent_ensemble::protocol::codec::NdjsonCodec;
use agent_ensemble::protocol::line::parse_output_line;
use agent_ensemble::AppError;

#[test]
fn json_line_uses_type_field_as_kind() {
    let line = parse_output_line(r#"{"type":"assistant","message":{"content":[]}}"#).unwrap();

    assert_eq!(line.kind, "assistant");
    assert_eq!(line.payload["message"], json!({ "content": [] }));
}

#[test]
fn json_line_without_type_is_output() {
    let line = parse_output_line(r#"{"text":"hello"}"#).unwrap();

    assert_eq!(line.kind, "output");
    assert_eq!(line.payload, json!({ "text": "hello" }));
}

#[test]
fn plain_text_is_wrapped() {
    let line = parse_output_line("  Compiling agent v0.1.0  ").unwrap();

    assert_eq!(line.kind, "output");
    assert_eq!(line.payload, json!({ "text": "Compiling agent v0.1.0" }));
}

#[test]
fn blank_lines_are_skipped() {
    assert!(parse_output_line("").is_none());
    assert!(parse_output_line("   \t").is_none());
}

#[test]
fn non_string_type_falls_back_to_output() {
    let line = parse_output_line(r#"{"type":7}"#).unwrap();

    assert_eq!(line.kind, "output");
}

#[test]
fn codec_splits_lines() {
    let mut codec = NdjsonCodec::new();
    let mut buf = BytesMut::from("{\"a\":1}\n{\"b\":2}\n");

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"a\":1}"));
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"b\":2}"));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

#[test]
fn codec_returns_trailing_line_at_eof() {
    let mut codec = NdjsonCodec::new();
    let mut buf = BytesMut::from("{\"done\":true}");

    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    assert_eq!(
        codec.decode_eof(&mut buf).unwrap().as_deref(),
        Some("{\"done\":true}")
    );
}

#[test]
fn codec_rejects_oversized_line_then_continues() {
    let mut codec = NdjsonCodec::with_max_length(8);
    let mut buf = BytesMut::from("0123456789abcdef\nok\n");

    let err = codec.decode(&mut buf).unwrap_err();
    assert!(matches!(err, AppError::Protocol(ref msg) if msg.starts_with("line too long")));

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("ok"));
}
