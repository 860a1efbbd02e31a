//! Agent output protocol handling.
//!
//! Turns the raw, heterogeneous records an agent process writes to stdout
//! into canonical domain events.
//!
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based NDJSON framing.
//! - `line`: one stdout line → record kind + payload.
//! - `record`: tagged union over the recognised record kinds.
//! - `translator`: record → ordered domain events (Claude stream-json).
//! - `codex`: record → domain event for the Codex runtime.
//! - `reader`: async task publishing a stream's records as backend signals.

pub mod codec;
pub mod codex;
pub mod line;
pub mod reader;
pub mod record;
pub mod translator;
