//! Line framing for agent stdout.
//!
//! Each agent run writes one stream-json record per line. The stream reader
//! decodes those lines with [`NdjsonCodec`], which caps a line at
//! [`MAX_LINE_BYTES`]. An over-long line is reported and skipped, and the
//! reader resumes at the next newline. Framing is inbound only.
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use agent_ensemble::protocol::codec::NdjsonCodec;
//!
//! let reader = FramedRead::new(child_stdout, NdjsonCodec::new());
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum line length accepted by the codec: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line-framed decoder for newline-delimited JSON agent output.
///
/// Lines longer than [`MAX_LINE_BYTES`] decode to
/// [`AppError::Protocol`]`("line too long: …")` instead of allocating.
/// I/O errors map to [`AppError::Io`].
#[derive(Debug)]
pub struct NdjsonCodec(LinesCodec);

impl NdjsonCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self(LinesCodec::new_with_max_length(max_length))
    }
}

impl Default for NdjsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NdjsonCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Protocol("line too long: exceeded max line length".into())
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
