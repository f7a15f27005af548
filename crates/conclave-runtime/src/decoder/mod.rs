//! Frame decoders.
//!
//! A decoder turns raw transport output into [`ProtocolFrame`]s. Malformed
//! input is logged and skipped; it never aborts the stream.

mod ndjson;
mod openai;
mod sse;

pub use ndjson::{decode_line, NdjsonDecoder};
pub use openai::EventStreamDecoder;
pub use sse::{SseDecoder, SseEvent, DONE_SENTINEL};

use conclave_protocols::types::ProtocolFrame;

/// Incremental decoder over a byte stream.
///
/// Feeding the same bytes split at any offsets yields the same frames.
pub trait FrameDecoder: Send {
    /// Decode the complete records contained in `chunk` plus any buffered bytes.
    fn feed(&mut self, chunk: &[u8]) -> Vec<ProtocolFrame>;

    /// Flush buffered input once the transport is exhausted.
    fn finish(&mut self) -> Vec<ProtocolFrame>;

    /// Whether the stream announced its own end.
    fn is_ended(&self) -> bool {
        false
    }
}

/// Split complete lines off `buf`, leaving any partial line buffered.
///
/// A trailing `\r` is stripped. Bytes are only decoded as UTF-8 once a whole
/// line is available, so multi-byte characters may straddle chunks.
pub(crate) fn take_lines(buf: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    buf.extend_from_slice(chunk);
    let mut lines = Vec::new();
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let mut line: Vec<u8> = buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        lines.push(String::from_utf8_lossy(&line).into_owned());
    }
    lines
}

/// Whatever is left in `buf`, as a final line.
pub(crate) fn take_rest(buf: &mut Vec<u8>) -> Option<String> {
    if buf.is_empty() {
        return None;
    }
    let mut line = std::mem::take(buf);
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}
