//! Server-sent event stream decoding.
//!
//! Lines are grouped into one event by a blank line. `id:`, `event:`,
//! `retry:` and `data:` are recognized; `:`-prefixed lines are comments;
//! any other field is kept verbatim in [`SseEvent::fields`]. Consecutive
//! data lines are joined with `"\n"`.

use std::collections::BTreeMap;
use tracing::trace;

use conclave_protocols::types::{FrameKind, FrameMeta, ProtocolFrame};

use super::{take_lines, take_rest, FrameDecoder};

/// Data payload that ends the stream without producing an event.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_SEPARATOR: &str = "\n";

/// One dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    /// Reconnection hint in milliseconds; omitted when not numeric.
    pub retry: Option<u64>,
    pub data: String,
    pub fields: BTreeMap<String, String>,
}

impl SseEvent {
    pub fn meta(&self) -> FrameMeta {
        FrameMeta {
            event_id: self.id.clone(),
            event_type: self.event.clone(),
            retry: self.retry,
            fields: self.fields.clone(),
        }
    }

    /// Transport-level mapping: `event: error` and `event: done` are
    /// recognized, everything else is a text frame carrying the raw data.
    pub fn into_frame(self) -> ProtocolFrame {
        let meta = self.meta();
        let kind = match self.event.as_deref() {
            Some("error") => FrameKind::Error {
                message: if self.data.is_empty() {
                    "error".to_string()
                } else {
                    self.data.clone()
                },
            },
            Some("done") => FrameKind::Done,
            _ => FrameKind::Text {
                text: self.data.clone(),
                done: false,
            },
        };
        ProtocolFrame::new(kind, self.data).with_meta(meta)
    }
}

/// Incremental event-stream decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
    retry: Option<u64>,
    fields: BTreeMap<String, String>,
    pending: bool,
    ended: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the complete events contained in `chunk` plus buffered bytes.
    pub fn feed_events(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        if self.ended {
            return Vec::new();
        }
        let mut events = Vec::new();
        for line in take_lines(&mut self.buf, chunk) {
            self.process_line(&line, &mut events);
            if self.ended {
                self.buf.clear();
                break;
            }
        }
        events
    }

    /// Flush a trailing unterminated line and a pending event.
    pub fn finish_events(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if self.ended {
            return events;
        }
        if let Some(line) = take_rest(&mut self.buf) {
            self.process_line(&line, &mut events);
        }
        if !self.ended {
            self.dispatch(&mut events);
        }
        events
    }

    /// Whether the end-of-stream sentinel was seen.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            trace!(comment = %line, "Event-stream comment");
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        self.pending = true;
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            "retry" => self.retry = value.trim().parse().ok(),
            other => {
                self.fields.insert(other.to_string(), value.to_string());
            }
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        if !self.pending {
            return;
        }
        self.pending = false;

        let event = SseEvent {
            id: self.id.take(),
            event: self.event.take(),
            retry: self.retry.take(),
            data: std::mem::take(&mut self.data).join(DATA_SEPARATOR),
            fields: std::mem::take(&mut self.fields),
        };

        if event.data.trim() == DONE_SENTINEL {
            self.ended = true;
            return;
        }
        events.push(event);
    }
}

impl FrameDecoder for SseDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<ProtocolFrame> {
        self.feed_events(chunk)
            .into_iter()
            .map(SseEvent::into_frame)
            .collect()
    }

    fn finish(&mut self) -> Vec<ProtocolFrame> {
        self.finish_events()
            .into_iter()
            .map(SseEvent::into_frame)
            .collect()
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
