//! Turns raw text chunks into structured [`Event`]s.

use serde::Deserialize;
use ssevent_core::Event;

const SENTINEL: &str = ">s";

/// Converts a lazy sequence of text chunks into a lazy sequence of events.
///
/// Implementations must be resumable across chunks: a frame may straddle
/// any number of `push_chunk` calls. Replacement adapters only need to
/// preserve this framing contract and the emit-on-complete-frame property;
/// [`Engine`](crate::engine::Engine) doesn't otherwise care how they work.
pub trait FrameAdapter: Send {
    /// Feed another chunk of bytes, returning every event completed by it.
    fn push_chunk(&mut self, chunk: &str) -> Vec<Event>;

    /// Clear any partial frame state.
    fn reset(&mut self);
}

/// The default framing: lines are stripped of `data:`/`event:stop` tokens
/// and concatenated into an accumulator, which is scanned for the `>s`
/// sentinel on every push.
#[derive(Debug, Default)]
pub struct DefaultStreamAdapter {
    accumulator: String,
}

impl DefaultStreamAdapter {
    /// Construct an adapter with an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn drain_frames(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(pos) = self.accumulator.find(SENTINEL) {
            let prefix = self.accumulator[..pos].to_string();
            let payload = prefix.strip_prefix("data:").unwrap_or(&prefix);
            let event = decode_frame(payload);
            if !event.is_legal() {
                // Buffer holds a partial or malformed frame; wait for more bytes.
                break;
            }
            let consumed = pos + SENTINEL.len();
            self.accumulator.drain(..consumed);
            events.push(event);
        }
        events
    }
}

impl FrameAdapter for DefaultStreamAdapter {
    fn push_chunk(&mut self, chunk: &str) -> Vec<Event> {
        for raw_line in chunk.split('\n') {
            let line = raw_line.trim_end_matches('\r').trim_start();
            if line == "event:stop" {
                continue;
            }
            let content = line.strip_prefix("data:").unwrap_or(line);
            if content.is_empty() {
                continue;
            }
            self.accumulator.push_str(content);
        }
        self.drain_frames()
    }

    fn reset(&mut self) {
        self.accumulator.clear();
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawEventFrame {
    element_type: String,
    session_log_id: String,
    result: String,
    extra: Option<serde_json::Value>,
    is_history: bool,
}

fn decode_frame(payload: &str) -> Event {
    match serde_json::from_str::<RawEventFrame>(payload) {
        Ok(raw) => Event::new(
            raw.session_log_id,
            raw.element_type,
            raw.result,
            raw.extra.map(|v| v.to_string()).unwrap_or_default(),
            raw.is_history,
        ),
        Err(_) => Event::malformed(),
    }
}
