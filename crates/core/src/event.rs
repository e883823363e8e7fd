use serde::{Deserialize, Serialize};

/// A single structured event produced by the stream adapter or synthesized
/// by the engine (the `stream-open` and `auto-remove` markers).
///
/// An event is *legal* iff both `session_log_id` and `element_type` are
/// non-empty — see [`Event::is_legal`]. Illegal events are dropped before
/// cache admission and never reach a subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identifies the session log this event belongs to. Required for legality.
    #[serde(default)]
    pub session_log_id: String,
    /// The event's type discriminator, matched against [`crate::watch::WatchSpec::event_type`].
    /// Required for legality.
    #[serde(default)]
    pub element_type: String,
    /// The event's payload. May be empty; never `None` — an event with no
    /// result is represented as an empty string, not absence.
    #[serde(default)]
    pub result: String,
    /// Opaque, application-defined data. The core never parses this.
    #[serde(default)]
    pub extra: String,
    /// Whether this event was replayed from history rather than received live.
    #[serde(default)]
    pub is_history: bool,
}

impl Event {
    /// Construct a new event from its four content fields.
    #[must_use]
    pub fn new(
        session_log_id: impl Into<String>,
        element_type: impl Into<String>,
        result: impl Into<String>,
        extra: impl Into<String>,
        is_history: bool,
    ) -> Self {
        Self {
            session_log_id: session_log_id.into(),
            element_type: element_type.into(),
            result: result.into(),
            extra: extra.into(),
            is_history,
        }
    }

    /// An event is legal iff both `session_log_id` and `element_type` are non-empty.
    #[must_use]
    pub fn is_legal(&self) -> bool {
        !self.session_log_id.is_empty() && !self.element_type.is_empty()
    }

    /// The sentinel illegal event produced when a frame fails to decode as JSON.
    ///
    /// Always has empty `session_log_id` and `element_type`, so [`Event::is_legal`]
    /// is always `false` for it.
    #[must_use]
    pub fn malformed() -> Self {
        Self::default()
    }

    /// A reserved marker event synthesized by the engine when a stream opens.
    #[must_use]
    pub fn stream_open_marker() -> Self {
        Self::new(
            crate::STREAM_OPEN_SESSION_LOG_ID,
            crate::STREAM_OPEN_ELEMENT_TYPE,
            String::new(),
            String::new(),
            false,
        )
    }

    /// A reserved marker event synthesized by the engine at stream end, consumed
    /// by the internal auto-remove interceptor to prune stream-scoped subscribers.
    #[must_use]
    pub fn auto_remove_marker(session_log_id: impl Into<String>) -> Self {
        Self::new(
            session_log_id,
            crate::AUTO_REMOVE_ELEMENT_TYPE,
            String::new(),
            String::new(),
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_requires_both_ids() {
        assert!(Event::new("s1", "text", "hi", "", false).is_legal());
        assert!(!Event::new("", "text", "hi", "", false).is_legal());
        assert!(!Event::new("s1", "", "hi", "", false).is_legal());
        assert!(!Event::new("", "", "", "", false).is_legal());
    }

    #[test]
    fn empty_result_is_legal() {
        assert!(Event::new("s1", "text", "", "", false).is_legal());
    }

    #[test]
    fn malformed_is_always_illegal() {
        assert!(!Event::malformed().is_legal());
    }

    #[test]
    fn markers_are_legal_and_reserved() {
        let open = Event::stream_open_marker();
        assert!(open.is_legal());
        assert_eq!(open.element_type, crate::STREAM_OPEN_ELEMENT_TYPE);

        let done = Event::auto_remove_marker("s1");
        assert!(done.is_legal());
        assert_eq!(done.element_type, crate::AUTO_REMOVE_ELEMENT_TYPE);
    }

    #[test]
    fn serde_roundtrip_preserves_fields() {
        let event = Event::new("s1", "text", "hi", "{\"k\":1}", true);
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn missing_fields_default_to_empty_or_false() {
        // Framing on the wire is camelCase (handled by the stream adapter's
        // own decode struct in ssevent-engine); `Event` itself round-trips
        // snake_case, used directly by tests and the peek-cache fixtures.
        let json = r#"{"session_log_id":"s1","element_type":"text"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.result, "");
        assert_eq!(event.extra, "");
        assert!(!event.is_history);
    }
}
