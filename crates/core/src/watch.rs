use crate::event::Event;

/// A subscriber's interest in a class of events.
///
/// A subscriber may hold several `WatchSpec`s; the registry matches an
/// incoming event against every watch of every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    /// Exact-match against [`Event::element_type`].
    pub event_type: String,
    /// When present and non-empty, exact-match against [`Event::result`].
    /// Absent or empty means "match any result".
    pub match_content: Option<String>,
    /// Higher priority runs earlier within one dispatch. Ties keep
    /// registration order.
    pub priority: i32,
}

impl WatchSpec {
    /// A watch on `event_type` with default priority `0` and no content filter.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            match_content: None,
            priority: 0,
        }
    }

    /// Set the priority (higher runs earlier).
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Require an exact match on the event's `result` as well as its type.
    #[must_use]
    pub fn with_match_content(mut self, content: impl Into<String>) -> Self {
        self.match_content = Some(content.into());
        self
    }

    /// Whether this watch matches `event`.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self.event_type != event.element_type {
            return false;
        }
        match &self.match_content {
            None => true,
            Some(content) if content.is_empty() => true,
            Some(content) => content == &event.result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_on_event_type_only_when_no_content_filter() {
        let watch = WatchSpec::new("text");
        assert!(watch.matches(&Event::new("s1", "text", "anything", "", false)));
        assert!(!watch.matches(&Event::new("s1", "other", "anything", "", false)));
    }

    #[test]
    fn empty_match_content_behaves_like_absent() {
        let watch = WatchSpec::new("text").with_match_content("");
        assert!(watch.matches(&Event::new("s1", "text", "anything", "", false)));
    }

    #[test]
    fn non_empty_match_content_requires_exact_result() {
        let watch = WatchSpec::new("text").with_match_content("hi");
        assert!(watch.matches(&Event::new("s1", "text", "hi", "", false)));
        assert!(!watch.matches(&Event::new("s1", "text", "bye", "", false)));
    }

    #[test]
    fn builder_sets_priority() {
        let watch = WatchSpec::new("text").with_priority(100);
        assert_eq!(watch.priority, 100);
    }
}
