use std::collections::HashSet;

use crate::event::Event;
use crate::id::SubscriberId;

/// An [`Event`] as held by the cache pool, with the bookkeeping the
/// `CacheDeliverer` needs to pace delivery and avoid redelivery.
#[derive(Debug, Clone)]
pub struct CachedEvent {
    /// The wrapped event.
    pub event: Event,
    /// Monotonic admission timestamp, microsecond precision. Used as the
    /// watermark for the auto-remove sweep.
    pub admitted_at_micros: u64,
    /// Set once the entry has been consumed by the pacing loop's pop
    /// callback; dirty entries are swept at the end of a pacing pass.
    pub is_dirty: bool,
    /// Whether this entry is eligible for the timestamp-watermark sweep.
    /// Defaults to `true`; a subscriber can preserve an entry past the
    /// watermark by returning `auto_remove: false`.
    pub auto_remove: bool,
    /// Subscribers already notified for this entry — enforces "never
    /// redeliver the same cached event to the same subscriber twice".
    pub notified_subscribers: HashSet<SubscriberId>,
    /// The request path this event was admitted under, if any.
    pub req_url: String,
}

impl CachedEvent {
    /// Wrap an event at admission time.
    #[must_use]
    pub fn new(event: Event, admitted_at_micros: u64, req_url: impl Into<String>) -> Self {
        Self {
            event,
            admitted_at_micros,
            is_dirty: false,
            auto_remove: true,
            notified_subscribers: HashSet::new(),
            req_url: req_url.into(),
        }
    }

    /// Whether `subscriber` has already received this entry.
    #[must_use]
    pub fn already_notified(&self, subscriber: SubscriberId) -> bool {
        self.notified_subscribers.contains(&subscriber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entries_default_dirty_false_auto_remove_true() {
        let cached = CachedEvent::new(Event::new("s1", "text", "hi", "", false), 10, "");
        assert!(!cached.is_dirty);
        assert!(cached.auto_remove);
        assert!(cached.notified_subscribers.is_empty());
    }

    #[test]
    fn tracks_notified_subscribers() {
        let mut cached = CachedEvent::new(Event::new("s1", "text", "hi", "", false), 10, "");
        let id = SubscriberId::next();
        assert!(!cached.already_notified(id));
        cached.notified_subscribers.insert(id);
        assert!(cached.already_notified(id));
    }
}
