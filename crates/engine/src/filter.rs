//! Asynchronous one-to-many event expansion.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ssevent_core::Event;

/// Expands a single event into zero or more events.
#[async_trait]
pub trait EventFilter: Send + Sync {
    /// Expand `event`.
    async fn expand(&self, event: Event) -> Vec<Event>;
}

/// Resolves each event through a transitory filter if one is set,
/// otherwise a permanent filter, otherwise passes the event through as a
/// singleton list.
#[derive(Default)]
pub struct FilterService {
    permanent: Mutex<Option<Arc<dyn EventFilter>>>,
    transitory: Mutex<Option<Arc<dyn EventFilter>>>,
}

impl FilterService {
    /// Construct a service with an optional permanent filter, set at init
    /// and not expected to change over the engine's lifetime (it can still
    /// be cleared via [`FilterService::destroy`]).
    #[must_use]
    pub fn new(permanent: Option<Arc<dyn EventFilter>>) -> Self {
        Self {
            permanent: Mutex::new(permanent),
            transitory: Mutex::new(None),
        }
    }

    /// Set the per-request transitory filter.
    pub fn set_transitory(&self, filter: Arc<dyn EventFilter>) {
        *self.transitory.lock().expect("filter mutex poisoned") = Some(filter);
    }

    /// Clear only the transitory slot.
    pub fn reset(&self) {
        *self.transitory.lock().expect("filter mutex poisoned") = None;
    }

    /// Clear both slots.
    pub fn destroy(&self) {
        *self.transitory.lock().expect("filter mutex poisoned") = None;
        *self.permanent.lock().expect("filter mutex poisoned") = None;
    }

    /// Resolve `event` through whichever filter is active.
    pub async fn resolve(&self, event: Event) -> Vec<Event> {
        let filter = {
            let transitory = self.transitory.lock().expect("filter mutex poisoned");
            match transitory.as_ref() {
                Some(f) => Some(f.clone()),
                None => self.permanent.lock().expect("filter mutex poisoned").clone(),
            }
        };
        match filter {
            Some(f) => f.expand(event).await,
            None => vec![event],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Duplicate;

    #[async_trait]
    impl EventFilter for Duplicate {
        async fn expand(&self, event: Event) -> Vec<Event> {
            vec![event.clone(), event]
        }
    }

    struct Drop3;

    #[async_trait]
    impl EventFilter for Drop3 {
        async fn expand(&self, _event: Event) -> Vec<Event> {
            Vec::new()
        }
    }

    fn event() -> Event {
        Event::new("s1", "text", "hi", "", false)
    }

    #[tokio::test]
    async fn with_no_filter_passes_through() {
        let service = FilterService::new(None);
        let out = service.resolve(event()).await;
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn permanent_filter_applies_when_no_transitory() {
        let service = FilterService::new(Some(Arc::new(Duplicate)));
        let out = service.resolve(event()).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn transitory_filter_takes_precedence() {
        let service = FilterService::new(Some(Arc::new(Duplicate)));
        service.set_transitory(Arc::new(Drop3));
        let out = service.resolve(event()).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn reset_clears_only_transitory() {
        let service = FilterService::new(Some(Arc::new(Duplicate)));
        service.set_transitory(Arc::new(Drop3));
        service.reset();
        let out = service.resolve(event()).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn destroy_clears_both_slots() {
        let service = FilterService::new(Some(Arc::new(Duplicate)));
        service.destroy();
        let out = service.resolve(event()).await;
        assert_eq!(out.len(), 1);
    }
}
