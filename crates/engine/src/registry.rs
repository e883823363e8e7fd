//! Subscriber registry and event dispatch.

use std::sync::{Arc, Mutex};

use ssevent_core::{CachedEvent, Response, SubscriberId};

use crate::chain::Chain;
use crate::subscriber::{AutoClearStrategy, Subscriber};

/// The outcome of one [`InterceptorRegistry::deliver`] call.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    /// The response returned by the last subscriber invoked.
    pub response: Response,
    /// Every subscriber invoked during this dispatch, in invocation order.
    pub notified: Vec<SubscriberId>,
}

/// Holds the live set of subscribers and builds a [`Chain`] per dispatch.
#[derive(Default)]
pub struct InterceptorRegistry {
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
}

impl InterceptorRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber`. If `is_only` and a subscriber with the same
    /// `name` is already registered, refuses and returns `None`.
    pub fn add(&self, subscriber: Subscriber, is_only: bool) -> Option<Arc<Subscriber>> {
        let mut subscribers = self.subscribers.lock().expect("registry mutex poisoned");
        if is_only && subscribers.iter().any(|s| s.name == subscriber.name) {
            return None;
        }
        let handle = Arc::new(subscriber);
        handle.fire_on_create();
        subscribers.push(handle.clone());
        Some(handle)
    }

    /// Remove every subscriber whose auto-clear strategy is `Stream`,
    /// firing `onDestroy` on each.
    pub fn remove_stream_scoped(&self) {
        let mut subscribers = self.subscribers.lock().expect("registry mutex poisoned");
        subscribers.retain(|s| {
            let keep = s.auto_clear_strategy != AutoClearStrategy::Stream;
            if !keep {
                s.fire_on_destroy();
            }
            keep
        });
    }

    /// Remove exactly `subscriber`, firing `onDestroy` (idempotent).
    pub fn remove(&self, subscriber: &Arc<Subscriber>) {
        let mut subscribers = self.subscribers.lock().expect("registry mutex poisoned");
        subscribers.retain(|s| s.id() != subscriber.id());
        subscriber.fire_on_destroy();
    }

    /// Fire `onDestroy` on every non-destroyed subscriber, then clear.
    pub fn destroy(&self) {
        let mut subscribers = self.subscribers.lock().expect("registry mutex poisoned");
        for s in subscribers.iter() {
            s.fire_on_destroy();
        }
        subscribers.clear();
    }

    /// Remove every subscriber whose auto-clear strategy is not `Round`.
    pub fn reset(&self) {
        let mut subscribers = self.subscribers.lock().expect("registry mutex poisoned");
        subscribers.retain(|s| {
            let keep = s.auto_clear_strategy == AutoClearStrategy::Round;
            if !keep {
                s.fire_on_destroy();
            }
            keep
        });
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.lock().expect("registry mutex poisoned").len()
    }

    /// Whether the registry currently holds no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Match, sort, and dispatch `cached` to its matching subscribers.
    ///
    /// Matching: a subscriber matches iff one of its watches matches the
    /// event and the subscriber's `is_peek` equals `is_peek`. Matched
    /// subscribers are stable-sorted by priority, descending. Subscribers
    /// already present in `cached.notified_subscribers` are dropped before
    /// the chain is built.
    pub fn deliver(&self, cached: &CachedEvent, is_peek: bool) -> DispatchResult {
        let subscribers = self.subscribers.lock().expect("registry mutex poisoned");

        let mut matched: Vec<(i32, Arc<Subscriber>)> = subscribers
            .iter()
            .filter(|s| s.is_peek == is_peek)
            .filter_map(|s| {
                s.matching_watch(&cached.event.element_type, &cached.event.result)
                    .map(|watch| (watch.priority, s.clone()))
            })
            .filter(|(_, s)| !cached.already_notified(s.id()))
            .collect();
        drop(subscribers);

        matched.sort_by(|a, b| b.0.cmp(&a.0));
        let ordered: Vec<Arc<Subscriber>> = matched.into_iter().map(|(_, s)| s).collect();

        let chain = Chain::new(&ordered);
        let response0 = Response::initial(cached.event.clone(), cached.req_url.clone());
        let response = chain.proceed(response0);
        let notified = chain.notified();

        DispatchResult { response, notified }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssevent_core::{Event, WatchSpec};

    fn cached(event_type: &str, result: &str) -> CachedEvent {
        CachedEvent::new(
            Event::new("s1", event_type, result, "", false),
            0,
            "/v1/stream",
        )
    }

    #[test]
    fn is_only_refuses_duplicate_names() {
        let registry = InterceptorRegistry::new();
        assert!(registry.add(Subscriber::builder("dup").build(), true).is_some());
        assert!(registry.add(Subscriber::builder("dup").build(), true).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn priority_runs_high_before_low_when_chained() {
        let registry = InterceptorRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_a = order.clone();
        registry.add(
            Subscriber::builder("a")
                .watch(WatchSpec::new("text").with_priority(100))
                .callback(move |chain, response| {
                    order_a.lock().unwrap().push("a");
                    chain.proceed(response)
                })
                .build(),
            false,
        );
        let order_b = order.clone();
        registry.add(
            Subscriber::builder("b")
                .watch(WatchSpec::new("text").with_priority(10))
                .callback(move |_chain, response| {
                    order_b.lock().unwrap().push("b");
                    response
                })
                .build(),
            false,
        );

        registry.deliver(&cached("text", "hi"), false);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn already_notified_subscribers_are_skipped() {
        let registry = InterceptorRegistry::new();
        let hits = Arc::new(Mutex::new(0));
        let hits2 = hits.clone();
        let handle = registry
            .add(
                Subscriber::builder("a")
                    .watch(WatchSpec::new("text"))
                    .callback(move |_chain, response| {
                        *hits2.lock().unwrap() += 1;
                        response
                    })
                    .build(),
                false,
            )
            .unwrap();

        let mut entry = cached("text", "hi");
        let result = registry.deliver(&entry, false);
        assert_eq!(*hits.lock().unwrap(), 1);
        entry.notified_subscribers.insert(handle.id());
        assert!(result.notified.contains(&handle.id()));

        registry.deliver(&entry, false);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn remove_stream_scoped_fires_on_destroy_once() {
        let registry = InterceptorRegistry::new();
        let destroyed = Arc::new(Mutex::new(0));
        let destroyed2 = destroyed.clone();
        registry.add(
            Subscriber::builder("s")
                .auto_clear_strategy(AutoClearStrategy::Stream)
                .on_destroy(move |_| *destroyed2.lock().unwrap() += 1)
                .build(),
            false,
        );
        registry.remove_stream_scoped();
        assert_eq!(registry.len(), 0);
        assert_eq!(*destroyed.lock().unwrap(), 1);
    }
}
