//! The responsibility chain built per dispatch.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ssevent_core::{Response, SubscriberId};

use crate::subscriber::Subscriber;

/// A chain-of-responsibility over one dispatch's matched subscribers.
///
/// The index starts at -1. Each call to [`Chain::proceed`] advances it by
/// one and invokes that subscriber's callback in "normal mode"; once that
/// callback returns (whether or not it called `proceed` itself), the chain
/// automatically walks any remaining `go_through` subscribers before handing
/// the response back up.
pub struct Chain<'a> {
    subscribers: &'a [Arc<Subscriber>],
    index: Cell<i64>,
    notified: RefCell<Vec<SubscriberId>>,
}

impl<'a> Chain<'a> {
    /// Build a chain over an already matched-and-sorted subscriber list.
    #[must_use]
    pub fn new(subscribers: &'a [Arc<Subscriber>]) -> Self {
        Self {
            subscribers,
            index: Cell::new(-1),
            notified: RefCell::new(Vec::new()),
        }
    }

    /// Subscribers notified so far in this dispatch, in invocation order.
    #[must_use]
    pub fn notified(&self) -> Vec<SubscriberId> {
        self.notified.borrow().clone()
    }

    /// Advance to the next subscriber and invoke it in normal mode, then
    /// continue through any remaining go-through subscribers.
    ///
    /// Returns `response` unchanged once the index runs past the end of
    /// the subscriber list.
    pub fn proceed(&self, response: Response) -> Response {
        let next = self.index.get() + 1;
        self.index.set(next);
        let Some(sub) = self.subscriber_at(next) else {
            return response;
        };

        sub.fire_on_match(&response.event.element_type);
        self.notified.borrow_mut().push(sub.id());
        let response = sub.invoke(self, response);
        self.run_go_through(response)
    }

    fn run_go_through(&self, mut response: Response) -> Response {
        loop {
            let next = self.index.get() + 1;
            self.index.set(next);
            let Some(sub) = self.subscriber_at(next) else {
                return response;
            };
            if !sub.go_through {
                continue;
            }
            sub.fire_on_match(&response.event.element_type);
            self.notified.borrow_mut().push(sub.id());
            response = sub.invoke(self, response);
        }
    }

    fn subscriber_at(&self, index: i64) -> Option<&'a Arc<Subscriber>> {
        if index < 0 {
            return None;
        }
        self.subscribers.get(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssevent_core::{Event, WatchSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sub(name: &str, go_through: bool, order: Arc<std::sync::Mutex<Vec<String>>>) -> Arc<Subscriber> {
        let label = name.to_string();
        Arc::new(
            Subscriber::builder(name)
                .watch(WatchSpec::new("text"))
                .go_through(go_through)
                .callback(move |_chain, response| {
                    order.lock().unwrap().push(label.clone());
                    response
                })
                .build(),
        )
    }

    #[test]
    fn terminates_unless_proceed_is_called() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let a = Arc::new(
            Subscriber::builder("a")
                .watch(WatchSpec::new("text"))
                .callback(|_chain, response| response)
                .build(),
        );
        let b = sub("b", false, order.clone());
        let subs = vec![a, b];
        let chain = Chain::new(&subs);
        let response =
            Response::initial(Event::new("s1", "text", "hi", "", false), "");
        chain.proceed(response);
        assert!(order.lock().unwrap().is_empty());
    }

    #[test]
    fn go_through_runs_after_termination() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let a = sub("a", false, order.clone());
        let b = sub("b", true, order.clone());
        let c = sub("c", false, order.clone());
        let subs = vec![a, b, c];
        let chain = Chain::new(&subs);
        let response =
            Response::initial(Event::new("s1", "text", "hi", "", false), "");
        chain.proceed(response);
        assert_eq!(*order.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn explicit_proceed_continues_normal_mode() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let a = Arc::new(
            Subscriber::builder("a")
                .watch(WatchSpec::new("text"))
                .callback(move |chain, response| {
                    calls2.fetch_add(1, Ordering::SeqCst);
                    chain.proceed(response)
                })
                .build(),
        );
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let b = sub("b", false, order.clone());
        let subs = vec![a, b];
        let chain = Chain::new(&subs);
        let response =
            Response::initial(Event::new("s1", "text", "hi", "", false), "");
        chain.proceed(response);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*order.lock().unwrap(), vec!["b".to_string()]);
    }
}
