//! Subscriber (interceptor) registration types.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use ssevent_core::{Response, SubscriberId, WatchSpec};

use crate::chain::Chain;

/// Governs when a subscriber is automatically removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoClearStrategy {
    /// Survives `InterceptorRegistry::reset`, cleared only by `destroy`.
    ///
    /// Documented upstream as deprecated; kept verbatim rather than extended.
    Round,
    /// Removed when the owning stream completes (`removeStreamScoped`).
    Stream,
}

/// The callback a subscriber is invoked with: the chain (so it can call
/// `proceed` to continue dispatch) and the response accumulated so far.
///
/// Deliberately synchronous: the chain's ordering guarantees only hold if
/// invocation is synchronous relative to dispatch, see [`Chain::proceed`].
pub type SubscriberCallback = Box<dyn Fn(&Chain<'_>, Response) -> Response + Send + Sync>;

/// Fired exactly once when a subscriber is registered.
pub type OnCreateHook = Box<dyn Fn(&Subscriber) + Send + Sync>;
/// Fired each time one of a subscriber's watches matches an event, before dispatch.
pub type OnMatchHook = Box<dyn Fn(&str, &str) + Send + Sync>;
/// Fired exactly once when a subscriber is removed.
pub type OnDestroyHook = Box<dyn Fn(&str) + Send + Sync>;

/// A named handler in the interceptor chain.
pub struct Subscriber {
    id: SubscriberId,
    /// Human-facing name; used for `isOnly` dedup, not for notified-set identity.
    pub name: String,
    watches: Vec<WatchSpec>,
    callback: SubscriberCallback,
    /// When to automatically remove this subscriber.
    pub auto_clear_strategy: AutoClearStrategy,
    /// If `true`, always invoked after a prior handler terminates the chain.
    pub go_through: bool,
    /// If `true`, receives from the peek path instead of the main cache.
    pub is_peek: bool,
    on_create: Option<OnCreateHook>,
    on_match: Option<OnMatchHook>,
    on_destroy: Option<OnDestroyHook>,
    destroyed: AtomicBool,
}

impl Subscriber {
    /// Start building a subscriber named `name`, watching `watches`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SubscriberBuilder {
        SubscriberBuilder::new(name)
    }

    /// Opaque identity, stable for the subscriber's lifetime. Used for
    /// notified-set membership instead of reference identity.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// This subscriber's registered watches.
    #[must_use]
    pub fn watches(&self) -> &[WatchSpec] {
        &self.watches
    }

    /// The highest-priority watch matching `event_type`/`result`, if any.
    #[must_use]
    pub fn matching_watch(&self, event_type: &str, result: &str) -> Option<&WatchSpec> {
        self.watches
            .iter()
            .filter(|w| w.event_type == event_type)
            .filter(|w| match &w.match_content {
                None => true,
                Some(content) if content.is_empty() => true,
                Some(content) => content == result,
            })
            .max_by_key(|w| w.priority)
    }

    /// Invoke this subscriber's callback.
    pub fn invoke(&self, chain: &Chain<'_>, response: Response) -> Response {
        (self.callback)(chain, response)
    }

    /// Whether `onDestroy` has already fired for this subscriber.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Fire `onCreate`. Called once by the registry on successful `add`.
    pub fn fire_on_create(&self) {
        if let Some(hook) = &self.on_create {
            hook(self);
        }
    }

    /// Fire `onMatch`. Called by the registry immediately before dispatch.
    pub fn fire_on_match(&self, event_type: &str) {
        if let Some(hook) = &self.on_match {
            hook(&self.name, event_type);
        }
    }

    /// Fire `onDestroy`, exactly once; later calls are a no-op.
    pub fn fire_on_destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(hook) = &self.on_destroy {
            hook(&self.name);
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("watches", &self.watches)
            .field("auto_clear_strategy", &self.auto_clear_strategy)
            .field("go_through", &self.go_through)
            .field("is_peek", &self.is_peek)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Subscriber`].
pub struct SubscriberBuilder {
    name: String,
    watches: Vec<WatchSpec>,
    callback: Option<SubscriberCallback>,
    auto_clear_strategy: AutoClearStrategy,
    go_through: bool,
    is_peek: bool,
    on_create: Option<OnCreateHook>,
    on_match: Option<OnMatchHook>,
    on_destroy: Option<OnDestroyHook>,
}

impl SubscriberBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            watches: Vec::new(),
            callback: None,
            auto_clear_strategy: AutoClearStrategy::Stream,
            go_through: false,
            is_peek: false,
            on_create: None,
            on_match: None,
            on_destroy: None,
        }
    }

    /// Add a watch spec.
    #[must_use]
    pub fn watch(mut self, watch: WatchSpec) -> Self {
        self.watches.push(watch);
        self
    }

    /// Set the dispatch callback.
    #[must_use]
    pub fn callback(
        mut self,
        callback: impl Fn(&Chain<'_>, Response) -> Response + Send + Sync + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Set the auto-clear strategy (defaults to `Stream`).
    #[must_use]
    pub fn auto_clear_strategy(mut self, strategy: AutoClearStrategy) -> Self {
        self.auto_clear_strategy = strategy;
        self
    }

    /// Mark this subscriber as go-through.
    #[must_use]
    pub fn go_through(mut self, go_through: bool) -> Self {
        self.go_through = go_through;
        self
    }

    /// Mark this subscriber as peek-only.
    #[must_use]
    pub fn is_peek(mut self, is_peek: bool) -> Self {
        self.is_peek = is_peek;
        self
    }

    /// Set the `onCreate` hook.
    #[must_use]
    pub fn on_create(mut self, hook: impl Fn(&Subscriber) + Send + Sync + 'static) -> Self {
        self.on_create = Some(Box::new(hook));
        self
    }

    /// Set the `onMatch` hook.
    #[must_use]
    pub fn on_match(mut self, hook: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_match = Some(Box::new(hook));
        self
    }

    /// Set the `onDestroy` hook.
    #[must_use]
    pub fn on_destroy(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_destroy = Some(Box::new(hook));
        self
    }

    /// Finish building. A subscriber with no callback set passes its
    /// response through unchanged.
    #[must_use]
    pub fn build(self) -> Subscriber {
        Subscriber {
            id: SubscriberId::next(),
            name: self.name,
            watches: self.watches,
            callback: self
                .callback
                .unwrap_or_else(|| Box::new(|_chain, response| response)),
            auto_clear_strategy: self.auto_clear_strategy,
            go_through: self.go_through,
            is_peek: self.is_peek,
            on_create: self.on_create,
            on_match: self.on_match,
            on_destroy: self.on_destroy,
            destroyed: AtomicBool::new(false),
        }
    }
}
