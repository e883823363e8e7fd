//! The orchestrator wiring every component into the public engine surface.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use ssevent_core::{
    now_micros, CachedEvent, ConnectionObserver, ConnectionState, EngineConfig, Event, WatchSpec,
};
use tracing::{debug, info, trace, warn};

use crate::bridge::{ChannelBridge, NativeBridge, NativeBridgeRouter};
use crate::cache::{CacheDeliverer, CacheState, PopCallback, PopOutcome};
use crate::connect_manager::ConnectManager;
use crate::error::EngineError;
use crate::filter::{EventFilter, FilterService};
use crate::http::{EngineRequest, EngineResponse, HttpClientHandle, HttpInterceptor};
use crate::registry::InterceptorRegistry;
use crate::stream_adapter::{DefaultStreamAdapter, FrameAdapter};
use crate::subscriber::{AutoClearStrategy, Subscriber};

struct Inner {
    config: EngineConfig,
    adapter: StdMutex<Box<dyn FrameAdapter>>,
    filter: FilterService,
    cache: CacheDeliverer,
    registry: InterceptorRegistry,
    connect: ConnectManager,
    bridge_router: Arc<NativeBridgeRouter>,
    primary_bridge: Arc<dyn NativeBridge>,
    stream_transforming: AtomicBool,
    last_active_micros: AtomicU64,
    current_path: StdMutex<String>,
    agents: StdMutex<HashSet<String>>,
}

impl Inner {
    fn on_cache_idle(&self) {
        let path = self.current_path.lock().expect("engine mutex poisoned").clone();
        if self.config.skips_connect_state_check(&path) {
            trace!(path, "idle check skipped for unchecked path");
            return;
        }
        let elapsed = Duration::from_micros(
            now_micros().saturating_sub(self.last_active_micros.load(Ordering::Acquire)),
        );
        if elapsed > self.config.exception_timeout() {
            info!(?elapsed, "idle interval exceeds exception timeout");
            self.connect.transition(ConnectionState::ConnectException, false);
        } else if elapsed > self.config.idle_timeout() {
            info!(?elapsed, "idle interval exceeds idle timeout");
            self.connect.transition(ConnectionState::ConnectIdle, false);
        }
    }
}

/// The SSE delivery engine: owns the stream adapter, filter, cache pool,
/// subscriber registry, and connection-state machine, and exposes the
/// lifecycle hooks a host's HTTP client and native bridge drive.
#[derive(Clone)]
pub struct Engine(Arc<Inner>);

impl Engine {
    /// The name this engine registers itself under, for
    /// [`HttpClientHandle::remove_interceptor`] on [`Engine::detach`].
    pub const INTERCEPTOR_NAME: &'static str = "ssevent-engine";

    /// Start building an engine from `config`.
    #[must_use]
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// This engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.0.config
    }

    /// The current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.0.connect.state()
    }

    /// Register a connection-state observer.
    pub fn add_connection_observer(&self, observer: ConnectionObserver) {
        self.0.connect.add_observer(observer);
    }

    /// Remove a connection-state observer by name.
    pub fn remove_connection_observer(&self, name: &str) {
        self.0.connect.remove_observer(name);
    }

    /// Register `subscriber`. If `is_only` and a subscriber of the same name
    /// already exists, returns [`EngineError::DuplicateSubscriber`].
    pub fn add_subscriber(
        &self,
        subscriber: Subscriber,
        is_only: bool,
    ) -> Result<Arc<Subscriber>, EngineError> {
        let name = subscriber.name.clone();
        self.0
            .registry
            .add(subscriber, is_only)
            .ok_or(EngineError::DuplicateSubscriber { name })
    }

    /// Remove exactly `subscriber`.
    pub fn remove_subscriber(&self, subscriber: &Arc<Subscriber>) {
        self.0.registry.remove(subscriber);
    }

    /// Set the per-request transitory filter.
    pub fn set_transitory_filter(&self, filter: Arc<dyn EventFilter>) {
        self.0.filter.set_transitory(filter);
    }

    /// Drain the backlog quickly: sets the pacing interval to 10ms.
    pub fn enable_fast_deliver(&self) {
        self.0.cache.enable_fast_deliver();
    }

    /// Restore the pacing interval saved by [`Self::enable_fast_deliver`].
    pub fn disable_fast_deliver(&self) {
        self.0.cache.disable_fast_deliver();
    }

    /// Reference-counted pause of the cache pool.
    pub fn pause(&self) {
        self.0.cache.set_state(CacheState::Pause, false);
    }

    /// Reference-counted resume of the cache pool.
    pub fn resume(&self) {
        self.0.cache.set_state(CacheState::Active, false);
    }

    /// The host-shared router this engine's native bridge is (or will be)
    /// registered against.
    #[must_use]
    pub fn bridge_router(&self) -> &Arc<NativeBridgeRouter> {
        &self.0.bridge_router
    }

    /// This engine's primary-stream native bridge, as registered with the
    /// shared router at construction time.
    #[must_use]
    pub fn primary_bridge(&self) -> &Arc<dyn NativeBridge> {
        &self.0.primary_bridge
    }

    /// Install this engine as an interceptor on the host's HTTP client.
    ///
    /// Completes the rest of the `init` lifecycle: the `AutoRemoveInterceptor`
    /// and idle-observer wiring already happened in [`EngineBuilder::build`].
    pub fn attach(&self, http_client: &dyn HttpClientHandle) {
        http_client.install_interceptor(Arc::new(self.clone()));
    }

    /// Tear the engine down: remove it from `http_client`, unregister its
    /// bridge, and clear the cache pool, registry, and filter slots. Safe to
    /// call more than once.
    pub async fn destroy(&self, http_client: &dyn HttpClientHandle) {
        http_client.remove_interceptor(Self::INTERCEPTOR_NAME);
        self.0.bridge_router.unregister(self.0.primary_bridge.stream_id());
        self.0.cache.destroy().await;
        self.0.registry.destroy();
        self.0.filter.destroy();
    }

    /// Feed another chunk of the primary stream's bytes.
    pub async fn handle_stream_chunk(&self, chunk: &str, req_url: &str) {
        let events = {
            let mut adapter = self.0.adapter.lock().expect("engine mutex poisoned");
            adapter.push_chunk(chunk)
        };
        for event in events {
            self.handle_stream_event(event, req_url).await;
        }
    }

    /// Run an event (from the adapter or synthesized by the engine) through
    /// the filter and admit the results.
    pub async fn handle_stream_event(&self, event: Event, req_url: &str) {
        let expanded = self.0.filter.resolve(event).await;
        self.admit(expanded, req_url).await;
    }

    /// The primary stream opened: reset the adapter and cache pool, start
    /// idle supervision, and synthesize the `stream-open` marker.
    pub async fn handle_stream_opened(&self, req_url: &str) {
        info!(req_url, "stream opened");
        *self.0.current_path.lock().expect("engine mutex poisoned") = req_url.to_string();
        self.0.adapter.lock().expect("engine mutex poisoned").reset();
        self.0.cache.reset().await;
        self.0.cache.start_idle_checker();
        self.handle_stream_event(Event::stream_open_marker(), req_url).await;
    }

    /// The primary stream completed normally.
    pub async fn handle_stream_done(&self, req_url: &str) {
        info!(req_url, "stream done");
        self.finish_stream(req_url, ConnectionState::ConnectSuspend).await;
    }

    /// The primary stream ended abnormally.
    pub async fn handle_stream_error(&self, req_url: &str) {
        warn!(req_url, "stream error");
        self.finish_stream(req_url, ConnectionState::DisconnectError).await;
    }

    async fn finish_stream(&self, req_url: &str, final_state: ConnectionState) {
        let marker = Event::auto_remove_marker(req_url);
        self.0.cache.put_peek(vec![marker], req_url).await;
        self.0.stream_transforming.store(false, Ordering::Release);
        self.0.connect.transition(final_state, false);
        self.0.cache.flush_peek(self.make_pop_callback(true)).await;
        self.0.filter.reset();
        self.0.primary_bridge.set_working(false);
    }

    /// Open a named, caller-owned agent stream.
    #[must_use]
    pub fn open_agent_stream(&self, key: impl Into<String>, options: AgentStreamOptions) -> AgentStream {
        let key = key.into();
        self.0.agents.lock().expect("engine mutex poisoned").insert(key.clone());
        AgentStream {
            engine: self.clone(),
            key,
            options,
        }
    }

    /// Drive the primary stream's native bridge to completion: feed every
    /// chunk to the adapter, and end the stream normally or abnormally
    /// depending on how the bridge's byte sequence terminates.
    async fn drive_reader(&self, req_url: String) {
        loop {
            match self.0.primary_bridge.next_chunk().await {
                Some(Ok(chunk)) => self.handle_stream_chunk(&chunk, &req_url).await,
                Some(Err(err)) => {
                    warn!(req_url, %err, "native bridge reported an abnormal end");
                    self.handle_stream_error(&req_url).await;
                    break;
                }
                None => {
                    self.handle_stream_done(&req_url).await;
                    break;
                }
            }
        }
    }

    async fn admit(&self, events: Vec<Event>, req_url: &str) {
        let mut legal = Vec::with_capacity(events.len());
        for event in events {
            if event.is_legal() {
                legal.push(event);
            } else {
                warn!(element_type = %event.element_type, "dropping illegal event");
            }
        }
        if legal.is_empty() {
            return;
        }
        debug!(count = legal.len(), req_url, "admitting events");
        self.0.cache.put(legal.clone(), req_url, self.make_pop_callback(false)).await;
        self.0.cache.put_peek(legal, req_url).await;
    }

    fn make_pop_callback(&self, is_peek: bool) -> PopCallback {
        let engine = self.clone();
        Arc::new(move |entry: &CachedEvent| engine.pop_cached_entry(entry, is_peek))
    }

    fn pop_cached_entry(&self, entry: &CachedEvent, is_peek: bool) -> PopOutcome {
        let result = self.0.registry.deliver(entry, is_peek);
        trace!(
            element_type = %entry.event.element_type,
            notified = result.notified.len(),
            "dispatched cached entry"
        );
        if result.response.remove_cache {
            self.0.connect.transition(ConnectionState::ConnectActive, false);
            self.0.last_active_micros.store(entry.admitted_at_micros, Ordering::Release);
        }
        PopOutcome {
            is_consumed: result.response.remove_cache,
            auto_remove: result.response.auto_remove,
            notified: result.notified,
        }
    }
}

#[async_trait]
impl HttpInterceptor for Engine {
    async fn on_request(&self, request: &mut EngineRequest) -> Result<(), EngineError> {
        if !request.is_sse() {
            return Ok(());
        }
        if request.offline_provider().is_some() {
            // No real transport call is made; the host substitutes a
            // synthetic response body from the offline provider and drives
            // `handle_stream_opened`/`handle_stream_event` directly.
            return Ok(());
        }
        if self
            .0
            .stream_transforming
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::StreamTransforming);
        }
        *self.0.current_path.lock().expect("engine mutex poisoned") = request.path.clone();
        self.0.primary_bridge.set_working(true);
        self.0.connect.transition(ConnectionState::DisconnectNormal, true);
        Ok(())
    }

    async fn on_response(&self, request: &EngineRequest, response: &EngineResponse) {
        if !response.is_sse {
            return;
        }
        if request.offline_provider().is_some() {
            // No real bridge ever gets fed for an offline stream; the host
            // drives `handle_stream_opened`/`handle_stream_event` itself.
            return;
        }
        self.handle_stream_opened(&request.path).await;
        let engine = self.clone();
        let req_url = request.path.clone();
        tokio::spawn(async move {
            engine.drive_reader(req_url).await;
        });
    }

    async fn on_error(&self, request: &EngineRequest, error: &EngineError) {
        if error.is_transforming_rejection() {
            return;
        }
        self.0.connect.transition(ConnectionState::DisconnectError, false);
        if request.is_sse() {
            self.0.stream_transforming.store(false, Ordering::Release);
            self.0.primary_bridge.set_working(false);
        }
    }
}

/// What an [`AgentStream`] does with pushed events.
#[derive(Debug, Clone, Copy)]
pub struct AgentStreamOptions {
    /// Route through the cache pool (paced delivery) instead of dispatching
    /// straight to the registry.
    pub use_cache: bool,
    /// Also admit to the peek cache.
    pub peek: bool,
    /// Remove this agent from the engine's agent registry once it finishes.
    pub remove_on_end: bool,
}

impl Default for AgentStreamOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            peek: true,
            remove_on_end: true,
        }
    }
}

/// A named side-stream the caller owns, sharing the engine's filter and
/// dispatch machinery without competing with the primary stream's
/// `streamTransforming` gate.
pub struct AgentStream {
    engine: Engine,
    key: String,
    options: AgentStreamOptions,
}

impl AgentStream {
    /// Push one event through this agent stream.
    pub async fn push(&self, event: Event) {
        if !event.is_legal() {
            warn!(key = %self.key, "dropping illegal agent event");
            return;
        }
        let expanded = self.engine.0.filter.resolve(event).await;
        if self.options.use_cache {
            self.engine
                .0
                .cache
                .put(expanded.clone(), &self.key, self.engine.make_pop_callback(false))
                .await;
            if self.options.peek {
                self.engine.0.cache.put_peek(expanded, &self.key).await;
            }
        } else {
            for event in expanded {
                let cached = CachedEvent::new(event, now_micros(), self.key.clone());
                self.engine.0.registry.deliver(&cached, self.options.peek);
            }
        }
    }

    /// Signal this agent stream's end.
    pub async fn finish(self) {
        let marker = Event::auto_remove_marker(self.key.clone());
        self.engine.0.cache.put_peek(vec![marker], &self.key).await;
        if self.options.remove_on_end {
            self.engine
                .0
                .agents
                .lock()
                .expect("engine mutex poisoned")
                .remove(&self.key);
        }
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    filter: Option<Arc<dyn EventFilter>>,
    adapter: Option<Box<dyn FrameAdapter>>,
    bridge_router: Option<Arc<NativeBridgeRouter>>,
}

impl EngineBuilder {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            filter: None,
            adapter: None,
            bridge_router: None,
        }
    }

    /// Install a permanent filter, resolved when no transitory filter is set.
    #[must_use]
    pub fn permanent_filter(mut self, filter: Arc<dyn EventFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Replace the default `>s`-sentinel framing with a custom adapter.
    #[must_use]
    pub fn stream_adapter(mut self, adapter: Box<dyn FrameAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Share a host-owned bridge router across engines instead of creating a
    /// private one.
    #[must_use]
    pub fn bridge_router(mut self, router: Arc<NativeBridgeRouter>) -> Self {
        self.bridge_router = Some(router);
        self
    }

    /// Finish building. Registers the internal `AutoRemoveInterceptor` and
    /// wires the idle observer, completing the non-transport parts of the
    /// `init` lifecycle.
    #[must_use]
    pub fn build(self) -> Engine {
        let cache = CacheDeliverer::new(&self.config);
        let bridge_router = self.bridge_router.unwrap_or_else(|| Arc::new(NativeBridgeRouter::new()));
        let primary_bridge = ChannelBridge::new("primary");
        bridge_router.register(primary_bridge.clone());
        let inner = Arc::new(Inner {
            adapter: StdMutex::new(
                self.adapter.unwrap_or_else(|| Box::new(DefaultStreamAdapter::new())),
            ),
            filter: FilterService::new(self.filter),
            cache,
            registry: InterceptorRegistry::new(),
            connect: ConnectManager::new(),
            bridge_router,
            primary_bridge,
            stream_transforming: AtomicBool::new(false),
            last_active_micros: AtomicU64::new(now_micros()),
            current_path: StdMutex::new(String::new()),
            agents: StdMutex::new(HashSet::new()),
            config: self.config,
        });

        install_auto_remove_interceptor(&inner);

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        inner.cache.set_idle_observer(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_cache_idle();
            }
        });

        Engine(inner)
    }
}

fn install_auto_remove_interceptor(inner: &Arc<Inner>) {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    inner.registry.add(
        Subscriber::builder("__auto_remove__")
            .watch(WatchSpec::new(ssevent_core::AUTO_REMOVE_ELEMENT_TYPE).with_priority(i32::MAX))
            .is_peek(true)
            .auto_clear_strategy(AutoClearStrategy::Round)
            .callback(move |_chain, response| {
                if let Some(inner) = weak.upgrade() {
                    inner.registry.remove_stream_scoped();
                }
                response.consumed()
            })
            .build(),
        true,
    );
}
