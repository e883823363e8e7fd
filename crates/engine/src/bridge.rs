//! Native-to-host byte bridge.
//!
//! Buffers platform-layer stream chunks per `streamId` and exposes a
//! resumable byte sequence that waits on a one-shot completion primitive
//! between chunks. Modeled as an explicit, host-owned [`NativeBridgeRouter`]
//! rather than a process-wide singleton, per the design note favoring an
//! injected handle over a hidden global.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use crate::error::EngineError;

/// The terminal signal carried in a [`BridgeBundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeSignal {
    /// More data is expected for this stream.
    Continuing,
    /// The stream ended normally.
    StreamEnd,
    /// The stream ended abnormally.
    StreamError,
}

/// One `{streamId, data, state}` bundle handed to the router by the host platform layer.
#[derive(Debug, Clone)]
pub struct BridgeBundle {
    /// The stream this bundle belongs to.
    pub stream_id: String,
    /// Raw bytes carried by this bundle.
    pub data: Bytes,
    /// The bundle's terminal state.
    pub state: BridgeSignal,
}

/// A single engine's view of its native byte bridge.
///
/// Consumes bundles only while [`NativeBridge::is_working`] is `true`,
/// avoiding cross-talk when several engines share one router.
#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// The stream id this bridge instance is bound to.
    fn stream_id(&self) -> &str;

    /// Whether this bridge is currently accepting bundles.
    fn is_working(&self) -> bool;

    /// Start or stop accepting bundles.
    fn set_working(&self, working: bool);

    /// Buffer a bundle destined for this bridge. Ignored if not working.
    fn feed(&self, bundle: BridgeBundle);

    /// Await and return the next accumulated chunk as text, or `None` once
    /// the stream has ended and the buffer is drained. A `StreamError`
    /// bundle surfaces as `Some(Err(_))`.
    async fn next_chunk(&self) -> Option<Result<String, EngineError>>;
}

/// The default [`NativeBridge`]: an in-memory queue signaled with a [`Notify`].
pub struct ChannelBridge {
    stream_id: String,
    working: AtomicBool,
    queue: StdMutex<VecDeque<BridgeBundle>>,
    ended: AtomicBool,
    notify: Notify,
}

impl ChannelBridge {
    /// Construct a bridge bound to `stream_id`, initially working.
    #[must_use]
    pub fn new(stream_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            stream_id: stream_id.into(),
            working: AtomicBool::new(true),
            queue: StdMutex::new(VecDeque::new()),
            ended: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }
}

#[async_trait]
impl NativeBridge for ChannelBridge {
    fn stream_id(&self) -> &str {
        &self.stream_id
    }

    fn is_working(&self) -> bool {
        self.working.load(Ordering::Acquire)
    }

    fn set_working(&self, working: bool) {
        self.working.store(working, Ordering::Release);
    }

    fn feed(&self, bundle: BridgeBundle) {
        if !self.is_working() {
            return;
        }
        if matches!(bundle.state, BridgeSignal::StreamEnd | BridgeSignal::StreamError) {
            self.ended.store(true, Ordering::Release);
        }
        self.queue.lock().expect("bridge mutex poisoned").push_back(bundle);
        self.notify.notify_one();
    }

    async fn next_chunk(&self) -> Option<Result<String, EngineError>> {
        loop {
            let next = self.queue.lock().expect("bridge mutex poisoned").pop_front();
            match next {
                Some(bundle) if bundle.state == BridgeSignal::StreamError => {
                    return Some(Err(EngineError::BridgeAbnormalEnd(bundle.stream_id)));
                }
                Some(bundle) => {
                    let text = String::from_utf8_lossy(&bundle.data).into_owned();
                    if text.is_empty() && bundle.state == BridgeSignal::StreamEnd {
                        return None;
                    }
                    return Some(Ok(text));
                }
                None => {
                    if self.ended.load(Ordering::Acquire) {
                        return None;
                    }
                    self.notify.notified().await;
                }
            }
        }
    }
}

/// Host-owned router fanning bundles out to per-stream bridges by `streamId`.
///
/// Constructed once by the host and handed to every `Engine::attach` call,
/// never stashed in a global.
#[derive(Default)]
pub struct NativeBridgeRouter {
    bridges: StdMutex<HashMap<String, Arc<dyn NativeBridge>>>,
}

impl NativeBridgeRouter {
    /// Construct an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bridge` under its own `stream_id`.
    pub fn register(&self, bridge: Arc<dyn NativeBridge>) {
        self.bridges
            .lock()
            .expect("bridge router mutex poisoned")
            .insert(bridge.stream_id().to_string(), bridge);
    }

    /// Remove the bridge registered for `stream_id`, if any.
    pub fn unregister(&self, stream_id: &str) {
        self.bridges
            .lock()
            .expect("bridge router mutex poisoned")
            .remove(stream_id);
    }

    /// Route `bundle` to its stream's bridge, if registered and working.
    pub fn feed(&self, bundle: BridgeBundle) {
        let bridges = self.bridges.lock().expect("bridge router mutex poisoned");
        if let Some(bridge) = bridges.get(&bundle.stream_id) {
            if bridge.is_working() {
                bridge.feed(bundle);
            }
        }
    }

    /// Number of bridges currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bridges.lock().expect("bridge router mutex poisoned").len()
    }

    /// Whether no bridges are currently registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
