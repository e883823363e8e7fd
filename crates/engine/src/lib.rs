//! Client-side SSE delivery engine.
//!
//! Turns a raw, chunked text stream carrying framed SSE payloads into
//! ordered, at-most-once, priority-ordered deliveries to a dynamic set of
//! subscribers, and tracks the logical connection state of the underlying
//! stream. `ssevent-core` supplies the shared data model; this crate wires
//! it into a running pipeline:
//!
//! - [`stream_adapter`] turns raw chunks into [`ssevent_core::Event`]s.
//! - [`filter`] asynchronously expands one event into zero or more.
//! - [`cache`] paces delivery through a dual main/peek buffer.
//! - [`chain`] and [`registry`] dispatch each cached event to matching
//!   subscribers under priority and chain-of-responsibility semantics.
//! - [`connect_manager`] tracks the connection-state machine.
//! - [`engine`] orchestrates all of the above behind one handle.
//!
//! # Quick start
//!
//! ```no_run
//! use ssevent_core::{EngineConfig, WatchSpec};
//! use ssevent_engine::{Engine, Subscriber};
//!
//! # async fn run() {
//! let engine = Engine::builder(EngineConfig::default()).build();
//! engine
//!     .add_subscriber(
//!         Subscriber::builder("ui-renderer")
//!             .watch(WatchSpec::new("text"))
//!             .callback(|_chain, response| response.consumed())
//!             .build(),
//!         false,
//!     )
//!     .expect("first registration under this name");
//!
//! engine.handle_stream_opened("/v1/stream").await;
//! engine.handle_stream_chunk(r#"data:{"elementType":"text","sessionLogId":"s1","result":"hi"}>s"#, "/v1/stream").await;
//! engine.handle_stream_done("/v1/stream").await;
//! # }
//! ```

pub mod bridge;
pub mod cache;
pub mod chain;
pub mod connect_manager;
pub mod engine;
pub mod error;
pub mod filter;
pub mod http;
pub mod registry;
pub mod stream_adapter;
pub mod subscriber;

pub use bridge::{BridgeBundle, BridgeSignal, ChannelBridge, NativeBridge, NativeBridgeRouter};
pub use cache::{CacheDeliverer, CacheState, PopOutcome};
pub use chain::Chain;
pub use connect_manager::ConnectManager;
pub use engine::{AgentStream, AgentStreamOptions, Engine, EngineBuilder};
pub use error::EngineError;
pub use filter::{EventFilter, FilterService};
pub use http::{EngineRequest, EngineResponse, HttpClientHandle, HttpInterceptor};
pub use registry::{DispatchResult, InterceptorRegistry};
pub use stream_adapter::{DefaultStreamAdapter, FrameAdapter};
pub use subscriber::{AutoClearStrategy, Subscriber, SubscriberBuilder};
