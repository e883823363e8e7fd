//! Core data model for the ssevent delivery engine: the event envelope,
//! cache bookkeeping, watch/response contracts, connection-state machine,
//! and engine configuration.
//!
//! Framing (turning bytes off the wire into [`event::Event`] values),
//! filtering, the paced cache pool, the interceptor chain, and the
//! connection manager itself all live in `ssevent-engine`, which depends on
//! this crate for the shared vocabulary.

pub mod cached;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod id;
pub mod response;
pub mod watch;

pub use cached::CachedEvent;
pub use clock::now_micros;
pub use config::{EngineConfig, EngineConfigBuilder};
pub use connection::{ConnectionObserver, ConnectionState, ObserverCallback};
pub use error::Error;
pub use event::Event;
pub use id::SubscriberId;
pub use response::Response;
pub use watch::WatchSpec;

/// `element_type` of the marker event synthesized when a stream opens.
pub const STREAM_OPEN_ELEMENT_TYPE: &str = "697";
/// `session_log_id` of the marker event synthesized when a stream opens.
pub const STREAM_OPEN_SESSION_LOG_ID: &str = "69602";

/// `element_type` of the marker event synthesized at stream end, consumed
/// internally to prune stream-scoped subscribers and cached entries.
pub const AUTO_REMOVE_ELEMENT_TYPE: &str = "698";
/// `session_log_id` used by the end-of-stream auto-remove marker when the
/// originating session is otherwise unknown.
pub const AUTO_REMOVE_SESSION_LOG_ID: &str = "69603";
