//! Error types for the delivery engine.

use thiserror::Error;

/// Errors raised while operating the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An SSE request was issued while a primary stream was already
    /// transforming. Callers distinguish this from a real transport failure
    /// by matching on this variant rather than on message text.
    #[error("a primary stream is already in progress")]
    StreamTransforming,

    /// The upstream transport reported a transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The native bridge yielded an abnormal-end bundle for a stream.
    #[error("native bridge reported an abnormal end: {0}")]
    BridgeAbnormalEnd(String),

    /// A subscriber with the same name already exists and `isOnly` was set.
    #[error("subscriber {name:?} already registered")]
    DuplicateSubscriber {
        /// The conflicting subscriber's name.
        name: String,
    },

    /// A domain-level invariant from `ssevent-core` was violated.
    #[error(transparent)]
    Core(#[from] ssevent_core::Error),
}

impl EngineError {
    /// Returns `true` if this error reflects a transport-level failure,
    /// as opposed to a self-emitted rejection like
    /// [`EngineError::StreamTransforming`].
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::BridgeAbnormalEnd(_))
    }

    /// Returns `true` if this is the self-emitted "already transforming" rejection.
    #[must_use]
    pub fn is_transforming_rejection(&self) -> bool {
        matches!(self, Self::StreamTransforming)
    }
}
