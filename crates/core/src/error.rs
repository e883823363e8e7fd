//! Domain-level error types shared by the engine crate.
//!
//! These cover invariant violations in the data model itself (an empty
//! subscriber name, an empty watch event type); orchestration-level failures
//! (transforming-in-progress, transport errors) live in `ssevent-engine`'s
//! own `EngineError` instead, since they only make sense once the pipeline is
//! wired together.

use thiserror::Error;

/// Errors raised by the core data model's validating constructors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A subscriber (or its builder, defined in `ssevent-engine`) was given an empty `name`.
    #[error("subscriber name must not be empty")]
    EmptySubscriberName,

    /// A [`crate::watch::WatchSpec`] was given an empty `event_type`.
    #[error("watch spec event type must not be empty")]
    EmptyWatchEventType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_stable() {
        assert_eq!(
            Error::EmptySubscriberName.to_string(),
            "subscriber name must not be empty"
        );
        assert_eq!(
            Error::EmptyWatchEventType.to_string(),
            "watch spec event type must not be empty"
        );
    }
}
