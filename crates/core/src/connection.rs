use std::fmt;

use serde::{Deserialize, Serialize};

/// The logical connection state of the underlying stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Actively receiving events.
    ConnectActive,
    /// Connected but no events have arrived recently (below the exception threshold).
    ConnectIdle,
    /// Connected but idle for long enough to be considered abnormal.
    ConnectException,
    /// Connected but delivery is paused (e.g. the cache pool is paused).
    ConnectSuspend,
    /// Disconnected, attempting to repair the connection.
    DisconnectRepairing,
    /// Disconnected due to a transport error.
    DisconnectError,
    /// Disconnected normally (stream completed or was never opened).
    DisconnectNormal,
}

impl ConnectionState {
    /// `true` for states considered abnormal: [`Self::ConnectException`] and
    /// [`Self::DisconnectError`].
    #[must_use]
    pub fn is_abnormal(self) -> bool {
        matches!(self, Self::ConnectException | Self::DisconnectError)
    }

    /// `true` for any state in which the underlying stream is still
    /// considered connected (even if idle or exceptional).
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            Self::ConnectActive | Self::ConnectIdle | Self::ConnectException | Self::ConnectSuspend
        )
    }
}

/// A callback invoked on every accepted, state-changing transition.
///
/// Returning `true` halts fan-out to lower-priority observers.
pub type ObserverCallback = Box<dyn Fn(ConnectionState) -> bool + Send + Sync>;

/// A named, prioritized observer of connection-state changes.
pub struct ConnectionObserver {
    /// Observer name; used to replace a same-named observer on re-registration.
    pub name: String,
    /// Higher priority is notified earlier.
    pub priority: i32,
    callback: ObserverCallback,
}

impl ConnectionObserver {
    /// Construct an observer from a name, priority, and callback.
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        callback: impl Fn(ConnectionState) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            callback: Box::new(callback),
        }
    }

    /// Invoke the callback, returning whether fan-out should halt.
    pub fn notify(&self, state: ConnectionState) -> bool {
        (self.callback)(state)
    }
}

impl fmt::Debug for ConnectionObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionObserver")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
