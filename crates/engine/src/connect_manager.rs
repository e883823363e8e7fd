//! Connection-state machine with gated transitions and observer fan-out.

use std::sync::Mutex;

use ssevent_core::{ConnectionObserver, ConnectionState};

/// Owns the connection state and its observers, enforcing the gated
/// transition rules unless a caller forces the transition through.
#[derive(Default)]
pub struct ConnectManager {
    state: Mutex<ConnectionState>,
    observers: Mutex<Vec<ConnectionObserver>>,
}

impl ConnectManager {
    /// Construct a manager starting in `DisconnectNormal`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::DisconnectNormal),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("connect manager mutex poisoned")
    }

    /// Whether the current state counts as connected, per
    /// [`ConnectionState::is_connected`].
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Register `observer`, replacing any existing observer with the same name.
    pub fn add_observer(&self, observer: ConnectionObserver) {
        let mut observers = self.observers.lock().expect("connect manager mutex poisoned");
        observers.retain(|o| o.name != observer.name);
        observers.push(observer);
    }

    /// Remove the observer named `name`, if any.
    pub fn remove_observer(&self, name: &str) {
        let mut observers = self.observers.lock().expect("connect manager mutex poisoned");
        observers.retain(|o| o.name != name);
    }

    /// Attempt a transition to `to`. Returns `true` if accepted (gated
    /// transitions listed below are rejected unless `force`):
    ///
    /// - from `ConnectSuspend` to `{ConnectException, ConnectIdle, ConnectActive}`
    /// - from `DisconnectNormal` to `ConnectException`
    /// - from `{ConnectException, DisconnectError}` to `ConnectIdle`
    ///
    /// An accepted transition that actually changes the state fires
    /// observers in priority-descending order (stable for ties); an
    /// observer returning `true` halts fan-out.
    pub fn transition(&self, to: ConnectionState, force: bool) -> bool {
        let mut state = self.state.lock().expect("connect manager mutex poisoned");
        if !force && is_gated(*state, to) {
            return false;
        }
        let changed = *state != to;
        *state = to;
        drop(state);

        if changed {
            self.notify(to);
        }
        true
    }

    fn notify(&self, state: ConnectionState) {
        let mut observers = self.observers.lock().expect("connect manager mutex poisoned");
        observers.sort_by(|a, b| b.priority.cmp(&a.priority));
        for observer in observers.iter() {
            if observer.notify(state) {
                break;
            }
        }
    }
}

fn is_gated(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::{
        ConnectActive, ConnectException, ConnectIdle, ConnectSuspend, DisconnectError,
        DisconnectNormal,
    };

    match from {
        ConnectSuspend => matches!(to, ConnectException | ConnectIdle | ConnectActive),
        DisconnectNormal => matches!(to, ConnectException),
        ConnectException | DisconnectError => matches!(to, ConnectIdle),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn rejects_gated_transitions_unless_forced() {
        let manager = ConnectManager::new();
        assert!(manager.transition(ConnectionState::ConnectSuspend, false));
        assert!(!manager.transition(ConnectionState::ConnectActive, false));
        assert_eq!(manager.state(), ConnectionState::ConnectSuspend);
        assert!(manager.transition(ConnectionState::ConnectActive, true));
        assert_eq!(manager.state(), ConnectionState::ConnectActive);
    }

    #[test]
    fn disconnect_normal_rejects_exception() {
        let manager = ConnectManager::new();
        assert_eq!(manager.state(), ConnectionState::DisconnectNormal);
        assert!(!manager.transition(ConnectionState::ConnectException, false));
    }

    #[test]
    fn exception_and_disconnect_error_reject_idle() {
        let manager = ConnectManager::new();
        manager.transition(ConnectionState::ConnectException, true);
        assert!(!manager.transition(ConnectionState::ConnectIdle, false));

        let manager = ConnectManager::new();
        manager.transition(ConnectionState::DisconnectError, true);
        assert!(!manager.transition(ConnectionState::ConnectIdle, false));
    }

    #[test]
    fn observers_fire_in_priority_order_and_can_halt() {
        let manager = ConnectManager::new();
        let order: Arc<StdMutex<Vec<&'static str>>> = Arc::new(StdMutex::new(Vec::new()));

        let order_hi = order.clone();
        manager.add_observer(ConnectionObserver::new("hi", 100, move |_state| {
            order_hi.lock().unwrap().push("hi");
            true
        }));
        let order_lo = order.clone();
        manager.add_observer(ConnectionObserver::new("lo", 1, move |_state| {
            order_lo.lock().unwrap().push("lo");
            false
        }));

        manager.transition(ConnectionState::ConnectActive, true);
        assert_eq!(*order.lock().unwrap(), vec!["hi"]);
    }

    #[test]
    fn add_observer_replaces_same_named() {
        let manager = ConnectManager::new();
        let calls = Arc::new(StdMutex::new(0));
        let calls1 = calls.clone();
        manager.add_observer(ConnectionObserver::new("obs", 0, move |_| {
            *calls1.lock().unwrap() += 1;
            false
        }));
        manager.add_observer(ConnectionObserver::new("obs", 0, |_| false));
        manager.transition(ConnectionState::ConnectActive, true);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn unchanged_state_does_not_fire_observers() {
        let manager = ConnectManager::new();
        let calls = Arc::new(StdMutex::new(0));
        let calls1 = calls.clone();
        manager.add_observer(ConnectionObserver::new("obs", 0, move |_| {
            *calls1.lock().unwrap() += 1;
            false
        }));
        assert!(manager.transition(ConnectionState::DisconnectNormal, false));
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
