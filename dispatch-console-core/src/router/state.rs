//! Router connection state management
//!
//! Defines the states of a connection handle and provides thread-safe
//! state tracking.

use std::sync::{Arc, Mutex};

/// Router connection states
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,

    /// Dialing, or re-dialing after a dropped link
    Connecting,

    /// Link established
    Connected,

    /// Gave up; the next connect starts over
    Failed(String),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// Thread-safe connection state wrapper
#[derive(Debug, Clone, Default)]
pub struct SharedConnectionState(Arc<Mutex<ConnectionState>>);

impl SharedConnectionState {
    /// Create a new shared connection state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current connection state
    pub fn get(&self) -> ConnectionState {
        match self.0.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Set the connection state
    pub fn set(&self, state: ConnectionState) {
        match self.0.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self.get(), ConnectionState::Connected)
    }

    /// Check if currently connecting
    pub fn is_connecting(&self) -> bool {
        matches!(self.get(), ConnectionState::Connecting)
    }

    /// Check if the handle gave up
    pub fn is_failed(&self) -> bool {
        matches!(self.get(), ConnectionState::Failed(_))
    }

    /// Transition to connecting state
    pub fn start_connecting(&self) {
        self.set(ConnectionState::Connecting);
    }

    /// Transition to connected state
    pub fn set_connected(&self) {
        self.set(ConnectionState::Connected);
    }

    /// Transition to disconnected state
    pub fn set_disconnected(&self) {
        self.set(ConnectionState::Disconnected);
    }

    /// Transition to failed state
    pub fn set_failed(&self, reason: String) {
        self.set(ConnectionState::Failed(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let state = SharedConnectionState::new();

        assert_eq!(state.get(), ConnectionState::Disconnected);
        assert!(!state.is_connected());

        state.start_connecting();
        assert!(state.is_connecting());

        state.set_connected();
        assert!(state.is_connected());

        state.set_failed("refused".to_string());
        assert!(state.is_failed());
        assert_eq!(state.get(), ConnectionState::Failed("refused".to_string()));

        state.set_disconnected();
        assert_eq!(state.get(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ConnectionState::Disconnected), "disconnected");
        assert_eq!(format!("{}", ConnectionState::Connecting), "connecting");
        assert_eq!(format!("{}", ConnectionState::Connected), "connected");
        assert_eq!(
            format!("{}", ConnectionState::Failed("test".to_string())),
            "failed: test"
        );
    }
}
