//! Listener Session State Machine
//!
//! Defines the valid lifecycle of one socket session:
//!
//! ```text
//! UNBOUND -> BOUND -> SERVING -> FAULTED -> UNBOUND -> ...
//! ```
//!
//! Any state may move to STOPPED on an explicit shutdown request.

use std::fmt;

/// Lifecycle state of a listener session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket
    Unbound,
    /// Socket created and bound to the well-known port
    Bound,
    /// Receive loop running
    Serving,
    /// Unrecoverable socket error, socket about to be released
    Faulted,
    /// Shut down on request, terminal
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unbound => "UNBOUND",
            SessionState::Bound => "BOUND",
            SessionState::Serving => "SERVING",
            SessionState::Faulted => "FAULTED",
            SessionState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Socket created, receive timeout set and bound
    SocketBound,
    /// Receive loop entered
    ServingStarted,
    /// Receive wait expired without data
    ReceiveTimedOut,
    /// A datagram was received and answered
    PacketServed,
    /// Socket creation, bind, receive or send failed
    TransportFault,
    /// Faulted socket closed
    SessionReleased,
    /// External stop signal observed
    ShutdownRequested,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid; carries the new state
    Success(SessionState),
    /// Transition was invalid from current state
    Invalid {
        from: SessionState,
        event: SessionEvent,
    },
}

/// State machine for one listener instance
#[derive(Debug)]
pub struct SessionStateMachine {
    current_state: SessionState,
    sessions_started: u64,
    faults: u64,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Create a new state machine in Unbound state
    pub fn new() -> Self {
        Self {
            current_state: SessionState::Unbound,
            sessions_started: 0,
            faults: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.current_state
    }

    /// Number of sessions that reached BOUND
    pub fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    /// Number of faults seen over the lifetime of the listener
    pub fn faults(&self) -> u64 {
        self.faults
    }

    pub fn is_stopped(&self) -> bool {
        self.current_state == SessionState::Stopped
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: SessionEvent) -> TransitionResult {
        match self.next_state(event) {
            Some(state) => {
                match event {
                    SessionEvent::SocketBound => self.sessions_started += 1,
                    SessionEvent::TransportFault => self.faults += 1,
                    _ => {}
                }
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    fn next_state(&self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self.current_state, event) {
            // Nothing leaves Stopped
            (Stopped, _) => None,
            (_, ShutdownRequested) => Some(Stopped),

            (Unbound, SocketBound) => Some(Bound),
            (Unbound, TransportFault) => Some(Faulted),

            (Bound, ServingStarted) => Some(Serving),
            (Bound, TransportFault) => Some(Faulted),

            (Serving, ReceiveTimedOut | PacketServed) => Some(Serving),
            (Serving, TransportFault) => Some(Faulted),

            (Faulted, SessionReleased) => Some(Unbound),

            _ => None,
        }
    }
}
