//! Connection State Machine
//!
//! ```text
//! Idle ──► Connecting ──► Subscribing ──► Streaming ──► Closing ──► Idle
//!              │               │              │            ▲
//!              └───────────────┴──────────────┴─► Errored ─┘
//! ```
//!
//! Any live state may also close directly when the transport goes away.

use std::fmt;

/// Lifecycle state of the connector's transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session and no attempt in flight.
    #[default]
    Idle,
    /// Opening the transport.
    Connecting,
    /// Transport open, subscribe request being sent.
    Subscribing,
    /// Receiving and normalizing frames.
    Streaming,
    /// Transport failed; teardown follows.
    Errored,
    /// Session being torn down.
    Closing,
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid connection state transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// State before the attempted transition.
    pub from: ConnectionState,
    /// Requested state.
    pub to: ConnectionState,
}

impl ConnectionState {
    /// Check whether `next` is reachable from this state in one step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Connecting)
                | (Self::Connecting, Self::Subscribing)
                | (Self::Subscribing, Self::Streaming)
                | (
                    Self::Connecting | Self::Subscribing | Self::Streaming,
                    Self::Errored | Self::Closing
                )
                | (Self::Errored, Self::Closing)
                | (Self::Closing, Self::Idle)
        )
    }

    /// Move to `next`, validating the edge.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the edge does not exist.
    pub const fn transition(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether a transport session exists in this state.
    #[must_use]
    pub const fn has_session(self) -> bool {
        matches!(self, Self::Subscribing | Self::Streaming)
    }

    /// Get the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Errored => "errored",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    use ConnectionState::{Closing, Connecting, Errored, Idle, Streaming, Subscribing};

    #[test]
    fn happy_path_cycle() {
        let state = Idle
            .transition(Connecting)
            .and_then(|s| s.transition(Subscribing))
            .and_then(|s| s.transition(Streaming))
            .and_then(|s| s.transition(Closing))
            .and_then(|s| s.transition(Idle));
        assert_eq!(state, Ok(Idle));
    }

    #[test_case(Connecting ; "from connecting")]
    #[test_case(Subscribing ; "from subscribing")]
    #[test_case(Streaming ; "from streaming")]
    fn errored_reachable_and_always_closes(from: ConnectionState) {
        let errored = from.transition(Errored).unwrap();
        assert!(!errored.can_transition_to(Idle));
        assert!(!errored.can_transition_to(Connecting));
        assert_eq!(errored.transition(Closing), Ok(Closing));
    }

    #[test_case(Idle, Streaming ; "idle cannot stream")]
    #[test_case(Idle, Errored ; "idle cannot error")]
    #[test_case(Streaming, Connecting ; "no resurrection")]
    #[test_case(Closing, Connecting ; "closing returns to idle first")]
    fn invalid_edges(from: ConnectionState, to: ConnectionState) {
        assert_eq!(from.transition(to), Err(InvalidTransition { from, to }));
    }

    #[test]
    fn session_states() {
        assert!(Streaming.has_session());
        assert!(Subscribing.has_session());
        assert!(!Idle.has_session());
        assert!(!Closing.has_session());
    }

    #[test]
    fn display_names() {
        assert_eq!(Idle.to_string(), "idle");
        assert_eq!(Errored.to_string(), "errored");
    }
}
