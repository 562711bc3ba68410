//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TransportConnector`: Opens a streaming session to the exchange
//! - `TransportSession`: One live, bidirectional frame channel
//!
//! ## Driver Ports (Inbound)
//!
//! - `EventCallback`: Consumer sink for canonical events

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::streaming::CanonicalEvent;

// =============================================================================
// Callback
// =============================================================================

/// Consumer callback invoked once per inbound text frame with zero or one
/// canonical events, in wire order.
pub type EventCallback = Arc<dyn Fn(Vec<CanonicalEvent>) + Send + Sync>;

// =============================================================================
// Transport
// =============================================================================

/// Close frame details reported by the remote end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code.
    pub code: u16,
    /// Close reason text.
    pub reason: String,
}

/// Inbound transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame (not used by the exchange; ignored).
    Binary(Vec<u8>),
    /// Keepalive ping carrying a payload to echo.
    Ping(Vec<u8>),
    /// Pong reply to a client ping.
    Pong,
    /// Remote close, with the close frame when one was sent.
    Closed(Option<CloseInfo>),
}

/// Transport layer failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Opening the session failed.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),
    /// Protocol or read failure on an open session.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Factory for transport sessions.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a session to `url`, completing once the handshake is done.
    async fn open(&self, url: &str) -> Result<Box<dyn TransportSession>, TransportError>;
}

/// One live transport session, exclusively owned by the connection manager.
#[async_trait]
pub trait TransportSession: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a client ping.
    async fn send_ping(&mut self) -> Result<(), TransportError>;

    /// Answer a server ping.
    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Wait for the next inbound event; `None` once the stream has ended.
    async fn next_event(&mut self) -> Option<Result<TransportEvent, TransportError>>;

    /// Close the session with a reason.
    async fn close(&mut self, reason: &str) -> Result<(), TransportError>;
}
