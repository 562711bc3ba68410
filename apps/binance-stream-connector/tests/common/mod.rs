//! Scripted in-memory transport shared by integration tests.
//!
//! Every `open` on [`FakeTransport`] creates a session whose server side is
//! handed to the test as a [`ServerEnd`]: the test pushes inbound events and
//! reads what the connector wrote. Dropping the `ServerEnd` ends the
//! client's stream as if the socket closed.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use binance_stream_connector::{
    CanonicalEvent, ConnectorConfig, ReconnectConfig, SubscriptionTarget, TransportConnector,
    TransportError, TransportEvent, TransportSession,
};
use tokio::sync::mpsc;

/// What the connector wrote to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    Pong(Vec<u8>),
    Close(String),
}

// =============================================================================
// Transport
// =============================================================================

pub struct FakeTransport {
    servers_tx: mpsc::UnboundedSender<ServerEnd>,
    servers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerEnd>>,
    failures: parking_lot::Mutex<VecDeque<TransportError>>,
    opens: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (servers_tx, servers_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            servers_tx,
            servers_rx: tokio::sync::Mutex::new(servers_rx),
            failures: parking_lot::Mutex::new(VecDeque::new()),
            opens: AtomicUsize::new(0),
        })
    }

    /// Make the next `open` fail.
    pub fn fail_next_open(&self, reason: &str) {
        self.failures
            .lock()
            .push_back(TransportError::Connect(reason.to_string()));
    }

    /// Number of `open` calls so far, failed ones included.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Wait for the next successfully opened session.
    pub async fn next_server(&self) -> ServerEnd {
        self.servers_rx
            .lock()
            .await
            .recv()
            .await
            .expect("transport dropped")
    }

    /// Next opened session, if one is already waiting.
    pub async fn try_next_server(&self) -> Option<ServerEnd> {
        self.servers_rx.lock().await.try_recv().ok()
    }
}

#[async_trait]
impl TransportConnector for FakeTransport {
    async fn open(&self, _url: &str) -> Result<Box<dyn TransportSession>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let _ = self.servers_tx.send(ServerEnd {
            inbound: inbound_tx,
            outbound: outbound_rx,
        });

        Ok(Box::new(FakeSession {
            inbound: inbound_rx,
            outbound: outbound_tx,
        }))
    }
}

// =============================================================================
// Session
// =============================================================================

struct FakeSession {
    inbound: mpsc::UnboundedReceiver<Result<TransportEvent, TransportError>>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl FakeSession {
    fn write(&self, frame: Outbound) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Send("server gone".to_string()))
    }
}

#[async_trait]
impl TransportSession for FakeSession {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.write(Outbound::Text(text))
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.write(Outbound::Ping)
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), TransportError> {
        self.write(Outbound::Pong(payload))
    }

    async fn next_event(&mut self) -> Option<Result<TransportEvent, TransportError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self, reason: &str) -> Result<(), TransportError> {
        let _ = self.write(Outbound::Close(reason.to_string()));
        Ok(())
    }
}

/// Server side of one fake session.
pub struct ServerEnd {
    inbound: mpsc::UnboundedSender<Result<TransportEvent, TransportError>>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl ServerEnd {
    pub fn push(&self, event: TransportEvent) {
        self.inbound.send(Ok(event)).expect("session gone");
    }

    pub fn push_text(&self, text: &str) {
        self.push(TransportEvent::Text(text.to_string()));
    }

    pub fn push_error(&self, reason: &str) {
        self.inbound
            .send(Err(TransportError::Protocol(reason.to_string())))
            .expect("session gone");
    }

    pub async fn next_outbound(&mut self) -> Outbound {
        self.outbound.recv().await.expect("session dropped")
    }

    pub fn try_outbound(&mut self) -> Option<Outbound> {
        self.outbound.try_recv().ok()
    }

    /// Next outbound frame parsed as a JSON text message.
    pub async fn next_control(&mut self) -> serde_json::Value {
        match self.next_outbound().await {
            Outbound::Text(text) => serde_json::from_str(&text).expect("control message is JSON"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn target() -> SubscriptionTarget {
    SubscriptionTarget::new("btcusdt", "BTC/USDT").unwrap()
}

/// Fixed 10s reconnect delay and no client heartbeat.
pub fn config() -> ConnectorConfig {
    ConnectorConfig::new(target())
        .with_url("wss://fake.test/ws")
        .with_reconnect(ReconnectConfig::fixed(Duration::from_secs(10)))
        .without_heartbeat()
}

/// Callback that forwards each invocation to a channel.
pub fn sink() -> (
    impl Fn(Vec<CanonicalEvent>) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Vec<CanonicalEvent>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = move |events: Vec<CanonicalEvent>| {
        let _ = tx.send(events);
    };
    (callback, rx)
}

pub const TICKER: &str = r#"{"e":"24hrMiniTicker","E":1700000000000,"s":"BTCUSDT","c":"43000.50","o":"42000.00","h":"43500.00","l":"41800.00","v":"1200.5","q":"51000000.0"}"#;

pub const TRADE: &str = r#"{"e":"trade","E":1700000000100,"s":"BTCUSDT","t":42,"p":"43001.10","q":"0.015","T":1700000000099,"m":true,"M":true}"#;

pub const DEPTH: &str = r#"{"lastUpdateId":160,"bids":[["43000.00","1.5"],["42999.90","3.0"]],"asks":[["43000.10","0.7"],["43000.20","2.1"]]}"#;
