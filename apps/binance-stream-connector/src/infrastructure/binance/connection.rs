//! Connection Manager
//!
//! Owns the single transport session for a subscription target and drives
//! the connection state machine:
//!
//! ```text
//! connect() ─► Connecting ─► Subscribing ─► Streaming ─► Closing ─► Idle
//!                                                            │
//!                         backoff delay + admission ◄────────┘
//! ```
//!
//! The session, its heartbeat and the reconnect loop run inside one
//! supervisor task per connector. `connect()` resolves once the first
//! session reaches `Streaming` or fails on the way there.
//!
//! # Protocol
//!
//! After the socket opens, one SUBSCRIBE request listing every channel is
//! sent through the rate-limited send path. Each inbound text frame is then
//! decoded, classified and normalized, and the callback is invoked with the
//! resulting zero or one events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, InboundFrame, RawRecord, WireCodec};
use super::heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatState};
use super::messages::ControlRequest;
use super::normalizer::Normalizer;
use super::reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
use super::transport::DEFAULT_STREAM_URL;
use crate::application::ports::{
    EventCallback, TransportConnector, TransportError, TransportEvent, TransportSession,
};
use crate::application::services::rate_limiter::{RateLimitConfig, SharedRateLimiter};
use crate::domain::connection::ConnectionState;
use crate::domain::streaming::CanonicalEvent;
use crate::domain::subscription::SubscriptionTarget;
use crate::infrastructure::metrics::{self, LimitedAction};

// =============================================================================
// Error Type
// =============================================================================

/// Errors surfaced by the connection manager.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Connection-attempt admission refused by the rate limiter.
    #[error("connection attempt refused: rate limit exceeded")]
    AdmissionRefused,

    /// A supervised session already exists for this connector.
    #[error("a session is already active")]
    SessionActive,

    /// No streaming session to send on.
    #[error("not connected")]
    NotConnected,

    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Session ended before the operation completed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Reconnect loop gave up.
    #[error(transparent)]
    Reconnect(#[from] ReconnectError),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the connector.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// WebSocket URL.
    pub url: String,
    /// Trading pair to stream.
    pub target: SubscriptionTarget,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Heartbeat configuration (`None` disables client pings).
    pub heartbeat: Option<HeartbeatConfig>,
    /// Connection and send limits.
    pub rate_limits: RateLimitConfig,
}

impl ConnectorConfig {
    /// Create a configuration with default endpoint and policies.
    #[must_use]
    pub fn new(target: SubscriptionTarget) -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            target,
            reconnect: ReconnectConfig::default(),
            heartbeat: Some(HeartbeatConfig::default()),
            rate_limits: RateLimitConfig::default(),
        }
    }

    /// Set the WebSocket URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the reconnection configuration.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the heartbeat configuration.
    #[must_use]
    pub const fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Disable client pings.
    #[must_use]
    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat = None;
        self
    }

    /// Set the rate limits.
    #[must_use]
    pub fn with_rate_limits(mut self, rate_limits: RateLimitConfig) -> Self {
        self.rate_limits = rate_limits;
        self
    }
}

// =============================================================================
// Session Commands
// =============================================================================

/// Result of a rate-limited control send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the session.
    Sent,
    /// Refused by the send limiter; not queued or retried.
    Throttled,
}

/// Requests delivered to the live session.
#[derive(Debug)]
enum SessionCommand {
    Unsubscribe {
        reply: oneshot::Sender<Result<SendOutcome, ConnectionError>>,
    },
}

/// How one session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Closed or failed; reconnect follows.
    Closed,
    /// Connector dropped.
    Cancelled,
}

/// Why the streaming loop exited.
#[derive(Debug)]
enum LoopExit {
    Cancelled,
    RemoteClosed,
    Stale,
    Failed(ConnectionError),
}

type ReadySender = oneshot::Sender<Result<(), ConnectionError>>;

// =============================================================================
// Connection Manager
// =============================================================================

/// Drives the single transport session for one subscription target.
pub struct ConnectionManager {
    config: ConnectorConfig,
    transport: Arc<dyn TransportConnector>,
    limiter: SharedRateLimiter,
    state: RwLock<ConnectionState>,
    commands: Mutex<Option<mpsc::Sender<SessionCommand>>>,
    supervising: AtomicBool,
    next_request_id: AtomicU64,
    codec: WireCodec,
    normalizer: Normalizer,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Create a manager. Cancelling `cancel` ends the session and the
    /// reconnect loop.
    #[must_use]
    pub fn new(
        config: ConnectorConfig,
        transport: Arc<dyn TransportConnector>,
        limiter: SharedRateLimiter,
        cancel: CancellationToken,
    ) -> Self {
        let normalizer = Normalizer::new(config.target.clone());
        Self {
            config,
            transport,
            limiter,
            state: RwLock::new(ConnectionState::Idle),
            commands: Mutex::new(None),
            supervising: AtomicBool::new(false),
            next_request_id: AtomicU64::new(1),
            codec: WireCodec::new(),
            normalizer,
            cancel,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether a session or its reconnect loop is alive.
    #[must_use]
    pub fn is_supervising(&self) -> bool {
        self.supervising.load(Ordering::SeqCst)
    }

    /// Subscription target.
    #[must_use]
    pub const fn target(&self) -> &SubscriptionTarget {
        &self.config.target
    }

    /// Start the supervised session and wait until it is streaming.
    ///
    /// The callback is kept for every later reconnect.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::SessionActive`] if a session already exists
    /// - [`ConnectionError::AdmissionRefused`] if the attempt limit is hit;
    ///   no retry is scheduled
    /// - Transport or codec errors from the first open/subscribe; the
    ///   reconnect loop keeps running in the background
    pub async fn connect(self: &Arc<Self>, callback: EventCallback) -> Result<(), ConnectionError> {
        if self.supervising.swap(true, Ordering::SeqCst) {
            return Err(ConnectionError::SessionActive);
        }

        if !self.admit_attempt() {
            self.supervising.store(false, Ordering::SeqCst);
            tracing::warn!(
                target_symbol = %self.config.target,
                "Connection attempt refused by rate limit"
            );
            metrics::record_rate_limited(LimitedAction::Connect);
            return Err(ConnectionError::AdmissionRefused);
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.supervise(callback, ready_tx).await });

        ready_rx
            .await
            .unwrap_or(Err(ConnectionError::ConnectionClosed))
    }

    /// Send UNSUBSCRIBE for every channel over the live session.
    ///
    /// The session stays open and the state does not change.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] when no session is
    /// streaming, or the send failure.
    pub async fn unsubscribe(&self) -> Result<SendOutcome, ConnectionError> {
        let sender = self
            .commands
            .lock()
            .clone()
            .ok_or(ConnectionError::NotConnected)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(SessionCommand::Unsubscribe { reply: reply_tx })
            .await
            .map_err(|_| ConnectionError::NotConnected)?;

        reply_rx
            .await
            .unwrap_or(Err(ConnectionError::ConnectionClosed))
    }

    // =========================================================================
    // Supervisor
    // =========================================================================

    async fn supervise(self: Arc<Self>, callback: EventCallback, ready: ReadySender) {
        let _guard = SupervisorGuard { manager: &*self };
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        let mut ready = Some(ready);

        let result = loop {
            self.set_state(ConnectionState::Connecting);
            if self.run_session(&callback, &mut ready, &mut policy).await == SessionEnd::Cancelled {
                break Ok(());
            }

            match self.wait_for_reconnect(&mut policy).await {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        match result {
            Ok(()) => tracing::info!("Binance stream supervisor stopped"),
            Err(e) => tracing::error!(error = %e, "Binance stream supervisor gave up"),
        }
    }

    /// Sleep for the next backoff delay, then pass admission.
    ///
    /// Returns `Ok(false)` when cancelled. A refused admission waits for
    /// the following delay.
    async fn wait_for_reconnect(&self, policy: &mut ReconnectPolicy) -> Result<bool, ConnectionError> {
        loop {
            let Some(delay) = policy.next_delay() else {
                return Err(ReconnectError::MaxAttemptsExceeded(policy.attempt_count()).into());
            };
            let attempt = policy.attempt_count();
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting to Binance stream"
            );

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Cancelled during reconnect delay");
                    return Ok(false);
                }
                () = tokio::time::sleep(delay) => {}
            }

            if self.admit_attempt() {
                metrics::record_reconnect();
                return Ok(true);
            }
            tracing::warn!(attempt, "Reconnect attempt refused by rate limit");
            metrics::record_rate_limited(LimitedAction::Connect);
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Run one session from open to teardown. Always leaves the state at
    /// `Idle`.
    async fn run_session(
        &self,
        callback: &EventCallback,
        ready: &mut Option<ReadySender>,
        policy: &mut ReconnectPolicy,
    ) -> SessionEnd {
        tracing::info!(
            url = %self.config.url,
            target_symbol = %self.config.target,
            "Connecting to Binance stream"
        );

        let opened = tokio::select! {
            () = self.cancel.cancelled() => None,
            result = self.transport.open(&self.config.url) => Some(result),
        };
        let mut session = match opened {
            None => {
                self.set_state(ConnectionState::Closing);
                self.set_state(ConnectionState::Idle);
                return SessionEnd::Cancelled;
            }
            Some(Err(e)) => {
                self.abort_setup(ready, e.into());
                return SessionEnd::Closed;
            }
            Some(Ok(session)) => session,
        };

        self.set_state(ConnectionState::Subscribing);
        let request = ControlRequest::subscribe(self.config.target.stream_names(), self.next_id());
        match self.send_control(session.as_mut(), &request).await {
            Ok(SendOutcome::Sent) => {}
            Ok(SendOutcome::Throttled) => {
                tracing::warn!("Subscribe request throttled; streaming without confirmation");
            }
            Err(e) => {
                let _ = session.close("subscribe failed").await;
                self.abort_setup(ready, e);
                return SessionEnd::Closed;
            }
        }

        self.set_state(ConnectionState::Streaming);
        policy.reset();
        if let Some(tx) = ready.take() {
            let _ = tx.send(Ok(()));
        }
        tracing::info!(target_symbol = %self.config.target, "Streaming Binance market data");

        let (command_tx, command_rx) = mpsc::channel(8);
        *self.commands.lock() = Some(command_tx);

        let exit = self.stream(session.as_mut(), callback, command_rx).await;

        *self.commands.lock() = None;
        self.teardown(session.as_mut(), exit).await
    }

    async fn stream(
        &self,
        session: &mut dyn TransportSession,
        callback: &EventCallback,
        mut command_rx: mpsc::Receiver<SessionCommand>,
    ) -> LoopExit {
        let heartbeat_state = Arc::new(HeartbeatState::new());
        let heartbeat_cancel = self.cancel.child_token();
        let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel::<HeartbeatEvent>(4);
        let mut heartbeat_open = if let Some(config) = &self.config.heartbeat {
            let manager = HeartbeatManager::new(
                config.clone(),
                heartbeat_state.clone(),
                heartbeat_tx,
                heartbeat_cancel.clone(),
            );
            tokio::spawn(manager.run());
            true
        } else {
            drop(heartbeat_tx);
            false
        };

        let exit = loop {
            tokio::select! {
                () = self.cancel.cancelled() => break LoopExit::Cancelled,
                Some(command) = command_rx.recv() => {
                    match command {
                        SessionCommand::Unsubscribe { reply } => {
                            let request = ControlRequest::unsubscribe(
                                self.config.target.stream_names(),
                                self.next_id(),
                            );
                            let _ = reply.send(self.send_control(session, &request).await);
                        }
                    }
                }
                event = heartbeat_rx.recv(), if heartbeat_open => {
                    match event {
                        Some(HeartbeatEvent::SendPing) => {
                            if let Err(e) = session.send_ping().await {
                                break LoopExit::Failed(e.into());
                            }
                        }
                        Some(HeartbeatEvent::Timeout) => break LoopExit::Stale,
                        None => heartbeat_open = false,
                    }
                }
                event = session.next_event() => {
                    heartbeat_state.record_activity();
                    match event {
                        Some(Ok(TransportEvent::Text(text))) => self.handle_text(&text, callback),
                        Some(Ok(TransportEvent::Ping(payload))) => {
                            if let Err(e) = session.send_pong(payload).await {
                                break LoopExit::Failed(e.into());
                            }
                        }
                        Some(Ok(TransportEvent::Pong)) => {}
                        Some(Ok(TransportEvent::Binary(data))) => {
                            tracing::debug!(len = data.len(), "Ignoring binary frame");
                        }
                        Some(Ok(TransportEvent::Closed(info))) => {
                            tracing::info!(
                                code = info.as_ref().map(|i| i.code),
                                reason = info.as_ref().map(|i| i.reason.as_str()),
                                "Server sent close frame"
                            );
                            break LoopExit::RemoteClosed;
                        }
                        Some(Err(e)) => break LoopExit::Failed(e.into()),
                        None => {
                            tracing::info!("WebSocket stream ended");
                            break LoopExit::RemoteClosed;
                        }
                    }
                }
            }
        };

        heartbeat_cancel.cancel();
        exit
    }

    async fn teardown(&self, session: &mut dyn TransportSession, exit: LoopExit) -> SessionEnd {
        let end = match exit {
            LoopExit::Cancelled => {
                self.set_state(ConnectionState::Closing);
                let _ = session.close("connector dropped").await;
                SessionEnd::Cancelled
            }
            LoopExit::RemoteClosed => {
                self.set_state(ConnectionState::Closing);
                SessionEnd::Closed
            }
            LoopExit::Stale => {
                tracing::warn!("Heartbeat timeout, closing Binance stream");
                self.set_state(ConnectionState::Closing);
                let _ = session.close("heartbeat timeout").await;
                SessionEnd::Closed
            }
            LoopExit::Failed(e) => {
                tracing::warn!(error = %e, "Binance stream error");
                self.set_state(ConnectionState::Errored);
                self.set_state(ConnectionState::Closing);
                let _ = session.close("transport error").await;
                SessionEnd::Closed
            }
        };
        self.set_state(ConnectionState::Idle);
        end
    }

    /// Fail an attempt that never reached `Streaming`.
    fn abort_setup(&self, ready: &mut Option<ReadySender>, error: ConnectionError) {
        tracing::warn!(error = %error, "Binance stream setup failed");
        self.set_state(ConnectionState::Errored);
        self.set_state(ConnectionState::Closing);
        self.set_state(ConnectionState::Idle);
        if let Some(tx) = ready.take() {
            let _ = tx.send(Err(error));
        }
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Decode, classify and normalize one text frame, then invoke the
    /// callback with zero or one events.
    fn handle_text(&self, text: &str, callback: &EventCallback) {
        let started = Instant::now();
        metrics::record_frame_received();

        let events: Vec<CanonicalEvent> = match self.codec.decode(text) {
            Ok(InboundFrame::Record(record)) => self.normalize(&record).into_iter().collect(),
            Ok(InboundFrame::Ack(ack)) => {
                tracing::info!(id = ?ack.id, "Control request acknowledged");
                Vec::new()
            }
            Ok(InboundFrame::ControlError(response)) => {
                tracing::warn!(
                    id = ?response.id,
                    code = response.error.code,
                    msg = %response.error.msg,
                    "Control request rejected"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, payload = %text, "Failed to decode frame");
                metrics::record_frame_dropped("decode");
                Vec::new()
            }
        };

        for event in &events {
            metrics::record_event_emitted(event.kind());
        }
        callback(events);
        metrics::record_processing_duration(started.elapsed());
    }

    fn normalize(&self, record: &RawRecord) -> Option<CanonicalEvent> {
        let Some(kind) = self.codec.classify(record) else {
            tracing::debug!(payload = %record.as_value(), "Discarding unclassified frame");
            metrics::record_frame_dropped("unclassified");
            return None;
        };

        match self.normalizer.to_canonical(kind, record) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(
                    kind = kind.as_str(),
                    error = %e,
                    payload = %record.as_value(),
                    "Dropping frame that failed normalization"
                );
                metrics::record_frame_dropped(e.reason());
                None
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn send_control(
        &self,
        session: &mut dyn TransportSession,
        request: &ControlRequest,
    ) -> Result<SendOutcome, ConnectionError> {
        if !self.limiter.lock().admit_send(now()) {
            tracing::warn!(
                method = request.method.as_str(),
                id = request.id,
                "Control message throttled by rate limit"
            );
            metrics::record_rate_limited(LimitedAction::Send);
            return Ok(SendOutcome::Throttled);
        }

        let text = self.codec.encode(request)?;
        session.send_text(text).await?;
        tracing::info!(
            method = request.method.as_str(),
            id = request.id,
            streams = ?request.params,
            "Control message sent"
        );
        Ok(SendOutcome::Sent)
    }

    fn admit_attempt(&self) -> bool {
        self.limiter.lock().admit_connection_attempt(now())
    }

    fn next_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write();
        let previous = *state;
        match previous.transition(next) {
            Ok(current) => {
                *state = current;
                drop(state);
                tracing::debug!(from = %previous, to = %current, "Connection state changed");
                metrics::set_connection_state(previous, current);
            }
            Err(e) => {
                drop(state);
                tracing::error!(error = %e, "Rejected connection state change");
            }
        }
    }
}

/// Releases the supervisor slot when the supervisor exits, including by
/// unwinding out of a panicking callback.
struct SupervisorGuard<'a> {
    manager: &'a ConnectionManager,
}

impl Drop for SupervisorGuard<'_> {
    fn drop(&mut self) {
        let manager = self.manager;
        *manager.commands.lock() = None;

        let previous = std::mem::replace(&mut *manager.state.write(), ConnectionState::Idle);
        if previous != ConnectionState::Idle {
            tracing::error!(from = %previous, "Supervisor exited mid-session; state forced to idle");
            metrics::set_connection_state(previous, ConnectionState::Idle);
        }

        manager.supervising.store(false, Ordering::SeqCst);
    }
}

/// Current instant on the Tokio clock, so paused-time tests see the same
/// time as the limiter.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
