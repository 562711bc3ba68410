//! Heartbeat Manager
//!
//! Client-side keepalive for the market data session. Pings are requested
//! on a fixed interval; if no inbound traffic at all (data, pong or server
//! ping) is seen within the timeout, the session is declared dead and the
//! reconnect loop takes over.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between ping messages.
    pub ping_interval: Duration,
    /// Silence after which the connection is considered dead.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(60),
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
        }
    }
}

/// Events emitted by the heartbeat manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Request to send a ping message.
    SendPing,
    /// No traffic within the timeout; the session should be restarted.
    Timeout,
}

/// Liveness shared between the heartbeat manager and the session loop.
#[derive(Debug)]
pub struct HeartbeatState {
    last_activity: Mutex<Instant>,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatState {
    /// Create new heartbeat state, counting now as the last activity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Record inbound traffic of any kind.
    pub fn record_activity(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last inbound traffic.
    #[must_use]
    pub fn time_since_activity(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }
}

/// Heartbeat manager that monitors connection health.
///
/// Exits after emitting [`HeartbeatEvent::Timeout`], when cancelled, or when
/// the event receiver is dropped.
pub struct HeartbeatManager {
    config: HeartbeatConfig,
    state: Arc<HeartbeatState>,
    event_tx: mpsc::Sender<HeartbeatEvent>,
    cancel: CancellationToken,
}

impl HeartbeatManager {
    /// Create a new heartbeat manager.
    #[must_use]
    pub const fn new(
        config: HeartbeatConfig,
        state: Arc<HeartbeatState>,
        event_tx: mpsc::Sender<HeartbeatEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            state,
            event_tx,
            cancel,
        }
    }

    /// Run the heartbeat monitoring loop.
    pub async fn run(self) {
        let period = self.config.ping_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Heartbeat manager cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if !self.check_and_ping().await {
                        break;
                    }
                }
            }
        }
    }

    /// Emit a timeout or a ping request. Returns `false` when the loop
    /// should exit.
    async fn check_and_ping(&self) -> bool {
        let silence = self.state.time_since_activity();
        if silence > self.config.pong_timeout {
            tracing::warn!(
                silence_secs = silence.as_secs(),
                timeout_secs = self.config.pong_timeout.as_secs(),
                "Heartbeat timeout detected"
            );
            let _ = self.event_tx.send(HeartbeatEvent::Timeout).await;
            return false;
        }

        if self.event_tx.send(HeartbeatEvent::SendPing).await.is_err() {
            tracing::debug!("Event channel closed, stopping heartbeat");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_manager(
        ping_secs: u64,
        timeout_secs: u64,
    ) -> (
        Arc<HeartbeatState>,
        mpsc::Receiver<HeartbeatEvent>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let state = Arc::new(HeartbeatState::new());
        let (event_tx, event_rx) = mpsc::channel(10);
        let cancel = CancellationToken::new();
        let manager = HeartbeatManager::new(
            HeartbeatConfig::new(Duration::from_secs(ping_secs), Duration::from_secs(timeout_secs)),
            state.clone(),
            event_tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(manager.run());
        (state, event_rx, cancel, handle)
    }

    #[test]
    fn default_config_values() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(20));
        assert_eq!(config.pong_timeout, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn state_tracks_activity() {
        let state = HeartbeatState::new();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(state.time_since_activity(), Duration::from_secs(5));

        state.record_activity();
        assert_eq!(state.time_since_activity(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn manager_requests_pings_on_interval() {
        let (state, mut event_rx, cancel, handle) = spawn_manager(20, 60);

        for _ in 0..3 {
            let event = event_rx.recv().await.unwrap();
            assert_eq!(event, HeartbeatEvent::SendPing);
            state.record_activity();
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn manager_detects_silence() {
        let (_state, mut event_rx, _cancel, handle) = spawn_manager(20, 60);

        // Pings at 20s, 40s and 60s; silence exceeds 60s at the 80s tick
        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                HeartbeatEvent::SendPing,
                HeartbeatEvent::SendPing,
                HeartbeatEvent::SendPing,
                HeartbeatEvent::Timeout,
            ]
        );
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn manager_stops_when_receiver_dropped() {
        let (_state, event_rx, _cancel, handle) = spawn_manager(1, 60);
        drop(event_rx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn manager_cancellation() {
        let (_state, _event_rx, cancel, handle) = spawn_manager(10, 10);
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok(), "manager should shut down on cancellation");
    }
}
