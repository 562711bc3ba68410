//! Rate Limiter
//!
//! Enforces the exchange's connection and control-message limits:
//!
//! - **Connection attempts**: rolling window (default 300 attempts per 300s),
//!   pruned on every check and fully cleared by a periodic reset task.
//! - **Control messages**: fixed 1-second window (default 5 sends). Refused
//!   sends are not queued or retried.
//!
//! The limiter never blocks and takes the current instant as a parameter.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Configuration
// =============================================================================

/// Rate limit parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Rolling window for connection attempts.
    pub attempt_window: Duration,
    /// Maximum admitted attempts inside the window.
    pub max_attempts: usize,
    /// Control-message window.
    pub send_window: Duration,
    /// Maximum control messages per send window.
    pub max_sends_per_window: u32,
    /// Period of the full attempt reset.
    pub reset_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            attempt_window: Duration::from_secs(300),
            max_attempts: 300,
            send_window: Duration::from_secs(1),
            max_sends_per_window: 5,
            reset_interval: Duration::from_secs(300),
        }
    }
}

// =============================================================================
// Limiter
// =============================================================================

/// Limiter shared between the connection manager and the reset task.
pub type SharedRateLimiter = Arc<Mutex<RateLimiter>>;

/// Connection-attempt and control-message limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    attempts: VecDeque<Instant>,
    send_window_start: Option<Instant>,
    sends_in_window: u32,
}

impl RateLimiter {
    /// Create a limiter with the given limits.
    #[must_use]
    pub const fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            attempts: VecDeque::new(),
            send_window_start: None,
            sends_in_window: 0,
        }
    }

    /// Wrap a new limiter for sharing.
    #[must_use]
    pub fn shared(config: RateLimitConfig) -> SharedRateLimiter {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// Admit or refuse a connection attempt at `now`.
    ///
    /// Attempts older than the window are discarded first. Only admitted
    /// attempts are recorded.
    pub fn admit_connection_attempt(&mut self, now: Instant) -> bool {
        let window = self.config.attempt_window;
        while let Some(&oldest) = self.attempts.front() {
            if now.saturating_duration_since(oldest) > window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }

        if self.attempts.len() >= self.config.max_attempts {
            return false;
        }

        self.attempts.push_back(now);
        true
    }

    /// Admit or refuse a control-message send at `now`.
    pub fn admit_send(&mut self, now: Instant) -> bool {
        let expired = self
            .send_window_start
            .is_none_or(|start| now.saturating_duration_since(start) > self.config.send_window);
        if expired {
            self.send_window_start = Some(now);
            self.sends_in_window = 0;
        }

        if self.sends_in_window >= self.config.max_sends_per_window {
            return false;
        }

        self.sends_in_window += 1;
        true
    }

    /// Forget every tracked connection attempt.
    pub fn reset_connection_attempts(&mut self) {
        self.attempts.clear();
    }

    /// Number of attempts currently tracked.
    #[must_use]
    pub fn tracked_attempts(&self) -> usize {
        self.attempts.len()
    }

    /// Active limits.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

// =============================================================================
// Reset Task
// =============================================================================

/// Periodic task that clears all tracked connection attempts.
///
/// Runs until [`RateLimitResetTask::stop`] is called or the parent token is
/// cancelled.
#[derive(Debug)]
pub struct RateLimitResetTask {
    cancel: CancellationToken,
}

impl RateLimitResetTask {
    /// Spawn the reset cycle on the current Tokio runtime.
    ///
    /// A zero `period` spawns nothing and the task reports inactive.
    #[must_use]
    pub fn spawn(limiter: SharedRateLimiter, period: Duration, parent: &CancellationToken) -> Self {
        let cancel = parent.child_token();
        if period.is_zero() {
            tracing::warn!("Rate limit reset period is zero; periodic reset disabled");
            cancel.cancel();
            return Self { cancel };
        }
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        tracing::debug!("Rate limit reset task stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let mut guard = limiter.lock();
                        let cleared = guard.tracked_attempts();
                        guard.reset_connection_attempts();
                        drop(guard);
                        tracing::debug!(cleared, "Connection attempt counter reset");
                    }
                }
            }
        });

        Self { cancel }
    }

    /// Stop the cycle. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the cycle is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for RateLimitResetTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
