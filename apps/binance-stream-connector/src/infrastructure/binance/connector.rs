//! Binance Connector
//!
//! Public entry point: one connector per trading pair, one callback per
//! connector.
//!
//! # Example
//!
//! ```rust,no_run
//! use binance_stream_connector::{BinanceConnector, ConnectorConfig, SubscriptionTarget};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let target = SubscriptionTarget::from_canonical("BTC/USDT")?;
//! let connector = BinanceConnector::new(ConnectorConfig::new(target));
//!
//! connector
//!     .connect(|events| {
//!         for event in events {
//!             println!("{event:?}");
//!         }
//!     })
//!     .await?;
//!
//! connector.stop().await?;
//! connector.cleanup();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::connection::{ConnectionError, ConnectionManager, ConnectorConfig, SendOutcome};
use super::transport::WebSocketConnector;
use crate::application::ports::TransportConnector;
use crate::application::services::rate_limiter::{RateLimitResetTask, RateLimiter};
use crate::domain::connection::ConnectionState;
use crate::domain::streaming::CanonicalEvent;
use crate::domain::subscription::SubscriptionTarget;

/// Market data connector for one Binance trading pair.
///
/// Dropping the connector closes the session and ends reconnection.
pub struct BinanceConnector {
    manager: Arc<ConnectionManager>,
    reset_task: RateLimitResetTask,
    cancel: CancellationToken,
}

impl BinanceConnector {
    /// Create a connector using the WebSocket transport.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime (the rate-limit reset task
    /// is spawned immediately).
    #[must_use]
    pub fn new(config: ConnectorConfig) -> Self {
        Self::with_transport(config, Arc::new(WebSocketConnector::new()))
    }

    /// Create a connector over a custom transport.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn with_transport(config: ConnectorConfig, transport: Arc<dyn TransportConnector>) -> Self {
        let cancel = CancellationToken::new();
        let limiter = RateLimiter::shared(config.rate_limits.clone());
        let reset_task = RateLimitResetTask::spawn(
            Arc::clone(&limiter),
            config.rate_limits.reset_interval,
            &cancel,
        );
        let manager = Arc::new(ConnectionManager::new(
            config,
            transport,
            limiter,
            cancel.clone(),
        ));

        Self {
            manager,
            reset_task,
            cancel,
        }
    }

    /// Open the stream and deliver canonical events to `callback`.
    ///
    /// Resolves once the subscribe request has been attempted and the
    /// session is streaming. The callback is invoked once per inbound text
    /// frame, in wire order, and is reused across reconnects.
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::connect`].
    pub async fn connect<F>(&self, callback: F) -> Result<(), ConnectionError>
    where
        F: Fn(Vec<CanonicalEvent>) + Send + Sync + 'static,
    {
        self.manager.connect(Arc::new(callback)).await
    }

    /// Send UNSUBSCRIBE for every channel.
    ///
    /// The session stays open and automatic reconnection is unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] without a streaming session.
    pub async fn stop(&self) -> Result<SendOutcome, ConnectionError> {
        self.manager.unsubscribe().await
    }

    /// Halt the periodic rate-limit reset. The session is left open.
    pub fn cleanup(&self) {
        self.reset_task.stop();
        tracing::info!(target_symbol = %self.manager.target(), "Rate limit reset cycle stopped");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Whether the rate-limit reset cycle is still running.
    #[must_use]
    pub fn reset_cycle_active(&self) -> bool {
        self.reset_task.is_active()
    }

    /// Whether a session or its reconnect loop is alive.
    #[must_use]
    pub fn is_supervising(&self) -> bool {
        self.manager.is_supervising()
    }

    /// Subscription target.
    #[must_use]
    pub fn target(&self) -> &SubscriptionTarget {
        self.manager.target()
    }
}

impl Drop for BinanceConnector {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
