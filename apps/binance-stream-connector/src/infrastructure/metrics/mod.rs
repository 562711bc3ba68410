//! Prometheus Metrics Module
//!
//! Exposes connector metrics in Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Inbound frames received and dropped by reason
//! - **Events**: Canonical events emitted by kind
//! - **Connection**: Lifecycle state, reconnects and rate-limit refusals
//! - **Latency**: Per-frame processing time
//!
//! # Integration
//!
//! Metrics are served at `/metrics` by the exporter's HTTP listener. Until
//! [`init_metrics`] is called the `metrics` macros are no-ops.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::domain::connection::ConnectionState;
use crate::domain::streaming::EventKind;

/// Latency buckets from 10us to 100ms.
const PROCESSING_BUCKETS: &[f64] = &[
    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
];

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// # Errors
///
/// Returns an error if the exporter fails to start (e.g., port already in use).
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(PROCESSING_BUCKETS)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    register_metrics();
    tracing::info!(%addr, "Prometheus metrics exporter started");
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "binance_connector_frames_received_total",
        "Total text frames received from Binance"
    );
    describe_counter!(
        "binance_connector_frames_dropped_total",
        "Total frames that produced no event, by reason"
    );
    describe_counter!(
        "binance_connector_events_emitted_total",
        "Total canonical events delivered to the callback"
    );
    describe_counter!(
        "binance_connector_rate_limited_total",
        "Total actions refused by the rate limiter"
    );
    describe_counter!(
        "binance_connector_reconnects_total",
        "Total automatic reconnection attempts"
    );
    describe_gauge!(
        "binance_connector_connection_state",
        "Current connection state (1 for the active state)"
    );
    describe_histogram!(
        "binance_connector_frame_processing_seconds",
        "Time to decode, normalize and deliver one frame"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Action refused by the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedAction {
    /// Connection attempt.
    Connect,
    /// Control message send.
    Send,
}

impl LimitedAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Send => "send",
        }
    }
}

/// Record an inbound text frame.
pub fn record_frame_received() {
    counter!("binance_connector_frames_received_total").increment(1);
}

/// Record a frame that produced no event.
pub fn record_frame_dropped(reason: &'static str) {
    counter!(
        "binance_connector_frames_dropped_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record a canonical event delivered to the callback.
pub fn record_event_emitted(kind: EventKind) {
    counter!(
        "binance_connector_events_emitted_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a rate-limit refusal.
pub fn record_rate_limited(action: LimitedAction) {
    counter!(
        "binance_connector_rate_limited_total",
        "action" => action.as_str()
    )
    .increment(1);
}

/// Record an automatic reconnection attempt.
pub fn record_reconnect() {
    counter!("binance_connector_reconnects_total").increment(1);
}

/// Publish the current connection state, clearing the previous one.
pub fn set_connection_state(previous: ConnectionState, current: ConnectionState) {
    gauge!(
        "binance_connector_connection_state",
        "state" => previous.as_str()
    )
    .set(0.0);
    gauge!(
        "binance_connector_connection_state",
        "state" => current.as_str()
    )
    .set(1.0);
}

/// Record frame processing duration.
pub fn record_processing_duration(duration: Duration) {
    histogram!("binance_connector_frame_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
