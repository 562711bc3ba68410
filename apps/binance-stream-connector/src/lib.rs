#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Binance Stream Connector - Market Data Ingestion
//!
//! Maintains one WebSocket session to Binance spot streams for a single
//! trading pair, normalizes mini-ticker, trade and partial-depth payloads
//! into canonical events, and delivers them to a callback in wire order.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Canonical events, subscription target, connection states
//!   - `streaming`: Trade, ticker and top-of-book events
//!   - `subscription`: Trading pair and stream channels
//!   - `connection`: Lifecycle state machine
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport and callback interfaces
//!   - `services`: Connection and control-message rate limiting
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: Codec, normalizer, connection manager, connector facade
//!   - `config`: Environment configuration
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing and OpenTelemetry export
//!
//! # Data Flow
//!
//! ```text
//! Binance WS ──► WireCodec ──► classify ──► Normalizer ──► callback(Vec<CanonicalEvent>)
//!      ▲
//!      └── SUBSCRIBE / UNSUBSCRIBE ◄── RateLimiter (5 msg/s)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::{ConnectionState, InvalidTransition};
pub use domain::streaming::{
    CanonicalEvent, ConnectorType, EventKind, Side, TickerEvent, TopOfBookEvent, TradeEvent,
};
pub use domain::subscription::{Channel, SubscriptionError, SubscriptionTarget};

// Ports and services
pub use application::ports::{
    CloseInfo, EventCallback, TransportConnector, TransportError, TransportEvent,
    TransportSession,
};
pub use application::services::{RateLimitConfig, RateLimitResetTask, RateLimiter};

// Connector
pub use infrastructure::binance::{
    BinanceConnector, ConnectionError, ConnectorConfig, HeartbeatConfig, ReconnectConfig,
    SendOutcome,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, ConnectorSettings, RateLimitSettings, ReconnectSettings, WebSocketSettings,
};

// Metrics
pub use infrastructure::metrics::{MetricsError, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryError, TelemetryGuard, init as init_telemetry,
};
