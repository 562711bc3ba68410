//! Binance Stream Connector Binary
//!
//! Streams one Binance trading pair and logs every canonical event.
//!
//! # Usage
//!
//! ```bash
//! BINANCE_CANONICAL_SYMBOL=BTC/USDT cargo run --bin binance-stream-connector
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `BINANCE_CANONICAL_SYMBOL`: Canonical pair, e.g. `BTC/USDT`
//!
//! ## Optional
//! - `BINANCE_EXCHANGE_SYMBOL`: Exchange symbol (default: derived, e.g. `btcusdt`)
//! - `BINANCE_WS_URL`: Stream endpoint (default: `wss://stream.binance.com:9443/ws`)
//! - `BINANCE_HEARTBEAT_INTERVAL_SECS` / `BINANCE_HEARTBEAT_TIMEOUT_SECS`: 20 / 60 (0 disables)
//! - `BINANCE_RECONNECT_DELAY_INITIAL_MS`: Initial reconnect delay (default: 10000)
//! - `BINANCE_RECONNECT_DELAY_MAX_SECS`: Maximum reconnect delay (default: 300)
//! - `BINANCE_RECONNECT_DELAY_MULTIPLIER`: Backoff multiplier (default: 2.0)
//! - `BINANCE_RECONNECT_JITTER`: Jitter fraction (default: 0.1)
//! - `BINANCE_MAX_RECONNECT_ATTEMPTS`: 0 = unlimited (default: 0)
//! - `BINANCE_MAX_CONNECTION_ATTEMPTS`: Attempts per window (default: 300)
//! - `BINANCE_CONNECTION_WINDOW_SECS`: Attempt window (default: 300)
//! - `BINANCE_MAX_CONTROL_MESSAGES_PER_SEC`: Control sends per second (default: 5)
//! - `BINANCE_METRICS_PORT`: Prometheus port, 0 disables (default: 9090)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `RUST_LOG`: Log filter

use std::net::SocketAddr;

use anyhow::Context;
use binance_stream_connector::infrastructure::telemetry;
use binance_stream_connector::{BinanceConnector, CanonicalEvent, ConnectorSettings, init_metrics};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting Binance Stream Connector");

    let settings = ConnectorSettings::from_env().context("invalid configuration")?;
    log_settings(&settings);

    if settings.metrics_port != 0 {
        init_metrics(SocketAddr::from(([0, 0, 0, 0], settings.metrics_port)))
            .context("failed to start metrics exporter")?;
    }

    let connector = BinanceConnector::new(settings.connector_config());

    if let Err(e) = connector.connect(log_events).await {
        tracing::error!(error = %e, "Initial connection failed");
        if !connector.is_supervising() {
            return Err(e).context("connection refused");
        }
    }

    await_shutdown().await;

    match connector.stop().await {
        Ok(outcome) => tracing::info!(?outcome, "Unsubscribe requested"),
        Err(e) => tracing::warn!(error = %e, "Unsubscribe failed"),
    }
    connector.cleanup();
    drop(connector);

    tracing::info!("Binance Stream Connector stopped");
    Ok(())
}

fn log_events(events: Vec<CanonicalEvent>) {
    for event in events {
        match event {
            CanonicalEvent::Trade(trade) => tracing::info!(
                symbol = %trade.symbol,
                price = trade.price,
                size = trade.size,
                side = ?trade.side,
                timestamp_us = trade.timestamp_us,
                "trade"
            ),
            CanonicalEvent::Ticker(ticker) => tracing::info!(
                symbol = %ticker.symbol,
                last_price = ticker.last_price,
                timestamp_us = ticker.timestamp_us,
                "ticker"
            ),
            CanonicalEvent::TopOfBook(book) => tracing::info!(
                symbol = %book.symbol,
                bid = book.bid_price,
                bid_size = book.bid_size,
                ask = book.ask_price,
                ask_size = book.ask_size,
                "top_of_book"
            ),
        }
    }
}

fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_settings(settings: &ConnectorSettings) {
    tracing::info!(
        canonical_symbol = settings.target.canonical_symbol(),
        exchange_symbol = settings.target.exchange_symbol(),
        url = %settings.websocket.url,
        metrics_port = settings.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        reconnect_initial_ms = settings.reconnect.delay_initial.as_millis(),
        reconnect_max_secs = settings.reconnect.delay_max.as_secs(),
        max_connection_attempts = settings.rate_limits.max_connection_attempts,
        max_control_messages_per_sec = settings.rate_limits.max_control_messages_per_sec,
        "Connection policy"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
