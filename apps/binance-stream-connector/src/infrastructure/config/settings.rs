//! Connector Configuration Settings
//!
//! Configuration types for the connector, loaded from environment variables.
//! Unparseable optional values fall back to their defaults.

use std::str::FromStr;
use std::time::Duration;

use crate::application::services::rate_limiter::RateLimitConfig;
use crate::domain::subscription::{SubscriptionError, SubscriptionTarget};
use crate::infrastructure::binance::connection::ConnectorConfig;
use crate::infrastructure::binance::heartbeat::HeartbeatConfig;
use crate::infrastructure::binance::reconnect::ReconnectConfig;
use crate::infrastructure::binance::transport::DEFAULT_STREAM_URL;

/// WebSocket connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketSettings {
    /// Stream endpoint.
    pub url: String,
    /// Interval between client pings (zero disables the heartbeat).
    pub heartbeat_interval: Duration,
    /// Silence before the session is considered dead.
    pub heartbeat_timeout: Duration,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            heartbeat_interval: Duration::from_secs(20),
            heartbeat_timeout: Duration::from_secs(60),
        }
    }
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectSettings {
    /// Initial reconnection delay.
    pub delay_initial: Duration,
    /// Maximum reconnection delay.
    pub delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub delay_multiplier: f64,
    /// Jitter as a fraction of the delay.
    pub jitter_factor: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay_initial: Duration::from_secs(10),
            delay_max: Duration::from_secs(300),
            delay_multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

/// Exchange rate limit settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Connection attempts allowed per window.
    pub max_connection_attempts: usize,
    /// Connection attempt window (also the full reset period).
    pub connection_window: Duration,
    /// Control messages allowed per second.
    pub max_control_messages_per_sec: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_connection_attempts: 300,
            connection_window: Duration::from_secs(300),
            max_control_messages_per_sec: 5,
        }
    }
}

/// Complete connector configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorSettings {
    /// Trading pair to stream.
    pub target: SubscriptionTarget,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
    /// Reconnect backoff settings.
    pub reconnect: ReconnectSettings,
    /// Rate limit settings.
    pub rate_limits: RateLimitSettings,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl ConnectorSettings {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `BINANCE_CANONICAL_SYMBOL` is missing or empty, or
    /// `BINANCE_CONNECTION_WINDOW_SECS` is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the canonical symbol is missing, either symbol
    /// is empty, or the connection window is zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let canonical = lookup("BINANCE_CANONICAL_SYMBOL")
            .ok_or_else(|| ConfigError::MissingEnvVar("BINANCE_CANONICAL_SYMBOL".to_string()))?;
        if canonical.trim().is_empty() {
            return Err(ConfigError::EmptyValue(
                "BINANCE_CANONICAL_SYMBOL".to_string(),
            ));
        }

        let target = match lookup("BINANCE_EXCHANGE_SYMBOL") {
            Some(exchange) => SubscriptionTarget::new(exchange, &canonical)?,
            None => SubscriptionTarget::from_canonical(&canonical)?,
        };

        let ws_defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            url: lookup("BINANCE_WS_URL").unwrap_or(ws_defaults.url),
            heartbeat_interval: parse_secs(
                &lookup,
                "BINANCE_HEARTBEAT_INTERVAL_SECS",
                ws_defaults.heartbeat_interval,
            ),
            heartbeat_timeout: parse_secs(
                &lookup,
                "BINANCE_HEARTBEAT_TIMEOUT_SECS",
                ws_defaults.heartbeat_timeout,
            ),
        };

        let rc_defaults = ReconnectSettings::default();
        let reconnect = ReconnectSettings {
            delay_initial: parse_millis(
                &lookup,
                "BINANCE_RECONNECT_DELAY_INITIAL_MS",
                rc_defaults.delay_initial,
            ),
            delay_max: parse_secs(
                &lookup,
                "BINANCE_RECONNECT_DELAY_MAX_SECS",
                rc_defaults.delay_max,
            ),
            delay_multiplier: parse_or(
                &lookup,
                "BINANCE_RECONNECT_DELAY_MULTIPLIER",
                rc_defaults.delay_multiplier,
            ),
            jitter_factor: parse_or(&lookup, "BINANCE_RECONNECT_JITTER", rc_defaults.jitter_factor),
            max_attempts: parse_or(
                &lookup,
                "BINANCE_MAX_RECONNECT_ATTEMPTS",
                rc_defaults.max_attempts,
            ),
        };

        let rl_defaults = RateLimitSettings::default();
        let connection_window = parse_secs(
            &lookup,
            "BINANCE_CONNECTION_WINDOW_SECS",
            rl_defaults.connection_window,
        );
        if connection_window.is_zero() {
            return Err(ConfigError::ZeroDuration(
                "BINANCE_CONNECTION_WINDOW_SECS".to_string(),
            ));
        }
        let rate_limits = RateLimitSettings {
            max_connection_attempts: parse_or(
                &lookup,
                "BINANCE_MAX_CONNECTION_ATTEMPTS",
                rl_defaults.max_connection_attempts,
            ),
            connection_window,
            max_control_messages_per_sec: parse_or(
                &lookup,
                "BINANCE_MAX_CONTROL_MESSAGES_PER_SEC",
                rl_defaults.max_control_messages_per_sec,
            ),
        };

        Ok(Self {
            target,
            websocket,
            reconnect,
            rate_limits,
            metrics_port: parse_or(&lookup, "BINANCE_METRICS_PORT", 9090),
        })
    }

    /// Heartbeat configuration, or `None` when either duration is zero.
    #[must_use]
    pub fn heartbeat(&self) -> Option<HeartbeatConfig> {
        let ws = &self.websocket;
        (!ws.heartbeat_interval.is_zero() && !ws.heartbeat_timeout.is_zero())
            .then(|| HeartbeatConfig::new(ws.heartbeat_interval, ws.heartbeat_timeout))
    }

    /// Rate limiter parameters.
    #[must_use]
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            attempt_window: self.rate_limits.connection_window,
            max_attempts: self.rate_limits.max_connection_attempts,
            send_window: Duration::from_secs(1),
            max_sends_per_window: self.rate_limits.max_control_messages_per_sec,
            reset_interval: self.rate_limits.connection_window,
        }
    }

    /// Build the connector configuration.
    #[must_use]
    pub fn connector_config(&self) -> ConnectorConfig {
        ConnectorConfig {
            url: self.websocket.url.clone(),
            target: self.target.clone(),
            reconnect: ReconnectConfig::from_settings(&self.reconnect),
            heartbeat: self.heartbeat(),
            rate_limits: self.rate_limit_config(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Duration that must be positive was set to zero.
    #[error("environment variable {0} must be greater than zero")]
    ZeroDuration(String),
    /// Symbols could not form a subscription target.
    #[error("invalid symbol configuration: {0}")]
    InvalidSymbol(#[from] SubscriptionError),
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<ConnectorSettings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ConnectorSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_with_only_canonical_symbol() {
        let settings = settings(&[("BINANCE_CANONICAL_SYMBOL", "BTC/USDT")]).unwrap();

        assert_eq!(settings.target.exchange_symbol(), "btcusdt");
        assert_eq!(settings.target.canonical_symbol(), "BTC/USDT");
        assert_eq!(settings.websocket, WebSocketSettings::default());
        assert_eq!(settings.reconnect, ReconnectSettings::default());
        assert_eq!(settings.rate_limits, RateLimitSettings::default());
        assert_eq!(settings.metrics_port, 9090);
        assert_eq!(settings.rate_limit_config(), RateLimitConfig::default());
    }

    #[test]
    fn missing_canonical_symbol() {
        let err = settings(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "BINANCE_CANONICAL_SYMBOL"));
    }

    #[test]
    fn empty_canonical_symbol() {
        let err = settings(&[("BINANCE_CANONICAL_SYMBOL", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(_)));
    }

    #[test]
    fn empty_exchange_symbol() {
        let err = settings(&[
            ("BINANCE_CANONICAL_SYMBOL", "BTC/USDT"),
            ("BINANCE_EXCHANGE_SYMBOL", ""),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSymbol(SubscriptionError::EmptyExchangeSymbol)
        ));
    }

    #[test]
    fn overrides_applied() {
        let settings = settings(&[
            ("BINANCE_CANONICAL_SYMBOL", "ETH/USDT"),
            ("BINANCE_EXCHANGE_SYMBOL", "ETHUSDT"),
            ("BINANCE_WS_URL", "wss://testnet.binance.vision/ws"),
            ("BINANCE_RECONNECT_DELAY_INITIAL_MS", "2500"),
            ("BINANCE_RECONNECT_DELAY_MULTIPLIER", "1.5"),
            ("BINANCE_MAX_RECONNECT_ATTEMPTS", "12"),
            ("BINANCE_MAX_CONTROL_MESSAGES_PER_SEC", "3"),
            ("BINANCE_METRICS_PORT", "0"),
        ])
        .unwrap();

        assert_eq!(settings.target.exchange_symbol(), "ethusdt");
        assert_eq!(settings.websocket.url, "wss://testnet.binance.vision/ws");
        assert_eq!(settings.reconnect.delay_initial, Duration::from_millis(2500));
        assert!((settings.reconnect.delay_multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(settings.reconnect.max_attempts, 12);
        assert_eq!(settings.rate_limits.max_control_messages_per_sec, 3);
        assert_eq!(settings.metrics_port, 0);

        let config = settings.connector_config();
        assert_eq!(config.url, "wss://testnet.binance.vision/ws");
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(2500));
        assert_eq!(config.rate_limits.max_sends_per_window, 3);
    }

    #[test]
    fn unparseable_values_fall_back() {
        let settings = settings(&[
            ("BINANCE_CANONICAL_SYMBOL", "BTC/USDT"),
            ("BINANCE_MAX_CONNECTION_ATTEMPTS", "lots"),
            ("BINANCE_HEARTBEAT_INTERVAL_SECS", "-5"),
        ])
        .unwrap();

        assert_eq!(settings.rate_limits.max_connection_attempts, 300);
        assert_eq!(settings.websocket.heartbeat_interval, Duration::from_secs(20));
    }

    #[test]
    fn zero_connection_window_rejected() {
        let err = settings(&[
            ("BINANCE_CANONICAL_SYMBOL", "BTC/USDT"),
            ("BINANCE_CONNECTION_WINDOW_SECS", "0"),
        ])
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::ZeroDuration(ref key) if key == "BINANCE_CONNECTION_WINDOW_SECS")
        );
    }

    #[test]
    fn connection_window_drives_attempt_window_and_reset() {
        let settings = settings(&[
            ("BINANCE_CANONICAL_SYMBOL", "BTC/USDT"),
            ("BINANCE_CONNECTION_WINDOW_SECS", "60"),
        ])
        .unwrap();

        let limits = settings.rate_limit_config();
        assert_eq!(limits.attempt_window, Duration::from_secs(60));
        assert_eq!(limits.reset_interval, Duration::from_secs(60));
    }

    #[test]
    fn zero_heartbeat_disables() {
        let enabled = settings(&[("BINANCE_CANONICAL_SYMBOL", "BTC/USDT")]).unwrap();
        assert_eq!(enabled.heartbeat(), Some(HeartbeatConfig::default()));

        let disabled = settings(&[
            ("BINANCE_CANONICAL_SYMBOL", "BTC/USDT"),
            ("BINANCE_HEARTBEAT_INTERVAL_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(disabled.heartbeat(), None);
        assert!(disabled.connector_config().heartbeat.is_none());
    }
}
