//! Configuration Module
//!
//! Configuration loading for the connector binary.

mod settings;

pub use settings::{
    ConfigError, ConnectorSettings, RateLimitSettings, ReconnectSettings, WebSocketSettings,
};
