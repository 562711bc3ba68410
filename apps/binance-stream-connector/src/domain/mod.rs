//! Domain Layer - Core streaming types and business rules.
//!
//! This layer contains the canonical market data events, the subscription
//! target and the connection state machine. Nothing here knows about
//! Binance wire formats or sockets.

/// Canonical market data events (trades, tickers, top-of-book).
pub mod streaming;

/// Subscription target and stream channels.
pub mod subscription;

/// Connection lifecycle state machine.
pub mod connection;
