//! Market Data Streaming Types
//!
//! Canonical domain events produced by the connector. These types are
//! independent of any exchange wire format: every event carries the
//! canonical symbol, the connector that produced it, its kind and a
//! timestamp in epoch microseconds.

use serde::{Deserialize, Serialize};

// =============================================================================
// Tags
// =============================================================================

/// Connector that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    /// Binance spot market data.
    Binance,
}

impl ConnectorType {
    /// Get the tag as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
        }
    }
}

/// Kind of canonical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Executed trade.
    Trade,
    /// Last-price ticker update.
    Ticker,
    /// Best bid and ask.
    TopOfBook,
}

impl EventKind {
    /// Get the tag as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trade => "trade",
            Self::Ticker => "ticker",
            Self::TopOfBook => "top_of_book",
        }
    }
}

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buyer was the aggressor.
    Buy,
    /// Seller was the aggressor.
    Sell,
}

impl Side {
    /// Resolve the aggressor side from a "buyer is maker" flag.
    ///
    /// When the buyer rested on the book the seller crossed the spread, so
    /// `true` maps to [`Side::Sell`] and `false` to [`Side::Buy`].
    #[must_use]
    pub const fn from_buyer_is_maker(buyer_is_maker: bool) -> Self {
        if buyer_is_maker { Self::Sell } else { Self::Buy }
    }
}

// =============================================================================
// Events
// =============================================================================

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Canonical symbol (e.g. `BTC/USDT`).
    pub symbol: String,
    /// Producing connector.
    pub connector: ConnectorType,
    /// Trade time in epoch microseconds.
    pub timestamp_us: u64,
    /// Execution price.
    pub price: f64,
    /// Executed quantity.
    pub size: f64,
    /// Aggressor side.
    pub side: Side,
    /// Exchange trade id, when the venue sends one.
    pub trade_id: Option<u64>,
}

/// Last-price ticker update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerEvent {
    /// Canonical symbol.
    pub symbol: String,
    /// Producing connector.
    pub connector: ConnectorType,
    /// Event time in epoch microseconds.
    pub timestamp_us: u64,
    /// Last traded price.
    pub last_price: f64,
}

/// Best bid and ask snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopOfBookEvent {
    /// Canonical symbol.
    pub symbol: String,
    /// Producing connector.
    pub connector: ConnectorType,
    /// Update time in epoch microseconds (0 when the feed has no timing).
    pub timestamp_us: u64,
    /// Best bid price.
    pub bid_price: f64,
    /// Quantity at the best bid.
    pub bid_size: f64,
    /// Best ask price.
    pub ask_price: f64,
    /// Quantity at the best ask.
    pub ask_size: f64,
}

/// Canonical market data event delivered to the consumer callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CanonicalEvent {
    /// Executed trade.
    Trade(TradeEvent),
    /// Ticker update.
    Ticker(TickerEvent),
    /// Top-of-book update.
    TopOfBook(TopOfBookEvent),
}

impl CanonicalEvent {
    /// Kind tag of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Trade(_) => EventKind::Trade,
            Self::Ticker(_) => EventKind::Ticker,
            Self::TopOfBook(_) => EventKind::TopOfBook,
        }
    }

    /// Canonical symbol of this event.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Trade(e) => &e.symbol,
            Self::Ticker(e) => &e.symbol,
            Self::TopOfBook(e) => &e.symbol,
        }
    }

    /// Connector that produced this event.
    #[must_use]
    pub const fn connector(&self) -> ConnectorType {
        match self {
            Self::Trade(e) => e.connector,
            Self::Ticker(e) => e.connector,
            Self::TopOfBook(e) => e.connector,
        }
    }

    /// Timestamp in epoch microseconds.
    #[must_use]
    pub const fn timestamp_us(&self) -> u64 {
        match self {
            Self::Trade(e) => e.timestamp_us,
            Self::Ticker(e) => e.timestamp_us,
            Self::TopOfBook(e) => e.timestamp_us,
        }
    }
}
