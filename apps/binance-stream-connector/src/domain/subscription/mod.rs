//! Subscription Target
//!
//! Identifies the single trading pair a connector streams: the
//! exchange-native symbol used in stream names and the canonical symbol
//! stamped on every emitted event. The channel set is fixed.

use std::fmt;

// =============================================================================
// Channels
// =============================================================================

/// Market data channel subscribed for the target symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Rolling 24h mini-ticker (last price).
    MiniTicker,
    /// Individual trades.
    Trade,
    /// Top five book levels.
    Depth5,
}

impl Channel {
    /// All channels, in subscription order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::MiniTicker, Self::Trade, Self::Depth5]
    }

    /// Stream suffix used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MiniTicker => "miniTicker",
            Self::Trade => "trade",
            Self::Depth5 => "depth5",
        }
    }
}

// =============================================================================
// Target
// =============================================================================

/// Errors building a [`SubscriptionTarget`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// Exchange symbol is empty.
    #[error("exchange symbol cannot be empty")]
    EmptyExchangeSymbol,
    /// Canonical symbol is empty.
    #[error("canonical symbol cannot be empty")]
    EmptyCanonicalSymbol,
}

/// One trading pair: exchange-native symbol plus its canonical form.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionTarget {
    exchange_symbol: String,
    canonical_symbol: String,
}

impl SubscriptionTarget {
    /// Create a target from both symbols.
    ///
    /// The exchange symbol is lowercased since Binance stream names are
    /// case-sensitive and lowercase.
    ///
    /// # Errors
    ///
    /// Returns an error if either symbol is empty after trimming.
    pub fn new(
        exchange_symbol: impl AsRef<str>,
        canonical_symbol: impl AsRef<str>,
    ) -> Result<Self, SubscriptionError> {
        let exchange_symbol = exchange_symbol.as_ref().trim().to_lowercase();
        let canonical_symbol = canonical_symbol.as_ref().trim().to_string();

        if exchange_symbol.is_empty() {
            return Err(SubscriptionError::EmptyExchangeSymbol);
        }
        if canonical_symbol.is_empty() {
            return Err(SubscriptionError::EmptyCanonicalSymbol);
        }

        Ok(Self {
            exchange_symbol,
            canonical_symbol,
        })
    }

    /// Create a target from a canonical symbol such as `BTC/USDT`.
    ///
    /// The exchange symbol is the canonical symbol with separators removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the canonical symbol has no alphanumeric content.
    pub fn from_canonical(canonical_symbol: impl AsRef<str>) -> Result<Self, SubscriptionError> {
        let canonical = canonical_symbol.as_ref();
        let exchange: String = canonical
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        Self::new(exchange, canonical)
    }

    /// Exchange-native symbol (lowercase, e.g. `btcusdt`).
    #[must_use]
    pub fn exchange_symbol(&self) -> &str {
        &self.exchange_symbol
    }

    /// Canonical symbol (e.g. `BTC/USDT`).
    #[must_use]
    pub fn canonical_symbol(&self) -> &str {
        &self.canonical_symbol
    }

    /// Stream names for every channel, e.g. `btcusdt@trade`.
    #[must_use]
    pub fn stream_names(&self) -> Vec<String> {
        Channel::all()
            .iter()
            .map(|channel| format!("{}@{}", self.exchange_symbol, channel.as_str()))
            .collect()
    }
}

impl fmt::Display for SubscriptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.canonical_symbol, self.exchange_symbol)
    }
}
