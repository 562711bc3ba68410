//! Normalizer
//!
//! Translates classified Binance records into canonical events. Every
//! failure is returned as a [`NormalizeError`]; the caller drops the frame
//! and the session continues.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::domain::streaming::{
    CanonicalEvent, ConnectorType, EventKind, Side, TickerEvent, TopOfBookEvent, TradeEvent,
};
use crate::domain::subscription::SubscriptionTarget;
use crate::infrastructure::binance::codec::RawRecord;
use crate::infrastructure::binance::messages::{
    MiniTickerMessage, PartialDepthMessage, TradeMessage,
};

/// Reasons a record could not be normalized.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// Record did not match the expected payload shape.
    #[error("record shape mismatch: {0}")]
    Shape(#[from] serde_json::Error),

    /// Numeric field was not a decimal string.
    #[error("field `{field}` is not a decimal: {value:?}")]
    InvalidDecimal {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: String,
    },

    /// Numeric field parsed but is negative or not representable as a finite `f64`.
    #[error("field `{field}` is out of range: {value}")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: String,
    },

    /// Maker flag was absent or not a boolean.
    #[error("unrecognised buyer-is-maker flag: {0}")]
    UnknownMakerFlag(Value),

    /// Book side had no usable `[price, quantity]` entry.
    #[error("missing best level on {0} side")]
    MissingLevel(&'static str),
}

impl NormalizeError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Shape(_) => "shape",
            Self::InvalidDecimal { .. } => "invalid_decimal",
            Self::OutOfRange { .. } => "out_of_range",
            Self::UnknownMakerFlag(_) => "unknown_maker_flag",
            Self::MissingLevel(_) => "missing_level",
        }
    }
}

/// Record-to-event translator for one subscription target.
#[derive(Debug, Clone)]
pub struct Normalizer {
    target: SubscriptionTarget,
}

impl Normalizer {
    /// Create a normalizer stamping events with `target`'s canonical symbol.
    #[must_use]
    pub const fn new(target: SubscriptionTarget) -> Self {
        Self { target }
    }

    /// Translate a classified record.
    ///
    /// # Errors
    ///
    /// Returns an error when any field fails to parse; no partial event is
    /// ever produced.
    pub fn to_canonical(
        &self,
        kind: EventKind,
        record: &RawRecord,
    ) -> Result<CanonicalEvent, NormalizeError> {
        match kind {
            EventKind::Trade => self.trade(&record.decode_as()?).map(CanonicalEvent::Trade),
            EventKind::Ticker => self.ticker(&record.decode_as()?).map(CanonicalEvent::Ticker),
            EventKind::TopOfBook => self
                .top_of_book(&record.decode_as()?)
                .map(CanonicalEvent::TopOfBook),
        }
    }

    fn trade(&self, msg: &TradeMessage) -> Result<TradeEvent, NormalizeError> {
        let price = parse_decimal("p", &msg.price)?;
        let size = parse_decimal("q", &msg.quantity)?;
        let side = match &msg.buyer_is_maker {
            Value::Bool(flag) => Side::from_buyer_is_maker(*flag),
            other => return Err(NormalizeError::UnknownMakerFlag(other.clone())),
        };

        Ok(TradeEvent {
            symbol: self.symbol(),
            connector: ConnectorType::Binance,
            timestamp_us: millis_to_micros(msg.trade_time),
            price,
            size,
            side,
            trade_id: msg.trade_id,
        })
    }

    fn ticker(&self, msg: &MiniTickerMessage) -> Result<TickerEvent, NormalizeError> {
        Ok(TickerEvent {
            symbol: self.symbol(),
            connector: ConnectorType::Binance,
            timestamp_us: millis_to_micros(msg.event_time),
            last_price: parse_decimal("c", &msg.close_price)?,
        })
    }

    fn top_of_book(&self, msg: &PartialDepthMessage) -> Result<TopOfBookEvent, NormalizeError> {
        let (bid_price, bid_size) = best_level("bids", &msg.bids)?;
        let (ask_price, ask_size) = best_level("asks", &msg.asks)?;

        // Partial depth stream carries no per-update time.
        Ok(TopOfBookEvent {
            symbol: self.symbol(),
            connector: ConnectorType::Binance,
            timestamp_us: 0,
            bid_price,
            bid_size,
            ask_price,
            ask_size,
        })
    }

    fn symbol(&self) -> String {
        self.target.canonical_symbol().to_string()
    }
}

/// Parse a decimal string into a finite, non-negative `f64`.
fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, NormalizeError> {
    let decimal = Decimal::from_str(raw.trim()).map_err(|_| NormalizeError::InvalidDecimal {
        field,
        value: raw.to_string(),
    })?;

    match decimal.to_f64() {
        Some(value) if value.is_finite() && !decimal.is_sign_negative() => Ok(value),
        _ => Err(NormalizeError::OutOfRange {
            field,
            value: raw.to_string(),
        }),
    }
}

fn best_level(side: &'static str, levels: &[Vec<String>]) -> Result<(f64, f64), NormalizeError> {
    match levels.first().map(Vec::as_slice) {
        Some([price, quantity, ..]) => {
            Ok((parse_decimal(side, price)?, parse_decimal(side, quantity)?))
        }
        _ => Err(NormalizeError::MissingLevel(side)),
    }
}

const fn millis_to_micros(millis: Option<u64>) -> u64 {
    match millis {
        Some(ms) => ms.saturating_mul(1000),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::binance::codec::{InboundFrame, WireCodec};
    use test_case::test_case;

    fn normalizer() -> Normalizer {
        Normalizer::new(SubscriptionTarget::new("btcusdt", "BTC/USDT").unwrap())
    }

    fn normalize(kind: EventKind, json: &str) -> Result<CanonicalEvent, NormalizeError> {
        let InboundFrame::Record(record) = WireCodec::new().decode(json).unwrap() else {
            panic!("expected record");
        };
        normalizer().to_canonical(kind, &record)
    }

    #[test]
    fn trade_event() {
        let event = normalize(
            EventKind::Trade,
            r#"{"e":"trade","E":1,"s":"BTCUSDT","t":99,"p":"42000.50","q":"0.25","T":1700000000123,"m":false}"#,
        )
        .unwrap();

        let CanonicalEvent::Trade(trade) = event else {
            panic!("expected trade");
        };
        assert_eq!(trade.symbol, "BTC/USDT");
        assert_eq!(trade.connector, ConnectorType::Binance);
        assert_eq!(trade.timestamp_us, 1_700_000_000_123_000);
        assert!((trade.price - 42_000.5).abs() < 1e-9);
        assert!((trade.size - 0.25).abs() < 1e-12);
        assert_eq!(trade.side, Side::Buy);
        assert_eq!(trade.trade_id, Some(99));
    }

    #[test]
    fn trade_without_time_has_zero_timestamp() {
        let event =
            normalize(EventKind::Trade, r#"{"e":"trade","p":"1","q":"1","m":true}"#).unwrap();
        assert_eq!(event.timestamp_us(), 0);
        let CanonicalEvent::Trade(trade) = event else {
            panic!("expected trade");
        };
        assert_eq!(trade.side, Side::Sell);
    }

    #[test_case(r#""true""# ; "string flag")]
    #[test_case("1" ; "numeric flag")]
    #[test_case("null" ; "null flag")]
    fn trade_with_non_boolean_maker_flag_dropped(flag: &str) {
        let json = format!(r#"{{"e":"trade","p":"1","q":"1","m":{flag}}}"#);
        let err = normalize(EventKind::Trade, &json).unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownMakerFlag(_)));
    }

    #[test]
    fn trade_without_maker_flag_dropped() {
        let err = normalize(EventKind::Trade, r#"{"e":"trade","p":"1","q":"1"}"#).unwrap_err();
        assert_eq!(err.reason(), "unknown_maker_flag");
    }

    #[test]
    fn ticker_event() {
        let event = normalize(
            EventKind::Ticker,
            r#"{"e":"24hrMiniTicker","E":1700000000000,"s":"BTCUSDT","c":"43000.01","o":"1","h":"1","l":"1","v":"1","q":"1"}"#,
        )
        .unwrap();

        let CanonicalEvent::Ticker(ticker) = event else {
            panic!("expected ticker");
        };
        assert_eq!(ticker.timestamp_us, 1_700_000_000_000_000);
        assert!((ticker.last_price - 43_000.01).abs() < 1e-9);
    }

    #[test]
    fn top_of_book_event() {
        let event = normalize(
            EventKind::TopOfBook,
            r#"{"lastUpdateId":1,"bids":[["100.5","2"],["100.4","9"]],"asks":[["100.6","3"],["100.7","1"]]}"#,
        )
        .unwrap();

        let CanonicalEvent::TopOfBook(book) = event else {
            panic!("expected top of book");
        };
        assert_eq!(book.timestamp_us, 0);
        assert!((book.bid_price - 100.5).abs() < 1e-9);
        assert!((book.bid_size - 2.0).abs() < 1e-9);
        assert!((book.ask_price - 100.6).abs() < 1e-9);
        assert!((book.ask_size - 3.0).abs() < 1e-9);
    }

    #[test_case(r#"{"bids":[],"asks":[["1","1"]]}"# ; "empty bids")]
    #[test_case(r#"{"bids":[["1","1"]],"asks":[]}"# ; "empty asks")]
    #[test_case(r#"{"bids":[["1"]],"asks":[["1","1"]]}"# ; "short level")]
    fn top_of_book_missing_level(json: &str) {
        let err = normalize(EventKind::TopOfBook, json).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingLevel(_)));
    }

    #[test_case("abc", "invalid_decimal" ; "not numeric")]
    #[test_case("", "invalid_decimal" ; "empty")]
    #[test_case("-1.5", "out_of_range" ; "negative")]
    fn malformed_price_dropped(price: &str, reason: &str) {
        let json = format!(r#"{{"e":"trade","p":"{price}","q":"1","m":true}}"#);
        let err = normalize(EventKind::Trade, &json).unwrap_err();
        assert_eq!(err.reason(), reason);
    }

    #[test]
    fn numeric_price_is_shape_error() {
        let err = normalize(EventKind::Ticker, r#"{"e":"24hrMiniTicker","c":12.5}"#).unwrap_err();
        assert_eq!(err.reason(), "shape");
    }

    #[test]
    fn zero_is_valid() {
        assert_eq!(parse_decimal("p", "0.000").unwrap(), 0.0);
    }

    #[test]
    fn millis_conversion_saturates() {
        assert_eq!(millis_to_micros(Some(u64::MAX)), u64::MAX);
        assert_eq!(millis_to_micros(Some(2)), 2000);
        assert_eq!(millis_to_micros(None), 0);
    }
}
