//! Binance WebSocket Message Types
//!
//! Wire format types for Binance spot market streams. These map directly to
//! Binance's JSON schemas; numeric values arrive as decimal strings and are
//! parsed by the normalizer.
//!
//! # Message Types
//!
//! ## Control Messages
//! - `ControlRequest`: SUBSCRIBE / UNSUBSCRIBE request
//! - `ControlResponse`: Acknowledgement (`{"result": null, "id": 1}`)
//! - `ControlErrorResponse`: Rejected request with code and message
//!
//! ## Market Data
//! - `MiniTickerMessage`: `<symbol>@miniTicker`
//! - `TradeMessage`: `<symbol>@trade`
//! - `PartialDepthMessage`: `<symbol>@depth5`
//!
//! # References
//!
//! - [WebSocket Streams](https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams)

use serde::{Deserialize, Serialize};

/// Kind discriminant for trade payloads.
pub const TRADE_EVENT: &str = "trade";

/// Kind discriminant for mini-ticker payloads.
pub const MINI_TICKER_EVENT: &str = "24hrMiniTicker";

// =============================================================================
// Control Messages
// =============================================================================

/// Control request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlMethod {
    /// Start receiving the listed streams.
    Subscribe,
    /// Stop receiving the listed streams.
    Unsubscribe,
}

impl ControlMethod {
    /// Get the method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
        }
    }
}

/// Subscription control request.
///
/// # Wire Format (JSON)
/// ```json
/// {"method": "SUBSCRIBE", "params": ["btcusdt@miniTicker", "btcusdt@trade", "btcusdt@depth5"], "id": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    /// Request method.
    pub method: ControlMethod,
    /// Stream names.
    pub params: Vec<String>,
    /// Request id echoed in the response.
    pub id: u64,
}

impl ControlRequest {
    /// Create a subscribe request.
    #[must_use]
    pub const fn subscribe(params: Vec<String>, id: u64) -> Self {
        Self {
            method: ControlMethod::Subscribe,
            params,
            id,
        }
    }

    /// Create an unsubscribe request.
    #[must_use]
    pub const fn unsubscribe(params: Vec<String>, id: u64) -> Self {
        Self {
            method: ControlMethod::Unsubscribe,
            params,
            id,
        }
    }
}

/// Acknowledgement of a control request.
///
/// # Wire Format (JSON)
/// ```json
/// {"result": null, "id": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Result payload (`null` for subscribe/unsubscribe).
    pub result: serde_json::Value,
    /// Id of the acknowledged request.
    pub id: Option<u64>,
}

/// Error detail inside a control error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlErrorDetail {
    /// Binance error code.
    pub code: i64,
    /// Human readable message.
    pub msg: String,
}

/// Rejected control request.
///
/// # Wire Format (JSON)
/// ```json
/// {"error": {"code": 2, "msg": "Invalid request: unknown variant"}, "id": 1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlErrorResponse {
    /// Error detail.
    pub error: ControlErrorDetail,
    /// Id of the failed request, when it could be parsed.
    pub id: Option<u64>,
}

// =============================================================================
// Market Data
// =============================================================================

/// Individual trade.
///
/// # Wire Format (JSON)
/// ```json
/// {"e": "trade", "E": 1672515782136, "s": "BNBBTC", "t": 12345,
///  "p": "0.001", "q": "100", "T": 1672515782136, "m": true, "M": true}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Event type (`trade`).
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time (ms).
    #[serde(rename = "E", default)]
    pub event_time: Option<u64>,
    /// Exchange symbol.
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
    /// Trade id.
    #[serde(rename = "t", default)]
    pub trade_id: Option<u64>,
    /// Price as a decimal string.
    #[serde(rename = "p")]
    pub price: String,
    /// Quantity as a decimal string.
    #[serde(rename = "q")]
    pub quantity: String,
    /// Trade time (ms).
    #[serde(rename = "T", default)]
    pub trade_time: Option<u64>,
    /// Buyer is the market maker. Kept raw so non-boolean values can be
    /// rejected explicitly.
    #[serde(rename = "m", default)]
    pub buyer_is_maker: serde_json::Value,
}

/// Rolling 24h mini-ticker.
///
/// # Wire Format (JSON)
/// ```json
/// {"e": "24hrMiniTicker", "E": 1672515782136, "s": "BNBBTC", "c": "0.0025",
///  "o": "0.0010", "h": "0.0025", "l": "0.0010", "v": "10000", "q": "18"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniTickerMessage {
    /// Event type (`24hrMiniTicker`).
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time (ms).
    #[serde(rename = "E", default)]
    pub event_time: Option<u64>,
    /// Exchange symbol.
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
    /// Close (last) price.
    #[serde(rename = "c")]
    pub close_price: String,
    /// Open price.
    #[serde(rename = "o", default)]
    pub open_price: Option<String>,
    /// High price.
    #[serde(rename = "h", default)]
    pub high_price: Option<String>,
    /// Low price.
    #[serde(rename = "l", default)]
    pub low_price: Option<String>,
    /// Total traded base asset volume.
    #[serde(rename = "v", default)]
    pub base_volume: Option<String>,
    /// Total traded quote asset volume.
    #[serde(rename = "q", default)]
    pub quote_volume: Option<String>,
}

/// Top five levels of the book.
///
/// # Wire Format (JSON)
/// ```json
/// {"lastUpdateId": 160, "bids": [["0.0024", "10"]], "asks": [["0.0026", "100"]]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialDepthMessage {
    /// Last update id of the snapshot.
    #[serde(default)]
    pub last_update_id: Option<u64>,
    /// Bid levels as `[price, quantity]`, best first.
    pub bids: Vec<Vec<String>>,
    /// Ask levels as `[price, quantity]`, best first.
    pub asks: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_subscribe_request() {
        let request = ControlRequest::subscribe(
            vec!["btcusdt@miniTicker".to_string(), "btcusdt@trade".to_string()],
            1,
        );
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"method":"SUBSCRIBE","params":["btcusdt@miniTicker","btcusdt@trade"],"id":1}"#
        );
    }

    #[test]
    fn serialize_unsubscribe_request() {
        let request = ControlRequest::unsubscribe(vec!["btcusdt@depth5".to_string()], 7);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""method":"UNSUBSCRIBE""#));
        assert!(json.contains(r#""id":7"#));
    }

    #[test]
    fn deserialize_trade() {
        let json = r#"{"e":"trade","E":1672515782136,"s":"BNBBTC","t":12345,"p":"0.001","q":"100","T":1672515782136,"m":true,"M":true}"#;
        let trade: TradeMessage = serde_json::from_str(json).unwrap();
        assert_eq!(trade.event_type, TRADE_EVENT);
        assert_eq!(trade.trade_id, Some(12345));
        assert_eq!(trade.price, "0.001");
        assert_eq!(trade.quantity, "100");
        assert_eq!(trade.trade_time, Some(1_672_515_782_136));
        assert_eq!(trade.buyer_is_maker, serde_json::Value::Bool(true));
    }

    #[test]
    fn deserialize_mini_ticker() {
        let json = r#"{"e":"24hrMiniTicker","E":1672515782136,"s":"BNBBTC","c":"0.0025","o":"0.0010","h":"0.0025","l":"0.0010","v":"10000","q":"18"}"#;
        let ticker: MiniTickerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(ticker.event_type, MINI_TICKER_EVENT);
        assert_eq!(ticker.close_price, "0.0025");
        assert_eq!(ticker.event_time, Some(1_672_515_782_136));
        assert_eq!(ticker.quote_volume.as_deref(), Some("18"));
    }

    #[test]
    fn deserialize_partial_depth() {
        let json = r#"{"lastUpdateId":160,"bids":[["0.0024","10"]],"asks":[["0.0026","100"]]}"#;
        let depth: PartialDepthMessage = serde_json::from_str(json).unwrap();
        assert_eq!(depth.last_update_id, Some(160));
        assert_eq!(depth.bids[0], vec!["0.0024", "10"]);
        assert_eq!(depth.asks[0], vec!["0.0026", "100"]);
    }

    #[test]
    fn deserialize_control_messages() {
        let ack: ControlResponse = serde_json::from_str(r#"{"result":null,"id":1}"#).unwrap();
        assert_eq!(ack.id, Some(1));
        assert!(ack.result.is_null());

        let err: ControlErrorResponse =
            serde_json::from_str(r#"{"error":{"code":2,"msg":"Invalid request"},"id":3}"#).unwrap();
        assert_eq!(err.error.code, 2);
        assert_eq!(err.id, Some(3));
    }
}
