//! Stream Codec Module
//!
//! Decodes Binance JSON text frames into inbound frames and classifies data
//! records by shape.
//!
//! # Frame Shapes
//!
//! ```json
//! {"result": null, "id": 1}                                   // acknowledgement
//! {"error": {"code": 2, "msg": "..."}, "id": 1}               // control error
//! {"stream": "btcusdt@trade", "data": {"e": "trade", ...}}    // combined envelope
//! {"e": "trade", ...}                                         // raw data record
//! ```
//!
//! # Classification Precedence
//!
//! 1. Records without a price-bearing field (`c`, `p`, `bids`, `asks`) are rejected
//! 2. `bids` and `asks` lists present: top-of-book
//! 3. `e == "trade"`: trade
//! 4. `e == "24hrMiniTicker"`: ticker

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::streaming::EventKind;
use crate::infrastructure::binance::messages::{
    ControlErrorResponse, ControlRequest, ControlResponse, MINI_TICKER_EVENT, TRADE_EVENT,
};

/// Fields that carry a price in at least one supported payload.
const PRICE_FIELDS: [&str; 4] = ["c", "p", "bids", "asks"];

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame parsed but is not a JSON object.
    #[error("invalid message format: expected JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Control request acknowledgement.
    Ack(ControlResponse),
    /// Control request rejected by the exchange.
    ControlError(ControlErrorResponse),
    /// Market data record awaiting classification.
    Record(RawRecord),
}

/// Untyped market data record (always a JSON object).
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    value: Value,
}

impl RawRecord {
    /// Wrap a JSON object.
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            value: Value::Object(fields),
        }
    }

    /// Look up a top-level field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.get(field)
    }

    /// Kind discriminant (`e`), when present and a string.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.get("e").and_then(Value::as_str)
    }

    /// Deserialize the record into a typed wire message.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not match `T`'s shape.
    pub fn decode_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.value)
    }

    /// The record as JSON, for logging.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.value
    }
}

/// JSON codec for Binance spot streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireCodec;

impl WireCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame.
    ///
    /// Combined-stream envelopes are unwrapped to their `data` payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON, is not an object, or is a
    /// malformed control response.
    pub fn decode(&self, text: &str) -> Result<InboundFrame, CodecError> {
        let value: Value = serde_json::from_str(text.trim())?;
        let Value::Object(mut fields) = value else {
            return Err(CodecError::NotAnObject(json_kind(&value)));
        };

        if fields.get("stream").is_some_and(Value::is_string)
            && fields.get("data").is_some_and(Value::is_object)
            && let Some(Value::Object(data)) = fields.remove("data")
        {
            fields = data;
        }

        if fields.contains_key("error") {
            let response: ControlErrorResponse = serde_json::from_value(Value::Object(fields))?;
            return Ok(InboundFrame::ControlError(response));
        }

        if fields.contains_key("result") && fields.contains_key("id") {
            let response: ControlResponse = serde_json::from_value(Value::Object(fields))?;
            return Ok(InboundFrame::Ack(response));
        }

        Ok(InboundFrame::Record(RawRecord::new(fields)))
    }

    /// Classify a data record by shape.
    ///
    /// Book shape wins over the `e` discriminant, so a depth frame is never
    /// read as a trade or ticker.
    #[must_use]
    pub fn classify(&self, record: &RawRecord) -> Option<EventKind> {
        if !PRICE_FIELDS.iter().any(|field| record.get(field).is_some()) {
            return None;
        }

        let is_list = |field: &str| record.get(field).is_some_and(Value::is_array);
        if is_list("bids") && is_list("asks") {
            return Some(EventKind::TopOfBook);
        }

        match record.event_type() {
            Some(TRADE_EVENT) => Some(EventKind::Trade),
            Some(MINI_TICKER_EVENT) => Some(EventKind::Ticker),
            _ => None,
        }
    }

    /// Encode a control request.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, request: &ControlRequest) -> Result<String, CodecError> {
        Ok(serde_json::to_string(request)?)
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
