//! Binance WebSocket Adapters
//!
//! Implements the spot market data client:
//!
//! - **Codec**: JSON frame decoding and shape classification
//! - **Normalizer**: Wire records to canonical events
//! - **Connection**: Session state machine, heartbeat and reconnect loop
//! - **Connector**: Public facade (`connect` / `stop` / `cleanup`)

pub mod codec;
pub mod connection;
pub mod connector;
pub mod heartbeat;
pub mod messages;
pub mod normalizer;
pub mod reconnect;
pub mod transport;

pub use codec::{CodecError, InboundFrame, RawRecord, WireCodec};
pub use connection::{ConnectionError, ConnectionManager, ConnectorConfig, SendOutcome};
pub use connector::BinanceConnector;
pub use heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatState};
pub use messages::*;
pub use normalizer::{NormalizeError, Normalizer};
pub use reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
pub use transport::{DEFAULT_STREAM_URL, WebSocketConnector, WebSocketSession};
