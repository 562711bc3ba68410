//! WebSocket Transport
//!
//! `tokio-tungstenite` adapter for the transport ports. TLS is provided by
//! rustls with webpki roots.
//!
//! # Stream URL
//!
//! - Raw streams: `wss://stream.binance.com:9443/ws`
//! - Combined streams: `wss://stream.binance.com:9443/stream`

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{
    CloseInfo, TransportConnector, TransportError, TransportEvent, TransportSession,
};

/// Default Binance spot stream endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://stream.binance.com:9443/ws";

/// Opens WebSocket sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportConnector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn TransportSession>, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketSession { stream }))
    }
}

/// One open WebSocket.
pub struct WebSocketSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketSession {
    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        self.stream
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

#[async_trait]
impl TransportSession for WebSocketSession {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.send(Message::Text(text.into())).await
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.send(Message::Ping(Vec::<u8>::new().into())).await
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), TransportError> {
        self.send(Message::Pong(payload.into())).await
    }

    async fn next_event(&mut self) -> Option<Result<TransportEvent, TransportError>> {
        loop {
            let event = match self.stream.next().await? {
                Ok(Message::Text(text)) => TransportEvent::Text(text.as_str().to_owned()),
                Ok(Message::Binary(data)) => TransportEvent::Binary(data.to_vec()),
                Ok(Message::Ping(data)) => TransportEvent::Ping(data.to_vec()),
                Ok(Message::Pong(_)) => TransportEvent::Pong,
                Ok(Message::Close(frame)) => TransportEvent::Closed(frame.map(|f| CloseInfo {
                    code: u16::from(f.code),
                    reason: f.reason.as_str().to_owned(),
                })),
                // Raw frames are never yielded while reading
                Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
            };
            return Some(Ok(event));
        }
    }

    async fn close(&mut self, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.to_owned().into(),
        };
        self.stream
            .close(Some(frame))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
