//! Real-time transports.
//!
//! A transport opens one bidirectional text connection per URL. The hub only
//! ever sees [`Connection`]: an outgoing sink of serialized payloads and an
//! incoming stream of raw payloads that ends when the peer closes.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<WsError> for TransportError {
    fn from(err: WsError) -> Self {
        Self::new(err.to_string())
    }
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

pub struct Connection {
    pub outgoing: FrameSink,
    pub incoming: FrameStream,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &str) -> Result<Connection, TransportError>;
}

/// WebSocket transport. Text and binary messages are both delivered as text;
/// control frames are handled by tungstenite and never surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<Connection, TransportError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = socket.split();

        let outgoing = write
            .sink_map_err(TransportError::from)
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::text(text))));

        let incoming = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
                Ok(_) => None,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => None,
                Err(err) => Some(Err(err.into())),
            })
        });

        Ok(Connection {
            outgoing: Box::pin(outgoing),
            incoming: Box::pin(incoming),
        })
    }
}
