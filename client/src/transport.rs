//! Websocket connection manager: one duplex socket per live session.
//!
//! The manager owns the socket lifecycle only. It does not retry; any
//! low-level fault or server-initiated close collapses to "disconnected"
//! and retry policy belongs to a caller-level supervisory loop.

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Error raised by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The base URL carries a scheme the transport cannot map to ws/wss.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    /// The websocket handshake failed.
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    /// An established connection faulted while sending or receiving.
    #[error("websocket transport failed: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),
}

/// Build the room endpoint URL for a joined role.
///
/// The scheme follows the HTTP base: `http` becomes `ws`, `https` becomes
/// `wss`.
///
/// # Errors
///
/// Returns [`TransportError::InvalidBaseUrl`] for any other scheme.
pub fn ws_url(
    base_url: &str,
    room_id: &str,
    role_segment: &str,
    username: &str,
) -> Result<String, TransportError> {
    let trimmed = base_url.trim_end_matches('/');

    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!(
            "ws://{rest}/api/estimation/room/{room_id}/{role_segment}?name={username}"
        ));
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!(
            "wss://{rest}/api/estimation/room/{room_id}/{role_segment}?name={username}"
        ));
    }

    Err(TransportError::InvalidBaseUrl(base_url.to_owned()))
}

/// A single open duplex connection to a room.
#[derive(Debug)]
pub struct Connection {
    stream: WsStream,
}

impl Connection {
    /// Open a connection and wait for the handshake to complete.
    ///
    /// Does not resolve until the underlying connection is open or failed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when the handshake fails.
    pub async fn open(url: &str) -> Result<Self, TransportError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|error| TransportError::Connect(Box::new(error)))?;
        Ok(Self { stream })
    }

    /// Split into independently owned write and read halves.
    #[must_use]
    pub fn split(self) -> (ConnectionWriter, ConnectionReader) {
        let (sink, stream) = self.stream.split();
        (ConnectionWriter { sink }, ConnectionReader { stream })
    }
}

/// Write half of a connection.
pub struct ConnectionWriter {
    sink: SplitSink<WsStream, Message>,
}

impl ConnectionWriter {
    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Transport`] when the socket send fails.
    pub async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|error| TransportError::Transport(Box::new(error)))
    }

    /// Close the connection. Safe to call when already closed.
    pub async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

/// Read half of a connection.
pub struct ConnectionReader {
    stream: SplitStream<WsStream>,
}

impl ConnectionReader {
    /// Receive the next inbound text frame.
    ///
    /// Non-text control frames are skipped. Returns `None` once the peer
    /// closed the connection or the stream ended; the manager does not
    /// distinguish expected from unexpected closure.
    pub async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let message = self.stream.next().await?;
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(error) => return Some(Err(TransportError::Transport(Box::new(error)))),
            }
        }
    }
}
