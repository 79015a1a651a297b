//! WebSocket Channel
//!
//! [`ChatChannel`] over `tokio-tungstenite`. Text frames are passed through
//! as-is; binary frames are decoded lossily as UTF-8; pings, pongs and raw
//! frames are skipped.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::traits::{ChannelRequest, ChatChannel, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client-side WebSocket channel
pub struct WebSocketChannel {
    /// Open stream, if any
    stream: Option<WsStream>,
    /// Upper bound for one open attempt
    connect_timeout: Duration,
}

impl WebSocketChannel {
    /// Create a closed channel
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            stream: None,
            connect_timeout,
        }
    }
}

impl Default for WebSocketChannel {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

fn build_handshake(
    request: &ChannelRequest,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, TransportError> {
    let mut handshake = request.url.as_str().into_client_request().map_err(|e| {
        TransportError::ConnectionFailed(format!("invalid url {}: {e}", request.url))
    })?;

    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::ConnectionFailed(format!("invalid header {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::ConnectionFailed(format!("invalid header value: {e}")))?;
        handshake.headers_mut().insert(name, value);
    }

    Ok(handshake)
}

#[async_trait]
impl ChatChannel for WebSocketChannel {
    async fn open(&mut self, request: &ChannelRequest) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Err(TransportError::InvalidState("Already open".to_string()));
        }

        let handshake = build_handshake(request)?;
        let (stream, response) = tokio::time::timeout(self.connect_timeout, connect_async(handshake))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        tracing::info!(url = %request.url, status = %response.status(), "WebSocket opened");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::InvalidState("Not open".to_string()))?;

        stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Result<String, TransportError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::InvalidState("Not open".to_string()))?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "Close frame received");
                    self.stream = None;
                    return Err(TransportError::ConnectionClosed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket read failed");
                    self.stream = None;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.stream = None;
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "WebSocket close handshake failed");
            }
            tracing::info!("WebSocket closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
