//! Transport Traits
//!
//! The duplex, message-oriented channel a streaming session runs over.
//! Implementations own the socket; the session only sees text messages.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during channel operations
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The channel could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Opening the channel took longer than allowed
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// The peer closed the channel
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send a message
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive a message
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Channel not in the expected state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Where to open a channel and which handshake headers to present
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelRequest {
    /// Endpoint URL (`ws://` or `wss://` for the WebSocket channel)
    pub url: String,
    /// Handshake headers, in insertion order
    pub headers: Vec<(String, String)>,
}

impl ChannelRequest {
    /// Create a request without headers
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Request carrying the standard JSON content type and, when `token`
    /// is non-empty, a bearer authorization header
    pub fn authorized(url: impl Into<String>, token: &str) -> Self {
        let request = Self::new(url).with_header("Content-Type", "application/json");
        if token.is_empty() {
            request
        } else {
            request.with_header("Authorization", format!("Bearer {token}"))
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value (case-insensitive name)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A duplex text channel to the chat backend
///
/// One channel value may be opened more than once (reconnect attempts), but
/// never while already open.
#[async_trait]
pub trait ChatChannel: Send {
    /// Open the channel
    async fn open(&mut self, request: &ChannelRequest) -> Result<(), TransportError>;

    /// Send one text message
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Receive the next text message (waits until one arrives)
    ///
    /// Returns `TransportError::ConnectionClosed` once the peer has closed.
    async fn recv(&mut self) -> Result<String, TransportError>;

    /// Close the channel and release the underlying handle
    async fn close(&mut self);

    /// Whether the channel is currently open
    fn is_open(&self) -> bool;
}

#[async_trait]
impl<C: ChatChannel + ?Sized> ChatChannel for Box<C> {
    async fn open(&mut self, request: &ChannelRequest) -> Result<(), TransportError> {
        (**self).open(request).await
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        (**self).send(text).await
    }

    async fn recv(&mut self) -> Result<String, TransportError> {
        (**self).recv().await
    }

    async fn close(&mut self) {
        (**self).close().await;
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
