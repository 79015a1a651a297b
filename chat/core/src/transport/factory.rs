//! Channel Factory
//!
//! Creates the channel a streaming session should use for a configured
//! endpoint.

use super::{
    config::TransportConfig,
    traits::{ChatChannel, TransportError},
};

#[cfg(feature = "websocket")]
use super::websocket::WebSocketChannel;

/// Create a channel for the configured endpoint
///
/// # Errors
///
/// Returns `TransportError::InvalidState` if:
/// - the URL scheme is not `ws://` or `wss://`
/// - the crate was built without the `websocket` feature
///
/// # Example
///
/// ```ignore
/// use chat_core::transport::{create_channel, TransportConfig};
///
/// let config = TransportConfig::with_url("wss://api.fateinsight.site/api/chat/ws");
/// let channel = create_channel(&config)?;
/// let session = StreamingSession::new(channel, config, credentials);
/// ```
pub fn create_channel(config: &TransportConfig) -> Result<Box<dyn ChatChannel>, TransportError> {
    let url = config.ws_url.as_str();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        return Err(TransportError::InvalidState(format!(
            "Unsupported channel URL: {url}"
        )));
    }

    #[cfg(feature = "websocket")]
    {
        Ok(Box::new(WebSocketChannel::new(config.connect_timeout)))
    }

    #[cfg(not(feature = "websocket"))]
    {
        Err(TransportError::InvalidState(
            "WebSocket channel requires the `websocket` feature".into(),
        ))
    }
}
