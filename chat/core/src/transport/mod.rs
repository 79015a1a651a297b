//! Transport Layer for the Streaming Chat Channel
//!
//! Provides abstraction over the duplex channel a session runs over:
//! - `WebSocketChannel`: the remote streaming endpoint (feature `websocket`)
//! - `InProcessChannel`: direct channel communication (embedded backends, tests)
//!
//! The session never touches a socket directly; it sees [`ChatChannel`] and
//! plain text messages, and decodes them once via [`crate::protocol`].

pub mod config;
pub mod factory;
pub mod in_process;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-exports for convenience
pub use config::{ReconnectPolicy, TransportConfig, DEFAULT_WS_URL};
pub use factory::create_channel;
pub use in_process::{InProcessChannel, InProcessServer};
pub use traits::{ChannelRequest, ChatChannel, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketChannel;
