//! Chat Core - Headless Streaming Chat for the Fate Reading Assistant
//!
//! This crate holds the conversational core of the chat client, independent
//! of any UI framework. It can drive a terminal, a mobile shell, or run
//! headless in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surface                              │
//! │        (fate-chat CLI, mobile shell, tests, ...)                 │
//! └──────────────┬──────────────────────────────▲────────────────────┘
//!                │ begin_start / begin_send      │ Transcript (node trees)
//!                ▼                               │
//! ┌──────────────────────────────────────────────┴───────────────────┐
//! │  ChatScreen ◀── SessionObserver ── StreamingSession              │
//! │      │                                   │                       │
//! │  Transcript + RedactionGate        ChatChannel (WebSocket,       │
//! │      │                              in-process)                  │
//! │  format: normalize ▶ block ▶ inline      │                       │
//! │                                    protocol::decode_frame        │
//! │  OneShotClient (non-streaming fallback)                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamingSession`]: one turn over a duplex channel, with connect-phase
//!   reconnects
//! - [`ChatScreen`]: per-screen state; observes a session and owns the
//!   [`Transcript`]
//! - [`format_markdown`] / [`normalize_reply`]: pure text-to-node-tree
//!   conversion
//! - [`OneShotClient`]: request/response fallback
//!
//! # Quick Start
//!
//! ```ignore
//! use chat_core::{config, transport, ChatScreen, StreamingSession};
//!
//! let config = config::load_config()?;
//! let mut screen = ChatScreen::new(config.chat_settings(), config.redaction_gate(false));
//! let envelope = screen.begin_start(paipan)?;
//!
//! let channel = transport::create_channel(&config.transport)?;
//! let mut session = StreamingSession::new(channel, config.transport.clone(), config.credentials());
//! session.run(&envelope, &mut screen).await?;
//!
//! for message in screen.transcript().messages() {
//!     // render message.nodes
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`format`]: reply normalization, inline markup scanning, block formatting
//! - [`protocol`]: request envelopes and inbound frame decoding
//! - [`transport`]: channel abstraction and implementations
//! - [`credentials`]: bearer token sources
//! - [`session`]: the streaming session state machine
//! - [`transcript`]: message list and redaction gate
//! - [`chat`]: per-screen state
//! - [`quick_ask`]: canned analysis prompts
//! - [`oneshot`]: non-streaming fallback client
//! - [`config`]: TOML and environment configuration

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chat;
pub mod config;
pub mod credentials;
pub mod format;
pub mod oneshot;
pub mod protocol;
pub mod quick_ask;
pub mod session;
pub mod transcript;
pub mod transport;

// Re-exports for convenience
pub use chat::{ChatError, ChatScreen, ChatSettings};
pub use credentials::{CredentialSource, EnvToken, NoCredentials, StaticToken};
pub use format::{
    format_markdown, normalize_reply, parse_inline, render_reply, BlockNode, HeadingLevel,
    HighlightClass, InlineNode, SpanKind,
};
pub use oneshot::{OneShotClient, OneShotError, SendReply, StartReply};
pub use protocol::{decode_frame, DecodeError, Frame, RequestEnvelope, ServerEvent};
pub use quick_ask::QuickTopic;
pub use session::{
    RunningBuffer, SessionCanceller, SessionError, SessionObserver, SessionState, StreamingSession,
};
pub use transcript::{Message, RedactionGate, Role, Transcript};
pub use transport::{ChannelRequest, ChatChannel, ReconnectPolicy, TransportConfig, TransportError};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ClientToml,
    ConfigError, ConfigOverrides, ConfigSource,
};
