//! Wire Protocol
//!
//! The two message shapes that cross the streaming channel:
//!
//! - [`RequestEnvelope`]: the single outbound JSON object of a turn
//! - [`Frame`]: one inbound text message, decoded once at the boundary
//!
//! Inbound text is either a bare terminal token or a JSON object:
//!
//! ```text
//! [DONE] | done                         -> Frame::Done
//! [ERROR]<msg> | error:<msg>            -> Frame::Error(msg)
//! {"meta":{"conversation_id":"c1"}}     -> Frame::Event(ServerEvent::Meta)
//! {"text":"...","replace":true}         -> Frame::Event(ServerEvent::Text)
//! anything else                         -> DecodeError
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The one outbound payload of a streaming turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RequestEnvelope {
    /// Open a new conversation from a chart
    Start {
        /// Chart payload produced by the chart screen; forwarded untouched
        paipan: serde_json::Value,
        /// Knowledge-base index directory ("" = server default)
        kb_index_dir: String,
        /// Number of knowledge-base passages to retrieve
        kb_topk: u32,
    },
    /// Continue an existing conversation
    Send {
        /// Server-assigned conversation id
        conversation_id: String,
        /// The user's message (or a canned prompt)
        message: String,
    },
}

impl RequestEnvelope {
    /// Build a `start` envelope
    pub fn start(paipan: serde_json::Value, kb_index_dir: impl Into<String>, kb_topk: u32) -> Self {
        Self::Start {
            paipan,
            kb_index_dir: kb_index_dir.into(),
            kb_topk,
        }
    }

    /// Build a `send` envelope
    pub fn send(conversation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            conversation_id: conversation_id.into(),
            message: message.into(),
        }
    }

    /// The action tag, for logging
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Send { .. } => "send",
        }
    }

    /// Serialize to the JSON text sent over the channel
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A typed, non-terminal server event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    /// Conversation id assigned by the server
    Meta {
        /// The id
        conversation_id: String,
    },
    /// A piece of reply text
    Text {
        /// Fragment, or the whole reply so far when `replace` is set
        text: String,
        /// Whether `text` supersedes everything received before
        replace: bool,
    },
}

/// One decoded inbound message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A typed event
    Event(ServerEvent),
    /// Terminal success sentinel
    Done,
    /// Terminal failure sentinel with the server's message
    Error(String),
}

impl Frame {
    /// Whether this frame ends the session
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

/// Why an inbound message could not be decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or JSON of the wrong shape
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A JSON object carrying neither `meta` nor `text`
    #[error("event carries neither meta nor text")]
    Empty,

    /// A JSON object carrying both `meta` and `text`
    #[error("event carries both meta and text")]
    Ambiguous,
}

#[derive(Deserialize)]
struct RawMeta {
    conversation_id: String,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    meta: Option<RawMeta>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    replace: Option<bool>,
}

/// Decode one inbound text message.
pub fn decode_frame(raw: &str) -> Result<Frame, DecodeError> {
    let trimmed = raw.trim();

    if trimmed == "[DONE]" || trimmed == "done" {
        return Ok(Frame::Done);
    }
    if let Some(message) = trimmed
        .strip_prefix("[ERROR]")
        .or_else(|| trimmed.strip_prefix("error:"))
    {
        return Ok(Frame::Error(message.trim().to_string()));
    }

    let event: RawEvent = serde_json::from_str(trimmed)?;
    match (event.meta, event.text) {
        (Some(meta), None) => Ok(Frame::Event(ServerEvent::Meta {
            conversation_id: meta.conversation_id,
        })),
        (None, Some(text)) => Ok(Frame::Event(ServerEvent::Text {
            text,
            replace: event.replace.unwrap_or(false),
        })),
        (Some(_), Some(_)) => Err(DecodeError::Ambiguous),
        (None, None) => Err(DecodeError::Empty),
    }
}
