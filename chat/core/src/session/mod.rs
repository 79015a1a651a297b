//! Streaming Session
//!
//! One request/response exchange over a [`ChatChannel`]: open the channel,
//! send the single [`RequestEnvelope`], reassemble the streamed reply, and
//! settle as `Done` or `Failed`.
//!
//! # State Machine
//!
//! ```text
//! Idle ──run──▶ Connecting ──open+send──▶ Open ──first frame──▶ Streaming
//!                  ▲   │                   │                      │
//!                  │   └── failure ────────┘                      ├── done ──▶ Done
//!                  └── back-off (attempt × base) while attempts    └── error ─▶ Failed
//!                      remain, else ───────────────────────────────────────▶ Failed
//! ```
//!
//! Failures before the first inbound frame count as connect-phase failures
//! and are retried with the identical envelope. Once streaming, any
//! transport failure or error sentinel is terminal. Malformed frames are
//! logged and skipped.
//!
//! # Usage
//!
//! ```ignore
//! let mut session = StreamingSession::new(channel, config, credentials);
//! let canceller = session.canceller();
//! let outcome = session.run(&RequestEnvelope::send(id, "你好"), &mut screen).await?;
//! ```

mod buffer;

pub use buffer::RunningBuffer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::credentials::CredentialSource;
use crate::format::normalize_reply;
use crate::protocol::{decode_frame, Frame, RequestEnvelope, ServerEvent};
use crate::transport::{ChannelRequest, ChatChannel, TransportConfig, TransportError};

/// Session lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not yet run
    Idle,
    /// Opening the channel (including back-off between attempts)
    Connecting,
    /// Channel open and envelope sent, no frame received yet
    Open,
    /// At least one frame received
    Streaming,
    /// Terminal: server signalled completion
    Done,
    /// Terminal: error sentinel, transport failure, or cancellation
    Failed,
}

impl SessionState {
    /// Whether the session has settled
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Session failures
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Every connect-phase attempt failed
    #[error("could not reach chat server after {attempts} attempt(s): {source}")]
    Unreachable {
        /// Attempts made
        attempts: u32,
        /// Failure of the last attempt
        source: TransportError,
    },

    /// Transport failure after streaming began
    #[error("connection lost: {0}")]
    Transport(#[from] TransportError),

    /// The server sent its error sentinel
    #[error("server error: {0}")]
    Server(String),

    /// Cancelled through a [`SessionCanceller`]
    #[error("session cancelled")]
    Cancelled,

    /// Caller contract violated (e.g. running a session twice)
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// The envelope could not be serialized
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// Receives session callbacks, in transport delivery order
pub trait SessionObserver {
    /// The server assigned a conversation id
    fn on_meta(&mut self, _conversation_id: &str) {}

    /// The running buffer changed; `reply` is the normalized buffer
    fn on_reply_updated(&mut self, reply: &str);

    /// The server signalled completion
    fn on_finished(&mut self) {}

    /// The session failed; called at most once
    fn on_failed(&mut self, error: &SessionError);
}

/// Cancels a running session from outside
///
/// Cloneable; cancelling more than once is harmless.
#[derive(Clone, Debug)]
pub struct SessionCanceller {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionCanceller {
    /// Request cancellation
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Resolves once cancellation is requested
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    // The session owns a sender, so the channel never closes while polled.
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Outcome of the connect phase
enum Connected {
    /// First inbound message (or its failure) after a successful open+send
    FirstMessage(String),
    /// Settled before streaming began
    Settled(SessionError),
}

/// One streaming turn over a channel
pub struct StreamingSession<C: ChatChannel> {
    channel: C,
    config: TransportConfig,
    credentials: Arc<dyn CredentialSource>,
    state: SessionState,
    buffer: RunningBuffer,
    conversation_id: Option<String>,
    attempts: u32,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl<C: ChatChannel> StreamingSession<C> {
    /// Create an idle session
    pub fn new(channel: C, config: TransportConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            channel,
            config,
            credentials,
            state: SessionState::Idle,
            buffer: RunningBuffer::new(),
            conversation_id: None,
            attempts: 0,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    /// Handle for cancelling this session
    #[must_use]
    pub fn canceller(&self) -> SessionCanceller {
        SessionCanceller {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Conversation id from the `meta` event, if one arrived
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Connect attempts made so far
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Current running buffer (empty once the session is done)
    #[must_use]
    pub fn buffer(&self) -> &RunningBuffer {
        &self.buffer
    }

    /// Give the channel back, e.g. to inspect it after the turn
    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Run the turn to completion
    ///
    /// Returns the terminal state. Terminal failures go to
    /// [`SessionObserver::on_failed`] exactly once and still return
    /// `Ok(SessionState::Failed)`.
    ///
    /// # Errors
    ///
    /// `SessionError::InvalidState` if the session has already run, or
    /// `SessionError::Encode` if the envelope cannot be serialized. The
    /// observer is not called in either case.
    pub async fn run<O>(
        &mut self,
        envelope: &RequestEnvelope,
        observer: &mut O,
    ) -> Result<SessionState, SessionError>
    where
        O: SessionObserver + ?Sized,
    {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidState(format!(
                "session already ran (state {:?})",
                self.state
            )));
        }
        let payload = envelope
            .to_json()
            .map_err(|e| SessionError::Encode(e.to_string()))?;

        self.buffer.clear();
        tracing::debug!(action = envelope.action(), url = %self.config.ws_url, "Starting session");

        let first = match self.connect(&payload).await {
            Connected::FirstMessage(raw) => raw,
            Connected::Settled(error) => return Ok(self.fail(error, observer).await),
        };

        self.state = SessionState::Streaming;
        if let Some(terminal) = self.handle_message(&first, observer).await {
            return Ok(terminal);
        }

        loop {
            let received = tokio::select! {
                biased;
                () = cancelled(&mut self.cancel_rx) => None,
                result = self.channel.recv() => Some(result),
            };

            match received {
                None => return Ok(self.fail(SessionError::Cancelled, observer).await),
                Some(Err(e)) => return Ok(self.fail(SessionError::Transport(e), observer).await),
                Some(Ok(raw)) => {
                    if let Some(terminal) = self.handle_message(&raw, observer).await {
                        return Ok(terminal);
                    }
                }
            }
        }
    }

    /// Open, send and wait for the first inbound message, retrying
    /// connect-phase failures per the reconnect policy.
    async fn connect(&mut self, payload: &str) -> Connected {
        let policy = self.config.reconnect;

        loop {
            self.attempts += 1;
            let attempt = self.attempts;
            self.state = SessionState::Connecting;

            let error = match self.attempt_once(payload).await {
                Ok(Some(raw)) => return Connected::FirstMessage(raw),
                Ok(None) => return Connected::Settled(SessionError::Cancelled),
                Err(e) => e,
            };

            tracing::warn!(attempt, max_attempts = policy.max_attempts, error = %error, "Connect attempt failed");
            self.channel.close().await;

            if !policy.allows_retry(attempt) {
                return Connected::Settled(SessionError::Unreachable {
                    attempts: attempt,
                    source: error,
                });
            }

            // Linear back-off before the next reconnect attempt; the same
            // envelope is resent even if the server saw the previous one.
            let delay = policy.delay_after(attempt);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
            tokio::select! {
                biased;
                () = cancelled(&mut self.cancel_rx) => return Connected::Settled(SessionError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One open/send/first-receive cycle; `Ok(None)` means cancelled
    async fn attempt_once(&mut self, payload: &str) -> Result<Option<String>, TransportError> {
        let token = self.credentials.bearer_token();
        let request = ChannelRequest::authorized(self.config.ws_url.clone(), &token);

        let opened = tokio::select! {
            biased;
            () = cancelled(&mut self.cancel_rx) => return Ok(None),
            result = self.channel.open(&request) => result,
        };
        opened?;

        self.channel.send(payload.to_string()).await?;
        self.state = SessionState::Open;
        tracing::debug!(attempt = self.attempts, "Envelope sent");

        tokio::select! {
            biased;
            () = cancelled(&mut self.cancel_rx) => Ok(None),
            result = self.channel.recv() => result.map(Some),
        }
    }

    /// Apply one inbound message; returns the terminal state if it ended
    /// the session
    async fn handle_message<O>(&mut self, raw: &str, observer: &mut O) -> Option<SessionState>
    where
        O: SessionObserver + ?Sized,
    {
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, len = raw.len(), "Ignoring malformed frame");
                return None;
            }
        };

        match frame {
            Frame::Event(ServerEvent::Meta { conversation_id }) => {
                tracing::debug!(conversation_id = %conversation_id, "Conversation assigned");
                observer.on_meta(&conversation_id);
                self.conversation_id = Some(conversation_id);
                None
            }
            Frame::Event(ServerEvent::Text { text, replace }) => {
                self.buffer.apply(&text, replace);
                tracing::debug!(replace, fragment_len = text.len(), total_len = self.buffer.as_str().len(), "Reply updated");
                observer.on_reply_updated(&normalize_reply(self.buffer.as_str()));
                None
            }
            Frame::Done => {
                observer.on_finished();
                self.buffer.clear();
                self.channel.close().await;
                self.state = SessionState::Done;
                tracing::info!(
                    conversation_id = self.conversation_id.as_deref().unwrap_or(""),
                    "Session finished"
                );
                Some(SessionState::Done)
            }
            Frame::Error(message) => Some(self.fail(SessionError::Server(message), observer).await),
        }
    }

    async fn fail<O>(&mut self, error: SessionError, observer: &mut O) -> SessionState
    where
        O: SessionObserver + ?Sized,
    {
        self.channel.close().await;
        self.state = SessionState::Failed;
        tracing::info!(error = %error, "Session failed");
        observer.on_failed(&error);
        SessionState::Failed
    }
}
