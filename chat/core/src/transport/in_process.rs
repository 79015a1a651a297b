//! In-Process Channel
//!
//! Channel-backed [`ChatChannel`] for embedding a backend in the same
//! process and for driving sessions in tests.
//!
//! # Usage
//!
//! ```ignore
//! let (channel, mut server) = InProcessChannel::new_pair();
//!
//! server.push_text(r#"{"text":"Hello","replace":true}"#);
//! server.push_text("[DONE]");
//!
//! // Hand `channel` to a StreamingSession; read what it sent:
//! let envelope = server.next_request().await;
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::{ChannelRequest, ChatChannel, TransportError};

/// Shared bookkeeping visible from both ends
#[derive(Default)]
struct Shared {
    opens: AtomicU32,
    closes: AtomicU32,
    /// Scripted outcomes for upcoming `open` calls; empty = succeed
    open_script: Mutex<VecDeque<TransportError>>,
    last_request: Mutex<Option<ChannelRequest>>,
}

/// Client end, handed to the session
pub struct InProcessChannel {
    to_server: mpsc::UnboundedSender<String>,
    from_server: mpsc::UnboundedReceiver<Result<String, TransportError>>,
    shared: Arc<Shared>,
    open: bool,
}

/// Server end, kept by the embedding backend or the test
pub struct InProcessServer {
    requests: mpsc::UnboundedReceiver<String>,
    pushes: mpsc::UnboundedSender<Result<String, TransportError>>,
    shared: Arc<Shared>,
}

impl InProcessChannel {
    /// Create a connected client/server pair
    #[must_use]
    pub fn new_pair() -> (Self, InProcessServer) {
        let (to_server, requests) = mpsc::unbounded_channel();
        let (pushes, from_server) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        let channel = Self {
            to_server,
            from_server,
            shared: Arc::clone(&shared),
            open: false,
        };
        let server = InProcessServer {
            requests,
            pushes,
            shared,
        };
        (channel, server)
    }
}

impl InProcessServer {
    /// Queue a text message for the client
    pub fn push_text(&self, text: impl Into<String>) {
        // The client may already be gone; nothing to deliver to then.
        let _ = self.pushes.send(Ok(text.into()));
    }

    /// Queue a transport error for the client's next receive
    pub fn push_error(&self, error: TransportError) {
        let _ = self.pushes.send(Err(error));
    }

    /// Make the next `open` call fail with `error` (calls queue up)
    pub fn fail_next_open(&self, error: TransportError) {
        if let Ok(mut script) = self.shared.open_script.lock() {
            script.push_back(error);
        }
    }

    /// Wait for the next message the client sent
    pub async fn next_request(&mut self) -> Option<String> {
        self.requests.recv().await
    }

    /// Everything the client has sent so far, without waiting
    pub fn drain_requests(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(text) = self.requests.try_recv() {
            out.push(text);
        }
        out
    }

    /// Number of `open` calls made, successful or not
    #[must_use]
    pub fn open_count(&self) -> u32 {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Number of `close` calls on an open channel
    #[must_use]
    pub fn close_count(&self) -> u32 {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// The request of the most recent `open` call
    #[must_use]
    pub fn last_request(&self) -> Option<ChannelRequest> {
        self.shared.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl ChatChannel for InProcessChannel {
    async fn open(&mut self, request: &ChannelRequest) -> Result<(), TransportError> {
        if self.open {
            return Err(TransportError::InvalidState("Already open".to_string()));
        }

        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.shared.last_request.lock() {
            *last = Some(request.clone());
        }

        let scripted = self
            .shared
            .open_script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        if let Some(error) = scripted {
            return Err(error);
        }

        self.open = true;
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::InvalidState("Not open".to_string()));
        }
        self.to_server
            .send(text)
            .map_err(|_| TransportError::SendFailed("Server end dropped".to_string()))
    }

    async fn recv(&mut self) -> Result<String, TransportError> {
        if !self.open {
            return Err(TransportError::InvalidState("Not open".to_string()));
        }
        match self.from_server.recv().await {
            Some(Ok(text)) => Ok(text),
            Some(Err(error)) => {
                self.open = false;
                Err(error)
            }
            None => {
                self.open = false;
                Err(TransportError::ConnectionClosed)
            }
        }
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.shared.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
