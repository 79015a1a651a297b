//! One-Shot Fallback Client
//!
//! Non-streaming JSON POST path for `start` and `send` turns. Each call
//! returns the whole reply at once and bypasses the session machinery.
//!
//! ```text
//! POST {api_base}/chat/start?stream=0&_ts=<ms>  {paipan, kb_index_dir, kb_topk} -> {conversation_id, reply}
//! POST {api_base}/chat?stream=0&_ts=<ms>        {conversation_id, message}      -> {reply}
//! ```
//!
//! Some deployments serve the JSON body as `text/plain`, so the body is read
//! as text and parsed regardless of content type.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::CredentialSource;

/// Default HTTP API base
pub const DEFAULT_API_BASE: &str = "https://api.fateinsight.site/api";

/// Request timeout for one-shot calls
pub const ONESHOT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shown when a `start` call returns an empty reply
pub const NO_RESPONSE: &str = "（无响应）";

/// One-shot call failures
#[derive(Debug, Error)]
pub enum OneShotError {
    /// HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// Request did not complete
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Server answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// Body was not the expected JSON
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Reply to a one-shot `start`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StartReply {
    /// Newly created conversation
    pub conversation_id: String,
    /// First assistant reply ([`NO_RESPONSE`] when the server sent none)
    #[serde(default)]
    pub reply: String,
}

/// Reply to a one-shot `send`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SendReply {
    /// Assistant reply (may be empty)
    #[serde(default)]
    pub reply: String,
}

#[derive(Serialize)]
struct StartBody<'a> {
    paipan: &'a serde_json::Value,
    kb_index_dir: &'a str,
    kb_topk: u32,
}

#[derive(Serialize)]
struct SendBody<'a> {
    conversation_id: &'a str,
    message: &'a str,
}

/// Join a base URL and a path with exactly one slash between them
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Client for the one-shot endpoints
pub struct OneShotClient {
    api_base: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
    timeout: Duration,
}

impl OneShotClient {
    /// Create a client for `api_base`
    ///
    /// # Errors
    ///
    /// Returns `OneShotError::Client` if the HTTP client cannot be built.
    pub fn new(
        api_base: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, OneShotError> {
        Self::with_timeout(api_base, credentials, ONESHOT_TIMEOUT)
    }

    /// Create a client with a custom timeout
    ///
    /// # Errors
    ///
    /// Returns `OneShotError::Client` if the HTTP client cannot be built.
    pub fn with_timeout(
        api_base: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
        timeout: Duration,
    ) -> Result<Self, OneShotError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OneShotError::Client(e.to_string()))?;
        Ok(Self {
            api_base: api_base.into(),
            client,
            credentials,
            timeout,
        })
    }

    /// The configured API base
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Open a conversation from a chart
    ///
    /// # Errors
    ///
    /// Network, status and decode failures.
    pub async fn start(
        &self,
        paipan: &serde_json::Value,
        kb_index_dir: &str,
        kb_topk: u32,
    ) -> Result<StartReply, OneShotError> {
        let body = StartBody {
            paipan,
            kb_index_dir,
            kb_topk,
        };
        let mut reply: StartReply = self.post("/chat/start", &body).await?;
        if reply.reply.is_empty() {
            reply.reply = NO_RESPONSE.to_string();
        }
        tracing::info!(conversation_id = %reply.conversation_id, "One-shot start completed");
        Ok(reply)
    }

    /// Send a message in an existing conversation
    ///
    /// # Errors
    ///
    /// Network, status and decode failures.
    pub async fn send(&self, conversation_id: &str, message: &str) -> Result<SendReply, OneShotError> {
        let body = SendBody {
            conversation_id,
            message,
        };
        let reply: SendReply = self.post("/chat", &body).await?;
        tracing::debug!(conversation_id, reply_len = reply.reply.len(), "One-shot send completed");
        Ok(reply)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, OneShotError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!(
            "{}?stream=0&_ts={}",
            join_url(&self.api_base, path),
            chrono::Utc::now().timestamp_millis()
        );
        tracing::debug!(url = %url, "One-shot request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body);
        let token = self.credentials.bearer_token();
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.network_error(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.network_error(&e))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "One-shot request rejected");
            return Err(OneShotError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn network_error(&self, error: &reqwest::Error) -> OneShotError {
        if error.is_timeout() {
            OneShotError::Timeout(self.timeout)
        } else {
            OneShotError::Network(error.to_string())
        }
    }
}
