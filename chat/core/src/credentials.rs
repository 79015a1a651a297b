//! Credential Source
//!
//! Opaque supplier of the bearer token presented when a channel opens. The
//! core never refreshes or stores tokens; it asks once per open attempt and
//! puts whatever comes back into the `Authorization` header (or omits the
//! header when the token is empty).
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use chat_core::credentials::{CredentialSource, EnvToken};
//!
//! let credentials: Arc<dyn CredentialSource> = Arc::new(EnvToken::default());
//! // or any closure:
//! let credentials: Arc<dyn CredentialSource> = Arc::new(|| store.token());
//! ```

use std::fmt;

/// Environment variable read by [`EnvToken::default`]
pub const TOKEN_ENV_VAR: &str = "FATE_CHAT_TOKEN";

/// Supplies a bearer token (empty string = anonymous)
pub trait CredentialSource: Send + Sync {
    /// Current token; consulted once per channel open
    fn bearer_token(&self) -> String;
}

impl<F> CredentialSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn bearer_token(&self) -> String {
        self()
    }
}

/// Anonymous viewer
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCredentials;

impl CredentialSource for NoCredentials {
    fn bearer_token(&self) -> String {
        String::new()
    }
}

/// A fixed token
#[derive(Clone, Default)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

// Never print the token itself.
impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticToken")
            .field(&if self.0.is_empty() { "<empty>" } else { "<redacted>" })
            .finish()
    }
}

impl CredentialSource for StaticToken {
    fn bearer_token(&self) -> String {
        self.0.clone()
    }
}

/// Token read from an environment variable at every open
#[derive(Clone, Debug)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    /// Read from `var`
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new(TOKEN_ENV_VAR)
    }
}

impl CredentialSource for EnvToken {
    fn bearer_token(&self) -> String {
        std::env::var(&self.var).unwrap_or_default()
    }
}
