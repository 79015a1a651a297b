//! Transport Configuration
//!
//! Endpoint and reconnect settings for the streaming channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default streaming endpoint
pub const DEFAULT_WS_URL: &str = "wss://api.fateinsight.site/api/chat/ws";

/// Reconnect policy for the connect phase of a session
///
/// Attempt `n` (1-based) that fails is followed by a wait of
/// `n × base_delay` before attempt `n + 1`. After `max_attempts` failures the
/// error is surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Total open attempts, including the first
    pub max_attempts: u32,
    /// Base interval for the linear back-off
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl ReconnectPolicy {
    /// Policy without waits between attempts
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Wait after failed attempt number `attempt` (1-based)
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Whether another attempt may follow failed attempt number `attempt`
    #[must_use]
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Streaming endpoint URL
    pub ws_url: String,

    /// How long a single open attempt may take
    pub connect_timeout: Duration,

    /// Connect-phase reconnect policy
    pub reconnect: ReconnectPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            connect_timeout: Duration::from_millis(10_000),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl TransportConfig {
    /// Configuration for a given endpoint with default timings
    pub fn with_url(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }
}
