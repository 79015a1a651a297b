//! TOML Configuration File Support
//!
//! Centralized configuration loading for chat clients, from
//! `$XDG_CONFIG_HOME/fate-chat/client.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! ws_url = "wss://api.fateinsight.site/api/chat/ws"
//! api_base = "https://api.fateinsight.site/api"
//!
//! [session]
//! reconnect_attempts = 3
//! reconnect_base_delay_ms = 1000
//! connect_timeout_ms = 10000
//!
//! [transcript]
//! preview_threshold = 50
//!
//! [start]
//! kb_index_dir = ""
//! kb_topk = 3
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::ChatSettings;
use crate::credentials::{CredentialSource, NoCredentials, StaticToken, TOKEN_ENV_VAR};
use crate::oneshot::DEFAULT_API_BASE;
use crate::transcript::{RedactionGate, DEFAULT_PREVIEW_THRESHOLD};
use crate::transport::config::TransportConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where the configuration last changed from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[server]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Streaming endpoint
    pub ws_url: Option<String>,
    /// One-shot HTTP API base
    pub api_base: Option<String>,
}

/// `[session]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Total connect attempts per session
    pub reconnect_attempts: Option<u32>,
    /// Back-off base interval in milliseconds
    pub reconnect_base_delay_ms: Option<u64>,
    /// Open timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// `[transcript]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptToml {
    /// Characters shown in full to anonymous viewers
    pub preview_threshold: Option<usize>,
}

/// `[start]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartToml {
    /// Knowledge-base index directory
    pub kb_index_dir: Option<String>,
    /// Knowledge-base passages to retrieve
    pub kb_topk: Option<u32>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Server endpoints
    pub server: ServerToml,
    /// Session timings
    pub session: SessionToml,
    /// Transcript policy
    pub transcript: TranscriptToml,
    /// Start-turn parameters
    pub start: StartToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Streaming transport settings
    pub transport: TransportConfig,

    /// One-shot HTTP API base
    pub api_base: String,

    /// Redaction threshold in characters
    pub preview_threshold: usize,

    /// Knowledge-base index directory for `start` turns
    pub kb_index_dir: String,

    /// Knowledge-base passages for `start` turns
    pub kb_topk: u32,

    /// Bearer token, if one was supplied
    pub token: Option<String>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            api_base: DEFAULT_API_BASE.to_string(),
            preview_threshold: DEFAULT_PREVIEW_THRESHOLD,
            kb_index_dir: String::new(),
            kb_topk: 3,
            token: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Where the configuration last changed from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check values a session cannot work with
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` for zero reconnect attempts or an
    /// empty endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.reconnect.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect_attempts must be at least 1".to_string(),
            ));
        }
        if self.transport.ws_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("ws_url is empty".to_string()));
        }
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::ValidationError("api_base is empty".to_string()));
        }
        Ok(())
    }

    /// Redaction gate for a viewer
    #[must_use]
    pub fn redaction_gate(&self, authenticated: bool) -> RedactionGate {
        RedactionGate {
            threshold: self.preview_threshold,
            authenticated,
        }
    }

    /// Screen settings carrying the configured start parameters
    #[must_use]
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            kb_index_dir: self.kb_index_dir.clone(),
            kb_topk: self.kb_topk,
            ..ChatSettings::default()
        }
    }

    /// Credential source for the configured token
    #[must_use]
    pub fn credentials(&self) -> Arc<dyn CredentialSource> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => Arc::new(StaticToken::new(token)),
            _ => Arc::new(NoCredentials),
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/fate-chat/client.toml` or
/// `~/.config/fate-chat/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("fate-chat").join("client.toml"))
}

/// Load configuration from the default path, the environment and defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the result
/// fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |var| std::env::var(var).ok());
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref url) = toml.server.ws_url {
        config.transport.ws_url.clone_from(url);
    }
    if let Some(ref base) = toml.server.api_base {
        config.api_base.clone_from(base);
    }

    if let Some(attempts) = toml.session.reconnect_attempts {
        config.transport.reconnect.max_attempts = attempts;
    }
    if let Some(delay) = toml.session.reconnect_base_delay_ms {
        config.transport.reconnect.base_delay = Duration::from_millis(delay);
    }
    if let Some(timeout) = toml.session.connect_timeout_ms {
        config.transport.connect_timeout = Duration::from_millis(timeout);
    }

    if let Some(threshold) = toml.transcript.preview_threshold {
        config.preview_threshold = threshold;
    }

    if let Some(ref dir) = toml.start.kb_index_dir {
        config.kb_index_dir.clone_from(dir);
    }
    if let Some(topk) = toml.start.kb_topk {
        config.kb_topk = topk;
    }
}

/// Apply environment overrides; `lookup` reads one variable
fn apply_env_config<F>(config: &mut ClientConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("FATE_CHAT_WS_URL") {
        config.transport.ws_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(base) = lookup("FATE_CHAT_API_BASE") {
        config.api_base = base;
        config.source = ConfigSource::Env;
    }
    if let Some(attempts) = lookup("FATE_CHAT_RECONNECT_ATTEMPTS") {
        if let Ok(n) = attempts.parse::<u32>() {
            config.transport.reconnect.max_attempts = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(delay) = lookup("FATE_CHAT_RECONNECT_DELAY") {
        if let Ok(ms) = delay.parse::<u64>() {
            config.transport.reconnect.base_delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(timeout) = lookup("FATE_CHAT_CONNECT_TIMEOUT") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.transport.connect_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(token) = lookup(TOKEN_ENV_VAR) {
        config.token = Some(token);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides, applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Streaming endpoint override
    pub ws_url: Option<String>,

    /// API base override
    pub api_base: Option<String>,

    /// Token override
    pub token: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set streaming endpoint override
    #[must_use]
    pub fn with_ws_url(mut self, url: String) -> Self {
        self.ws_url = Some(url);
        self
    }

    /// Set API base override
    #[must_use]
    pub fn with_api_base(mut self, base: String) -> Self {
        self.api_base = Some(base);
        self
    }

    /// Set token override
    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Apply overrides and re-validate
    ///
    /// # Errors
    ///
    /// As [`ClientConfig::validate`].
    pub fn apply(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        if self.ws_url.is_some() || self.api_base.is_some() || self.token.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.ws_url {
            config.transport.ws_url.clone_from(url);
        }
        if let Some(ref base) = self.api_base {
            config.api_base.clone_from(base);
        }
        if let Some(ref token) = self.token {
            config.token = Some(token.clone());
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    fn parse(toml_content: &str) -> ClientConfig {
        let mut config = ClientConfig::default();
        let toml_config: ClientToml = toml::from_str(toml_content).unwrap();
        apply_toml_config(&mut config, &toml_config);
        config
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.transport.reconnect.max_attempts, 3);
        assert_eq!(config.transport.reconnect.base_delay, Duration::from_millis(1000));
        assert_eq!(config.transport.connect_timeout, Duration::from_millis(10_000));
        assert_eq!(config.preview_threshold, 50);
        assert_eq!(config.kb_index_dir, "");
        assert_eq!(config.kb_topk, 3);
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("fate-chat/client.toml"));
        }
    }

    #[test]
    fn test_parse_full_toml() {
        let config = parse(
            r#"
[server]
ws_url = "ws://127.0.0.1:8000/api/chat/ws"
api_base = "http://127.0.0.1:8000"

[session]
reconnect_attempts = 5
reconnect_base_delay_ms = 250
connect_timeout_ms = 3000

[transcript]
preview_threshold = 120

[start]
kb_index_dir = "kb/main"
kb_topk = 8
"#,
        );

        assert_eq!(config.transport.ws_url, "ws://127.0.0.1:8000/api/chat/ws");
        assert_eq!(config.api_base, "http://127.0.0.1:8000");
        assert_eq!(config.transport.reconnect.max_attempts, 5);
        assert_eq!(config.transport.reconnect.base_delay, Duration::from_millis(250));
        assert_eq!(config.transport.connect_timeout, Duration::from_millis(3000));
        assert_eq!(config.preview_threshold, 120);
        assert_eq!(config.kb_index_dir, "kb/main");
        assert_eq!(config.kb_topk, 8);
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let config = parse("[start]\nkb_topk = 5\n");
        assert_eq!(config.kb_topk, 5);
        assert_eq!(config.preview_threshold, 50);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[transcript]\npreview_threshold = 10\n").unwrap();

        let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.preview_threshold, 10);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_path(Some(dir.path().join("absent.toml"))).unwrap();
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[session\nreconnect_attempts = ").unwrap();
        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[session]\nreconnect_attempts = 0\n").unwrap();
        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = parse("[server]\nws_url = \"ws://file/ws\"\n");
        apply_env_config(
            &mut config,
            env(&[
                ("FATE_CHAT_WS_URL", "ws://env/ws"),
                ("FATE_CHAT_RECONNECT_ATTEMPTS", "4"),
                ("FATE_CHAT_RECONNECT_DELAY", "not-a-number"),
                ("FATE_CHAT_TOKEN", "env-token"),
            ]),
        );

        assert_eq!(config.transport.ws_url, "ws://env/ws");
        assert_eq!(config.transport.reconnect.max_attempts, 4);
        assert_eq!(config.transport.reconnect.base_delay, Duration::from_millis(1000));
        assert_eq!(config.token.as_deref(), Some("env-token"));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = ClientConfig::default();
        apply_env_config(&mut config, env(&[("FATE_CHAT_API_BASE", "http://env")]));

        ConfigOverrides::new()
            .with_api_base("http://cli".to_string())
            .apply(&mut config)
            .unwrap();

        assert_eq!(config.api_base, "http://cli");
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_url_override_rejected() {
        let mut config = ClientConfig::default();
        let result = ConfigOverrides::new()
            .with_ws_url(String::new())
            .apply(&mut config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_derived_values() {
        let mut config = parse("[transcript]\npreview_threshold = 20\n[start]\nkb_topk = 7\n");
        assert_eq!(config.redaction_gate(false).threshold, 20);
        assert!(config.redaction_gate(true).authenticated);
        assert_eq!(config.chat_settings().kb_topk, 7);

        assert_eq!(config.credentials().bearer_token(), "");
        config.token = Some("t".to_string());
        assert_eq!(config.credentials().bearer_token(), "t");
    }
}
