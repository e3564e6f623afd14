//! Configuration management for the Flowise relay.
//!
//! Configuration lives in a single JSON file at `~/.flowise-relay/config.json`.
//! Every field has a default, so a missing file yields a working local setup.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! ## Server
//! - `RELAY_BIND_ADDRESS` → server.bind
//! - `RELAY_PORT` (legacy: `PORT`) → server.port
//!
//! ## Bot Framework credentials
//! - `MICROSOFT_APP_ID` → bot.app_id
//! - `MICROSOFT_APP_PASSWORD` → bot.app_password
//!
//! ## Flowise
//! - `FLOWISE_URL` → flowise.base_url
//! - `CHATFLOW_ID` → flowise.chatflow_id
//! - `RELAY_FLOWISE_TIMEOUT_SECS` → flowise.timeout_secs
//!
//! ## Observability
//! - `RELAY_LOG_LEVEL` → observability.log_level
//! - `RELAY_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".flowise-relay"),
        |dirs| dirs.home_dir().join(".flowise-relay"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the server.
    /// Default: "127.0.0.1" (conservative, local only)
    /// Set to "0.0.0.0" for remote access
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port. Default matches the Bot Framework convention.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

const fn default_port() -> u16 {
    3978
}

// ============================================================================
// Bot Framework Configuration
// ============================================================================

/// Microsoft Bot Framework credentials.
///
/// When both fields are empty the connector runs unauthenticated, which is
/// what the Bot Framework Emulator expects for local development.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    /// Microsoft App ID
    #[serde(default)]
    pub app_id: String,

    /// Microsoft App password (client secret)
    #[serde(default)]
    pub app_password: String,
}

impl BotConfig {
    /// Whether a full set of credentials is present.
    pub fn credentials_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.app_password.is_empty()
    }
}

// ============================================================================
// Flowise Configuration
// ============================================================================

/// Downstream Flowise prediction endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowiseConfig {
    /// Base URL of the Flowise instance (no trailing slash needed).
    #[serde(default = "default_flowise_url")]
    pub base_url: String,

    /// Chatflow ID to run predictions against.
    #[serde(default)]
    pub chatflow_id: String,

    /// Request timeout for prediction calls, in seconds.
    #[serde(default = "default_flowise_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FlowiseConfig {
    fn default() -> Self {
        Self {
            base_url: default_flowise_url(),
            chatflow_id: String::new(),
            timeout_secs: default_flowise_timeout_secs(),
        }
    }
}

fn default_flowise_url() -> String {
    "http://localhost:3000".into()
}

const fn default_flowise_timeout_secs() -> u64 {
    120
}

impl FlowiseConfig {
    /// Full prediction endpoint URL for the configured chatflow.
    pub fn prediction_url(&self) -> String {
        format!(
            "{}/api/v1/prediction/{}",
            self.base_url.trim_end_matches('/'),
            self.chatflow_id
        )
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" for structured JSON, "pretty" for human-readable
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the relay.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Bot Framework credentials
    #[serde(default)]
    pub bot: BotConfig,

    /// Flowise prediction endpoint
    #[serde(default)]
    pub flowise: FlowiseConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable fallbacks.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("RELAY_BIND_ADDRESS") {
            self.server.bind = bind;
        }
        if let Ok(port) = std::env::var("RELAY_PORT").or_else(|_| std::env::var("PORT")) {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(app_id) = std::env::var("MICROSOFT_APP_ID") {
            self.bot.app_id = app_id;
        }
        if let Ok(password) = std::env::var("MICROSOFT_APP_PASSWORD") {
            self.bot.app_password = password;
        }

        if let Ok(url) = std::env::var("FLOWISE_URL") {
            self.flowise.base_url = url;
        }
        if let Ok(id) = std::env::var("CHATFLOW_ID") {
            self.flowise.chatflow_id = id;
        }
        if let Ok(timeout) = std::env::var("RELAY_FLOWISE_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.flowise.timeout_secs = t;
            }
        }

        if let Ok(level) = std::env::var("RELAY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("RELAY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }
}
