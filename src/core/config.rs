//! Configuration management for the MAAS MCP bridge.
//!
//! Handles loading configuration from TOML files, `.env` files and
//! environment variable overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::{InvalidRetryPolicy, RetryPolicy};

/// Name of the project-local config file.
pub const LOCAL_CONFIG_FILE: &str = ".maas-mcp.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server/transport settings
    pub server: ServerConfig,

    /// MAAS backend settings
    pub maas: MaasConfig,

    /// Retry settings for upstream calls
    pub retry: RetrySettings,

    /// JSON-RPC protocol settings
    pub protocol: ProtocolConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Transport used to talk to MCP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Line-delimited JSON-RPC over stdin/stdout
    #[default]
    Stdio,
    /// JSON-RPC and MCP tool calls over HTTP (with optional SSE framing)
    Http,
}

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Active transport
    pub transport: TransportKind,

    /// Host to bind to when serving HTTP
    pub host: String,

    /// Port to bind to when serving HTTP
    pub port: u16,

    /// Server name advertised in discovery and handshake messages
    pub name: String,
}

/// Which backend implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The MAAS REST API
    #[default]
    Http,
    /// Seeded in-memory data, for demos and offline use
    Memory,
}

/// MAAS API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaasConfig {
    /// Backend implementation
    pub backend: BackendKind,

    /// Base URL of the MAAS server (e.g. `http://maas.local:5240/MAAS`)
    pub api_url: Option<String>,

    /// API key in `consumer:token:secret` form
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Retry settings for upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per upstream call (>= 1)
    pub attempts: u32,

    /// Fixed delay between attempts, in milliseconds
    pub delay_ms: u64,
}

/// Stdio readiness sentinel mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeMode {
    /// Plain-text line plus JSON-RPC notifications
    #[default]
    Full,
    /// One well-formed JSON-RPC notification
    Single,
    /// Nothing
    None,
}

/// JSON-RPC protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Reject envelopes whose `jsonrpc` member is missing or not "2.0"
    pub strict_jsonrpc: bool,

    /// Readiness sentinels written on stdio start
    pub handshake: HandshakeMode,

    /// Pause after each stdio write, in milliseconds (0 disables)
    pub settle_delay_ms: u64,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter when `RUST_LOG` is unset
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

/// Split a `consumer:token:secret` API key. The secret may itself contain `:`.
pub fn split_api_key(key: &str) -> Option<(&str, &str, &str)> {
    let mut parts = key.trim().splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(consumer), Some(token), Some(secret))
            if !consumer.is_empty() && !token.is_empty() && !secret.is_empty() =>
        {
            Some((consumer, token, secret))
        }
        _ => None,
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid retry settings: {0}")]
    Retry(#[from] InvalidRetryPolicy),

    #[error("server port must not be 0")]
    InvalidPort,

    #[error("maas.api_url is required for the http backend")]
    MissingApiUrl,

    #[error("maas.api_key is required for the http backend")]
    MissingApiKey,

    #[error("maas.api_key must have the form consumer:token:secret")]
    MalformedApiKey,

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            host: "127.0.0.1".to_string(),
            port: 8082,
            name: crate::APP_NAME.to_string(),
        }
    }
}

impl Default for MaasConfig {
    fn default() -> Self {
        Self { backend: BackendKind::Http, api_url: None, api_key: None, timeout_secs: 30 }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { attempts: 3, delay_ms: 500 }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self { strict_jsonrpc: false, handshake: HandshakeMode::Full, settle_delay_ms: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Resolution order: `explicit` path, `./.maas-mcp.toml`, the global
    /// config file, then defaults. A `.env` file is read first and
    /// environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        // Missing .env is not an error
        let _ = dotenvy::dotenv();

        let mut config = match Self::locate(explicit) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::load_from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            let raw = path.to_string_lossy();
            let expanded = shellexpand::full(&raw).map_or_else(|_| raw.to_string(), |p| p.into_owned());
            return Some(PathBuf::from(expanded));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        Self::global_config_path().filter(|path| path.exists())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `MAAS_*` environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = env_var("MAAS_API_URL") {
            self.maas.api_url = Some(url);
        }
        if let Some(key) = env_var("MAAS_API_KEY") {
            self.maas.api_key = Some(key);
        }
        if let Some(transport) = env_var("MAAS_MCP_TRANSPORT") {
            self.server.transport = match transport.to_ascii_lowercase().as_str() {
                "stdio" => TransportKind::Stdio,
                "http" => TransportKind::Http,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: "MAAS_MCP_TRANSPORT",
                        value: transport,
                    })
                }
            };
        }
        if let Some(host) = env_var("MAAS_MCP_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_var("MAAS_MCP_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "MAAS_MCP_PORT", value: port })?;
        }
        if let Some(level) = env_var("MAAS_MCP_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Check the settings needed to start serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry_policy()?;
        if self.server.transport == TransportKind::Http && self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.maas.backend == BackendKind::Http {
            if self.maas.api_url.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingApiUrl);
            }
            let key = self.maas.api_key.as_deref().ok_or(ConfigError::MissingApiKey)?;
            if split_api_key(key).is_none() {
                return Err(ConfigError::MalformedApiKey);
            }
        }
        Ok(())
    }

    /// Build the retry policy for upstream calls.
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        Ok(RetryPolicy::new(self.retry.attempts, Duration::from_millis(self.retry.delay_ms))?)
    }

    /// Path of the global config file.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::APP_NAME).join("config.toml"))
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
