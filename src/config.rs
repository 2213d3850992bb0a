//! Configuration management for RAX Chat Server
//!
//! Loads the listening address, upgrade path and control-message text from
//! an optional `config.toml` with `RAX_CHAT_*` environment overrides.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "RAX_CHAT_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config";

/// Complete server configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address or host to bind the listener to
    /// Environment: RAX_CHAT_BIND_ADDRESS
    pub bind_address: String,

    /// TCP port for the listener, `0` picks an ephemeral port
    /// Environment: RAX_CHAT_PORT
    pub port: u16,

    /// Request path accepted for the WebSocket upgrade
    pub ws_path: String,

    /// Text sent to both clients once they are paired
    pub connected_notice: String,

    /// Text sent to the remaining client when its partner leaves
    pub partner_disconnected_notice: String,

    /// Upper bound, in milliseconds, on a disconnect notice or close frame
    /// write to a client that has stopped reading
    pub write_timeout_ms: u64,

    /// Default log filter, overridden by RUST_LOG
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            ws_path: "/ws".to_string(),
            connected_notice: "connected".to_string(),
            partner_disconnected_notice: "Partner disconnected".to_string(),
            write_timeout_ms: 5000,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `config.toml` (or `$RAX_CHAT_CONFIG`) with environment overrides.
    ///
    /// A missing file is not an error, defaults apply.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(&path)
    }

    /// Load configuration from the given file path (extension optional).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        let path = path.as_ref().to_string_lossy().into_owned();

        let settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("RAX_CHAT"))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if !self.ws_path.starts_with('/') {
            return Err(config::ConfigError::Message(format!(
                "ws_path must start with '/': {}",
                self.ws_path
            )));
        }

        if self.connected_notice.is_empty() || self.partner_disconnected_notice.is_empty() {
            return Err(config::ConfigError::Message(
                "control notices cannot be empty".into(),
            ));
        }

        if self.write_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "write_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Get bind address and port as a socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
