//! Client configuration
//!
//! Loads the client identity, connect parameters and broker endpoint from TOML.
//! Credentials are named by environment variable and resolved at runtime, never
//! stored in the file.

use crate::transport::mqtt::ConnectRequest;
use crate::transport::{ProtocolVersion, TlsOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Main client configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    pub broker: BrokerSection,
}

/// Client identity and CONNECT parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// Client identifier; generated when absent
    pub id: Option<String>,
    /// Keep-alive interval in seconds (default: 60)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u16,
    /// Start a clean session (default: true)
    #[serde(default = "default_clean_start")]
    pub clean_start: bool,
    /// MQTT protocol level: 3, 4 or 5 (default: 4)
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u8,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            id: None,
            keep_alive_secs: default_keep_alive(),
            clean_start: default_clean_start(),
            protocol_version: default_protocol_version(),
            username_env: None,
            password_env: None,
        }
    }
}

fn default_keep_alive() -> u16 {
    60
}

fn default_clean_start() -> bool {
    true
}

fn default_protocol_version() -> u8 {
    4
}

/// Broker endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// `host[:port]` or `[ipv6][:port]`
    pub address: String,
    /// Presence of this table turns TLS on
    pub tls: Option<TlsSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TlsSection {
    #[serde(default = "default_verify")]
    pub verify: bool,
    pub ca_file: Option<String>,
    pub server_name: Option<String>,
}

fn default_verify() -> bool {
    true
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid client ID format: {0}")]
    InvalidClientId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: ClientConfig = toml::from_str(content)?;
        config.validate()?;

        if config.client.id.is_none() {
            config.client.id = Some(generate_client_id());
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(id) = &self.client.id {
            validate_client_id(id)?;
        }
        if ProtocolVersion::from_level(self.client.protocol_version).is_none() {
            return Err(ConfigError::InvalidConfig(format!(
                "protocol_version must be 3, 4 or 5, got {}",
                self.client.protocol_version
            )));
        }
        if self.broker.address.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "broker.address must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Client identifier, generated at load time when the file omits it
    pub fn client_id(&self) -> &str {
        self.client.id.as_deref().unwrap_or_default()
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::from_level(self.client.protocol_version).unwrap_or_default()
    }

    pub fn use_tls(&self) -> bool {
        self.broker.tls.is_some()
    }

    pub fn tls_options(&self) -> Option<TlsOptions> {
        self.broker.tls.as_ref().map(|tls| TlsOptions {
            verify: tls.verify,
            ca_file: tls.ca_file.clone(),
            server_name: tls.server_name.clone(),
        })
    }

    /// Connect request for the configured broker, without properties
    pub fn connect_request(&self) -> ConnectRequest<'_> {
        ConnectRequest::new(&self.broker.address)
            .with_tls(self.use_tls())
            .with_version(self.protocol_version())
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Get MQTT username from environment variable
    pub fn get_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.client.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.client.password_env.as_ref())
    }
}

fn generate_client_id() -> String {
    format!("mqttlink-{}", Uuid::new_v4().simple())
}

/// Client IDs are limited to `[a-zA-Z0-9._-]` and the 65535-byte UTF-8 string
/// limit of the wire format
fn validate_client_id(client_id: &str) -> Result<(), ConfigError> {
    let valid_chars = client_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if client_id.is_empty() || client_id.len() > u16::MAX as usize || !valid_chars {
        return Err(ConfigError::InvalidClientId(format!(
            "Client ID '{client_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
