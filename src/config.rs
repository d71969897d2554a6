//! Configuration system for the room bridge
//!
//! Loads a TOML file with `[bridge]`, `[mqtt]` and `[reconnect]` sections.
//! Everything except the client identity has a default.

use crate::bridge::ReconnectConfig;
use crate::protocol::{validate_identity, validate_topic};
use crate::transport::QosLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default broker used when the `[mqtt]` section omits `broker_url`
pub const DEFAULT_BROKER_URL: &str = "tcp://test.mosquitto.org:1883";
/// Default shared room topic
pub const DEFAULT_TOPIC: &str = "room/communication";

/// Main bridge configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub bridge: BridgeSection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Bridge section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSection {
    /// MQTT client identity (must match [a-zA-Z0-9._-]+ and be unique on the broker)
    pub identity: String,
}

/// MQTT section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL: tcp://, mqtt://, ssl:// or mqtts://
    #[serde(default = "default_broker_url")]
    pub broker_url: String,
    /// Shared room topic for both publishing and subscribing
    #[serde(default = "default_topic")]
    pub topic: String,
    /// QoS level 0, 1 or 2
    #[serde(default)]
    pub qos: QosLevel,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Keep alive interval in seconds (default: 60)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// How long connect and subscribe wait for the broker handshake (default: 10)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            topic: default_topic(),
            qos: QosLevel::default(),
            username_env: None,
            password_env: None,
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl MqttSection {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Resolve broker credentials from the configured environment variables
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = self
            .username_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())?;
        let password = self
            .password_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .unwrap_or_default();
        Some((username, password))
    }
}

fn default_broker_url() -> String {
    DEFAULT_BROKER_URL.to_string()
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid client identity: {0}")]
    InvalidIdentity(String),
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check identity, topic and reconnect policy consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identity(&self.bridge.identity)
            .map_err(|e| ConfigError::InvalidIdentity(e.to_string()))?;
        validate_topic(&self.mqtt.topic).map_err(|e| ConfigError::InvalidTopic(e.to_string()))?;

        if self.mqtt.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.reconnect
            .validate()
            .map_err(ConfigError::InvalidConfig)?;

        Ok(())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[bridge]
identity = "test-bridge"

[mqtt]
broker_url = "mqtt://localhost:1883"
topic = "room/test"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}
