//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.

use room_bridge::bridge::ReconnectConfig;
use room_bridge::config::{BridgeConfig, ConfigError, DEFAULT_BROKER_URL, DEFAULT_TOPIC};
use room_bridge::transport::QosLevel;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[bridge]
identity = "agent-alice"

[mqtt]
broker_url = "tcp://test.mosquitto.org:1883"
topic = "room/communication"
qos = 2
keep_alive_secs = 60
connect_timeout_secs = 10

[reconnect]
max_attempts = 5
initial_delay_ms = 250
max_delay_ms = 8000
multiplier = 2.0
"#,
    );

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.bridge.identity, "agent-alice");
    assert_eq!(config.mqtt.broker_url, "tcp://test.mosquitto.org:1883");
    assert_eq!(config.mqtt.topic, "room/communication");
    assert_eq!(config.mqtt.qos, QosLevel::ExactlyOnce);
    assert_eq!(config.reconnect, ReconnectConfig::default());
}

#[test]
fn test_config_defaults_with_identity_only() {
    let temp_file = write_config("[bridge]\nidentity = \"agent-bob\"");

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.mqtt.broker_url, DEFAULT_BROKER_URL);
    assert_eq!(config.mqtt.topic, DEFAULT_TOPIC);
    assert_eq!(config.mqtt.qos, QosLevel::ExactlyOnce);
    assert!(config.mqtt.username_env.is_none());
}

#[test]
fn test_partial_reconnect_section_keeps_other_defaults() {
    let temp_file = write_config(
        r#"
[bridge]
identity = "agent-carol"

[reconnect]
max_attempts = 1
initial_delay_ms = 0
"#,
    );

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();
    assert_eq!(config.reconnect.max_attempts, 1);
    assert_eq!(config.reconnect.initial_delay_ms, 0);
    assert_eq!(config.reconnect.max_delay_ms, 8000);
    assert_eq!(config.reconnect.multiplier, 2.0);
}

#[test]
fn test_missing_file_is_read_error() {
    let result = BridgeConfig::load_from_file(Path::new("/nonexistent/bridge.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_missing_identity_is_parse_error() {
    let temp_file = write_config("[mqtt]\ntopic = \"room/communication\"");
    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let temp_file = write_config("[bridge\nidentity = ");
    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        ("[bridge]\nidentity = \"\"", "empty identity"),
        ("[bridge]\nidentity = \"alice/room\"", "slash in identity"),
        (
            "[bridge]\nidentity = \"alice\"\n[mqtt]\ntopic = \"room/+\"",
            "wildcard topic",
        ),
        (
            "[bridge]\nidentity = \"alice\"\n[mqtt]\ntopic = \"\"",
            "empty topic",
        ),
        (
            "[bridge]\nidentity = \"alice\"\n[reconnect]\nmultiplier = 0.5",
            "shrinking backoff",
        ),
        (
            "[bridge]\nidentity = \"alice\"\n[reconnect]\ninitial_delay_ms = 9000\nmax_delay_ms = 10",
            "inverted delays",
        ),
    ];

    for (content, label) in cases {
        let temp_file = write_config(content);
        assert!(
            BridgeConfig::load_from_file(temp_file.path()).is_err(),
            "expected {label} to be rejected"
        );
    }
}

#[test]
fn test_sample_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/bridge.toml");
    let config = BridgeConfig::load_from_file(&path).unwrap();
    assert_eq!(config.mqtt.topic, DEFAULT_TOPIC);
}
