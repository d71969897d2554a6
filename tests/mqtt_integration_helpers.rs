//! MQTT Integration Test Helpers
//!
//! Provides helper utilities for integration tests with MQTT broker.
//! Tests using these helpers are `#[ignore]`d and expect a broker at
//! localhost:1883 (`mosquitto -p 1883`).

use room_bridge::config::MqttSection;
use uuid::Uuid;

/// MQTT broker URL for live tests
pub const MQTT_BROKER_URL: &str = "mqtt://localhost:1883";

/// Endpoint nothing listens on
#[allow(dead_code)]
pub const UNREACHABLE_BROKER_URL: &str = "mqtt://localhost:9999";

/// Create MQTT config pointing to localhost broker
#[allow(dead_code)]
pub fn mqtt_config() -> MqttSection {
    MqttSection {
        broker_url: MQTT_BROKER_URL.to_string(),
        topic: unique_topic(),
        connect_timeout_secs: 3,
        ..Default::default()
    }
}

/// Topic private to one test run so parallel runs do not see each other
pub fn unique_topic() -> String {
    format!("room-bridge-test/{}", Uuid::new_v4().simple())
}

/// Client identity private to one test run
#[allow(dead_code)]
pub fn unique_identity(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqtt_config_uses_localhost() {
        let config = mqtt_config();
        assert_eq!(config.broker_url, "mqtt://localhost:1883");
        assert!(config.topic.starts_with("room-bridge-test/"));
    }
}
