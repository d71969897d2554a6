//! Pure connection state management for MQTT client
//!
//! This module contains pure functions for link state tracking,
//! endpoint parsing and option construction.

use crate::config::MqttSection;
use crate::transport::QosLevel;
use rumqttc::v5::{mqttbytes::QoS, MqttOptions};
use rumqttc::Transport as RumqttcTransport;
use thiserror::Error;
use url::Url;

/// State of the transport's own broker link
///
/// This is transport-internal bookkeeping; the bridge keeps its own
/// connection state and learns about changes through transport events.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkState {
    /// Waiting for ConnAck
    Connecting,
    /// ConnAck received, ready for operations
    Up,
    /// Client-initiated disconnect in progress
    Closing,
    /// Link is gone, with reason
    Down(String),
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: LinkState },
}

/// Broker address extracted from an endpoint URI
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// Parse `tcp://`, `mqtt://`, `ssl://` or `mqtts://` endpoints (pure function)
pub fn parse_endpoint(endpoint: &str) -> Result<BrokerAddress, MqttError> {
    let url = Url::parse(endpoint).map_err(|_| MqttError::InvalidBrokerUrl(endpoint.to_string()))?;

    let tls = match url.scheme() {
        "tcp" | "mqtt" => false,
        "ssl" | "mqtts" => true,
        _ => return Err(MqttError::InvalidBrokerUrl(endpoint.to_string())),
    };

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| MqttError::InvalidBrokerUrl(endpoint.to_string()))?;
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    Ok(BrokerAddress {
        host: host.to_string(),
        port,
        tls,
    })
}

/// Build clean-session MQTT options for one connection attempt (pure function)
///
/// The identity is used verbatim as the client id; the broker evicts an older
/// session holding the same id.
pub fn configure_mqtt_options(
    identity: &str,
    endpoint: &str,
    config: &MqttSection,
) -> Result<MqttOptions, MqttError> {
    let address = parse_endpoint(endpoint)?;
    let mut mqtt_options = MqttOptions::new(identity, address.host, address.port);

    if address.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some((username, password)) = config.credentials() {
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_clean_start(true);
    mqtt_options.set_keep_alive(config.keep_alive());

    Ok(mqtt_options)
}

/// Map the bridge QoS level onto rumqttc's (pure function)
pub fn to_mqtt_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_endpoint() {
        let address = parse_endpoint("tcp://test.mosquitto.org:1883").unwrap();
        assert_eq!(
            address,
            BrokerAddress {
                host: "test.mosquitto.org".to_string(),
                port: 1883,
                tls: false,
            }
        );
    }

    #[test]
    fn test_parse_default_ports() {
        assert_eq!(parse_endpoint("mqtt://localhost").unwrap().port, 1883);

        let tls = parse_endpoint("mqtts://broker.example.com").unwrap();
        assert_eq!(tls.port, 8883);
        assert!(tls.tls);

        assert!(parse_endpoint("ssl://broker.example.com:8884").unwrap().tls);
    }

    #[test]
    fn test_invalid_endpoints() {
        for endpoint in ["invalid-url", "http://localhost:1883", "tcp://", ""] {
            assert!(
                matches!(
                    parse_endpoint(endpoint),
                    Err(MqttError::InvalidBrokerUrl(_))
                ),
                "expected {endpoint:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_configure_mqtt_options() {
        let config = MqttSection::default();
        let options = configure_mqtt_options("agent-alice", "mqtt://localhost:1883", &config);
        assert!(options.is_ok());

        let options = options.unwrap();
        assert_eq!(options.client_id(), "agent-alice");
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
    }

    #[test]
    fn test_configure_mqtt_options_invalid_url() {
        let config = MqttSection::default();
        let result = configure_mqtt_options("agent-alice", "not a url", &config);
        assert!(matches!(result, Err(MqttError::InvalidBrokerUrl(_))));
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(to_mqtt_qos(QosLevel::AtMostOnce), QoS::AtMostOnce);
        assert_eq!(to_mqtt_qos(QosLevel::AtLeastOnce), QoS::AtLeastOnce);
        assert_eq!(to_mqtt_qos(QosLevel::ExactlyOnce), QoS::ExactlyOnce);
    }

    #[test]
    fn test_mqtt_error_display() {
        let errors = vec![
            MqttError::ConnectionFailed("refused".to_string()),
            MqttError::PublishFailed("test".to_string().into()),
            MqttError::SubscriptionFailed("test".to_string()),
            MqttError::InvalidBrokerUrl("test".to_string()),
            MqttError::NotConnected {
                state: LinkState::Down("test".to_string()),
            },
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
