//! Transport layer for the room bridge
//!
//! This module provides the transport abstraction consumed by the bridge and
//! the MQTT implementation of it.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub mod mqtt;

/// Delivery guarantee negotiated with the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    /// QoS 0
    AtMostOnce,
    /// QoS 1
    AtLeastOnce,
    /// QoS 2
    #[default]
    ExactlyOnce,
}

impl TryFrom<u8> for QosLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(format!("QoS must be 0, 1 or 2, got {other}")),
        }
    }
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> Self {
        match qos {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

/// Asynchronous notifications emitted by a transport's delivery context
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A PUBLISH arrived on a subscribed topic
    Message { topic: String, payload: Vec<u8> },
    /// The connection dropped; emitted at most once per connection
    ConnectionLost { cause: String },
}

/// Sender half handed to a transport for its inbound events
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Transport trait for the bridge
///
/// This trait provides an abstraction over the broker client so the bridge
/// can be driven by an in-memory transport in tests.
///
/// Implementations deliver [`TransportEvent`]s in broker order from a single
/// delivery context and never retry a lost connection on their own.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect with a clean session, blocking until the broker acknowledges
    async fn connect(&mut self, identity: &str, endpoint: &str) -> Result<(), Self::Error>;

    /// Subscribe to a topic, blocking until the broker acknowledges
    async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), Self::Error>;

    /// Enqueue a publish; does not wait for the message's own QoS handshake
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QosLevel)
        -> Result<(), Self::Error>;

    /// Disconnect from the broker; no events fire after this returns
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Check if the transport currently holds a live connection
    fn is_connected(&self) -> bool;

    /// Set the channel that receives inbound messages and connection loss
    fn set_event_sender(&mut self, sender: EventSender);
}

/// Type alias for MQTT transport
pub type MqttTransport = mqtt::MqttClient;
