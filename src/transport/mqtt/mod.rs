//! MQTT transport for the room bridge
//!
//! This module provides a focused, decomposed MQTT client implementation that
//! separates pure functions from I/O operations for better testability.
//!
//! # Architecture
//!
//! - [`connection`] - Pure endpoint parsing, option construction and link state
//! - [`message_handler`] - Pure routing of rumqttc events
//! - [`client`] - Impure I/O operations and the per-connection event loop task
//!
//! # Usage
//!
//! ```rust,no_run
//! use room_bridge::config::MqttSection;
//! use room_bridge::transport::mqtt::MqttClient;
//! use room_bridge::transport::QosLevel;
//!
//! # tokio_test::block_on(async {
//! let mut client = MqttClient::new(MqttSection::default());
//! client.connect("agent-alice", "tcp://localhost:1883").await?;
//! client.subscribe("room/communication", QosLevel::ExactlyOnce).await?;
//! client
//!     .publish("room/communication", b"alice,inform,hello".to_vec(), QosLevel::ExactlyOnce)
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

// Re-export public types for convenience
pub use client::MqttClient;
pub use connection::{
    configure_mqtt_options, parse_endpoint, BrokerAddress, LinkState, MqttError,
};
pub use message_handler::{EventRoute, MessageHandler};
