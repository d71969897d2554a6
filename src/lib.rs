//! room-bridge
//!
//! Connects a participant to a shared MQTT room topic. Messages are
//! `sender,performative,content` triples; every message seen on the topic
//! updates a message counter and last message exposed through an
//! [`ObservableSink`](bridge::ObservableSink).
//!
//! # Overview
//!
//! - [`protocol`]: the message type and its comma-delimited wire codec
//! - [`transport`]: the transport abstraction and its MQTT implementation
//! - [`bridge`]: connection lifecycle, inbound handling and reconnection
//! - [`config`]: TOML configuration
//!
//! # Quick Start
//!
//! ```rust
//! use room_bridge::protocol::{Message, MessageCodec};
//!
//! let message = Message::new("alice", "inform", "hello").unwrap();
//! let payload = MessageCodec::encode(&message);
//! assert_eq!(payload, b"alice,inform,hello");
//!
//! let decoded = MessageCodec::decode(&payload).unwrap();
//! assert_eq!(decoded, message);
//!
//! // Fields may not contain the delimiter
//! assert!(Message::new("al,ice", "inform", "hello").is_err());
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use bridge::{Bridge, ConnectionState, ObservableSink, Perception, PropertyStore};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use protocol::*;
pub use transport::mqtt::MqttClient;
