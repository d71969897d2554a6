//! Bridge between the shared room topic and an observable state sink
//!
//! The bridge owns a [`Transport`](crate::transport::Transport), encodes
//! outgoing messages, decodes incoming ones into a message counter and last
//! message, and reconnects with bounded backoff when the connection drops.
//!
//! # Example
//!
//! ```no_run
//! use room_bridge::bridge::{Bridge, PropertyStore, ReconnectConfig};
//! use room_bridge::config::MqttSection;
//! use room_bridge::transport::{MqttTransport, QosLevel};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(PropertyStore::new());
//! let bridge = Bridge::new(
//!     MqttTransport::new(MqttSection::default()),
//!     store.clone(),
//!     ReconnectConfig::default(),
//! );
//!
//! bridge
//!     .start("agent-alice", "tcp://localhost:1883", "room/communication", QosLevel::ExactlyOnce)
//!     .await?;
//! bridge.send("alice", "inform", "hello").await?;
//!
//! println!("seen {} messages", store.messages_count());
//! bridge.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod engine;
pub mod reconnect;
pub mod sink;
pub mod state;

pub use engine::{Bridge, BridgeSettings};
pub use reconnect::{ReconnectConfig, ReconnectPolicy, ReconnectionDecision};
pub use sink::{LogSink, ObservableSink, PropertyStore};
pub use state::{ConnectionState, Perception};
