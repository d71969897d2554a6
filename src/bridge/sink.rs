//! Observable state sinks
//!
//! A sink is the collaborator that exposes bridge-derived state to its host.
//! The bridge calls it from the delivery task after every decoded inbound
//! message, and on connection state changes.

use super::state::{ConnectionState, Perception};
use crate::protocol::Message;
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info};

/// Receiver of the bridge's observable state
pub trait ObservableSink: Send + Sync {
    fn set_message_count(&self, count: u64);

    fn set_last_message(&self, message: &Message);

    /// Called once per decoded inbound message with the new pair
    ///
    /// The default forwards to the two setters, last message first, so a
    /// host reading the count never sees it ahead of its message.
    fn perception_updated(&self, perception: &Perception) {
        if let Some(message) = &perception.last_message {
            self.set_last_message(message);
        }
        self.set_message_count(perception.messages_count);
    }

    fn connection_state_changed(&self, _state: &ConnectionState) {}

    /// The reconnection policy gave up after `attempts` attempts
    fn reconnect_exhausted(&self, _attempts: u32, _reason: &str) {}
}

/// In-memory sink for hosts that poll
#[derive(Debug, Default)]
pub struct PropertyStore {
    inner: Mutex<PropertyStoreState>,
}

#[derive(Debug, Clone, Default)]
struct PropertyStoreState {
    perception: Perception,
    connection_state: Option<ConnectionState>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PropertyStoreState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Consistent copy of the count and last message
    pub fn snapshot(&self) -> Perception {
        self.lock().perception.clone()
    }

    pub fn messages_count(&self) -> u64 {
        self.lock().perception.messages_count
    }

    pub fn last_message(&self) -> Option<Message> {
        self.lock().perception.last_message.clone()
    }

    /// Last connection state reported by the bridge, if any
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.lock().connection_state
    }
}

impl ObservableSink for PropertyStore {
    fn set_message_count(&self, count: u64) {
        self.lock().perception.messages_count = count;
    }

    fn set_last_message(&self, message: &Message) {
        self.lock().perception.last_message = Some(message.clone());
    }

    fn perception_updated(&self, perception: &Perception) {
        self.lock().perception = perception.clone();
    }

    fn connection_state_changed(&self, state: &ConnectionState) {
        self.lock().connection_state = Some(*state);
    }
}

/// Sink that reports every update as a tracing event
#[derive(Debug, Clone)]
pub struct LogSink {
    identity: String,
}

impl LogSink {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

impl ObservableSink for LogSink {
    fn set_message_count(&self, count: u64) {
        info!(identity = %self.identity, messages_count = count, "Perceived message count");
    }

    fn set_last_message(&self, message: &Message) {
        info!(
            identity = %self.identity,
            sender = message.sender(),
            performative = message.performative(),
            content = message.content(),
            "Perceived last message"
        );
    }

    fn connection_state_changed(&self, state: &ConnectionState) {
        info!(identity = %self.identity, state = %state, "Connection state changed");
    }

    fn reconnect_exhausted(&self, attempts: u32, reason: &str) {
        error!(
            identity = %self.identity,
            attempts,
            reason,
            "Reconnection exhausted, bridge is disconnected"
        );
    }
}
