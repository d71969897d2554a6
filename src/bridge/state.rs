//! Connection state and perceived room state owned by the bridge

use crate::protocol::Message;
use std::fmt;

/// Bridge connection lifecycle
///
/// `Disconnected -> Connecting -> Connected -> Reconnecting(n) -> Connected | Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Reconnection attempt `n` (1-based) is in progress
    Reconnecting(u32),
}

impl ConnectionState {
    /// Check if connection state allows publishing (pure function)
    pub fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting(attempt) => write!(f, "reconnecting (attempt {attempt})"),
        }
    }
}

/// Counter and last message derived from inbound traffic
///
/// Both values change together; readers always see a matching pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Perception {
    pub messages_count: u64,
    pub last_message: Option<Message>,
}

impl Perception {
    /// Apply one decoded inbound message, returning the new count
    pub fn record(&mut self, message: Message) -> u64 {
        self.messages_count += 1;
        self.last_message = Some(message);
        self.messages_count
    }
}
