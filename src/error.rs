//! Error types for bridge operations
//!
//! Transport errors are boxed so the bridge stays generic over its transport.

use crate::bridge::ConnectionState;
use crate::protocol::{FieldError, ValidationError};
use thiserror::Error;

/// Boxed transport error carried as a source
pub type TransportFailure = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid message field: {0}")]
    InvalidField(#[from] FieldError),

    #[error("Invalid bridge settings: {0}")]
    InvalidSettings(#[from] ValidationError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] TransportFailure),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(#[source] TransportFailure),

    #[error("Publishing failed: {0}")]
    PublishFailed(#[source] TransportFailure),

    #[error("Not connected - current state: {state}")]
    NotConnected { state: ConnectionState },

    #[error("Bridge already started - current state: {state}")]
    AlreadyStarted { state: ConnectionState },

    #[error("Bridge was never started")]
    NotStarted,

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Reconnection gave up after {attempts} attempts: {reason}")]
    ReconnectExhausted { attempts: u32, reason: String },
}

impl BridgeError {
    /// Whether the reconnection policy can recover from this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::ConnectionFailed(_)
                | BridgeError::SubscriptionFailed(_)
                | BridgeError::NotConnected { .. }
        )
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
