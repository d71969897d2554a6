//! Client identity and room topic validation
//!
//! Identities become MQTT client ids and topics are used verbatim for both
//! publishing and subscribing, so wildcards are not allowed.

use thiserror::Error;

pub fn validate_identity(identity: &str) -> Result<(), ValidationError> {
    if identity.is_empty() {
        return Err(ValidationError::EmptyIdentity);
    }

    for ch in identity.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '.' && ch != '_' && ch != '-' {
            return Err(ValidationError::InvalidIdentityChar(ch));
        }
    }

    Ok(())
}

pub fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }

    if let Some(ch) = topic.chars().find(|c| matches!(c, '+' | '#' | '\0')) {
        return Err(ValidationError::InvalidTopicChar(ch));
    }

    Ok(())
}

/// Validation errors for identities and topics
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Client identity cannot be empty")]
    EmptyIdentity,
    #[error("Client identity contains invalid character: '{0}'")]
    InvalidIdentityChar(char),
    #[error("Topic cannot be empty")]
    EmptyTopic,
    #[error("Topic contains a wildcard or reserved character: {0:?}")]
    InvalidTopicChar(char),
}
