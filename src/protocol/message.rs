//! Message type exchanged over the room topic
//!
//! A [`Message`] can only be built through [`Message::new`], which enforces the
//! field rules shared by the sending and receiving paths.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::codec::DELIMITER;

/// Names the three message fields for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Sender,
    Performative,
    Content,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Sender => "sender",
            Field::Performative => "performative",
            Field::Content => "content",
        };
        f.write_str(name)
    }
}

/// Field validation failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FieldError {
    #[error("{field} must not contain the delimiter ',': {value:?}")]
    ContainsDelimiter { field: Field, value: String },
    #[error("{field} must not be empty")]
    Empty { field: Field },
}

impl FieldError {
    /// The field that failed validation
    pub fn field(&self) -> Field {
        match self {
            FieldError::ContainsDelimiter { field, .. } => *field,
            FieldError::Empty { field } => *field,
        }
    }
}

/// A single room message: who sent it, the speech act, and the payload text
///
/// Fields are stored trimmed. None of them is empty and none contains
/// [`DELIMITER`].
///
/// # Examples
/// ```
/// use room_bridge::protocol::Message;
///
/// let message = Message::new("alice", "inform", "hello").unwrap();
/// assert_eq!(message.sender(), "alice");
///
/// assert!(Message::new("alice", "inform", "hello, world").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    sender: String,
    performative: String,
    content: String,
}

impl Message {
    /// Build a message, rejecting any field that is empty or contains the delimiter
    pub fn new(
        sender: impl AsRef<str>,
        performative: impl AsRef<str>,
        content: impl AsRef<str>,
    ) -> Result<Self, FieldError> {
        Ok(Self {
            sender: validate_field(Field::Sender, sender.as_ref())?,
            performative: validate_field(Field::Performative, performative.as_ref())?,
            content: validate_field(Field::Content, content.as_ref())?,
        })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn performative(&self) -> &str {
        &self.performative
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Borrow all three fields in wire order
    pub fn parts(&self) -> (&str, &str, &str) {
        (&self.sender, &self.performative, &self.content)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.sender, self.performative, self.content
        )
    }
}

fn validate_field(field: Field, value: &str) -> Result<String, FieldError> {
    if value.contains(DELIMITER) {
        return Err(FieldError::ContainsDelimiter {
            field,
            value: value.to_string(),
        });
    }

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Empty { field });
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_message() {
        let message = Message::new("alice", "inform", "hello").unwrap();
        assert_eq!(message.parts(), ("alice", "inform", "hello"));
    }

    #[test]
    fn test_fields_are_trimmed() {
        let message = Message::new("  bob ", "\trequest", "status\n").unwrap();
        assert_eq!(message.parts(), ("bob", "request", "status"));
    }

    #[test]
    fn test_delimiter_rejected_in_each_field() {
        let cases = [
            (("a,b", "inform", "x"), Field::Sender),
            (("a", "in,form", "x"), Field::Performative),
            (("a", "inform", "x,y"), Field::Content),
        ];

        for ((sender, performative, content), expected) in cases {
            let err = Message::new(sender, performative, content).unwrap_err();
            assert!(matches!(err, FieldError::ContainsDelimiter { .. }));
            assert_eq!(err.field(), expected);
        }
    }

    #[test]
    fn test_delimiter_reported_before_emptiness() {
        let err = Message::new(",", "inform", "x").unwrap_err();
        assert!(matches!(
            err,
            FieldError::ContainsDelimiter {
                field: Field::Sender,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert_eq!(
            Message::new("", "inform", "x").unwrap_err(),
            FieldError::Empty {
                field: Field::Sender
            }
        );
        assert_eq!(
            Message::new("alice", "   ", "x").unwrap_err(),
            FieldError::Empty {
                field: Field::Performative
            }
        );
        assert_eq!(
            Message::new("alice", "inform", "").unwrap_err(),
            FieldError::Empty {
                field: Field::Content
            }
        );
    }

    #[test]
    fn test_field_error_display() {
        let err = Message::new("alice", "inform", "a,b").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("content"));
        assert!(text.contains("delimiter"));
    }

    #[test]
    fn test_display() {
        let message = Message::new("bob", "request", "status").unwrap();
        assert_eq!(message.to_string(), "bob - request - status");
    }
}
