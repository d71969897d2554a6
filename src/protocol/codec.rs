//! Payload codec for room messages
//!
//! Wire format: `sender,performative,content` as UTF-8 with no trailing
//! delimiter. Commas inside a field are not escaped, so the codec rejects
//! them on the way out and treats extra delimiters as malformed on the way in.

use super::message::{FieldError, Message};
use thiserror::Error;

/// Field separator on the wire
pub const DELIMITER: char = ',';

const FIELD_COUNT: usize = 3;

/// Inbound payload decoding failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    #[error("Malformed message: payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("Malformed message: expected 3 fields (sender,performative,content), found {found}")]
    FieldCount { found: usize },
    #[error("Malformed message: {0}")]
    InvalidField(#[from] FieldError),
}

/// Pure encode/decode functions for the wire format
pub struct MessageCodec;

impl MessageCodec {
    /// Encode a message into its payload bytes (pure function)
    pub fn encode(message: &Message) -> Vec<u8> {
        let (sender, performative, content) = message.parts();
        format!("{sender}{DELIMITER}{performative}{DELIMITER}{content}").into_bytes()
    }

    /// Decode payload bytes into a message (pure function)
    pub fn decode(payload: &[u8]) -> Result<Message, CodecError> {
        let text = std::str::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)?;

        let parts: Vec<&str> = text.split(DELIMITER).collect();
        if parts.len() != FIELD_COUNT {
            return Err(CodecError::FieldCount { found: parts.len() });
        }

        Ok(Message::new(parts[0], parts[1], parts[2])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::Field;

    #[test]
    fn test_encode_wire_format() {
        let message = Message::new("alice", "inform", "hello").unwrap();
        assert_eq!(MessageCodec::encode(&message), b"alice,inform,hello");
    }

    #[test]
    fn test_decode_valid_payload() {
        let message = MessageCodec::decode(b"bob,request,status").unwrap();
        assert_eq!(message.parts(), ("bob", "request", "status"));
    }

    #[test]
    fn test_decode_trims_fields() {
        let message = MessageCodec::decode(b" bob , request ,  status ").unwrap();
        assert_eq!(message.parts(), ("bob", "request", "status"));
    }

    #[test]
    fn test_decode_missing_field() {
        assert_eq!(
            MessageCodec::decode(b"bob,request"),
            Err(CodecError::FieldCount { found: 2 })
        );
    }

    #[test]
    fn test_decode_extra_delimiter() {
        assert_eq!(
            MessageCodec::decode(b"bob,request,status,extra"),
            Err(CodecError::FieldCount { found: 4 })
        );
    }

    #[test]
    fn test_decode_no_delimiter() {
        assert_eq!(
            MessageCodec::decode(b"hello"),
            Err(CodecError::FieldCount { found: 1 })
        );
        assert_eq!(
            MessageCodec::decode(b""),
            Err(CodecError::FieldCount { found: 1 })
        );
    }

    #[test]
    fn test_decode_empty_field() {
        let err = MessageCodec::decode(b"bob,,status").unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidField(FieldError::Empty {
                field: Field::Performative
            })
        );

        // Trailing delimiter leaves an empty content field
        assert!(MessageCodec::decode(b"bob,request,").is_err());
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert_eq!(
            MessageCodec::decode(&[0x62, 0xff, 0x2c, 0x61, 0x2c, 0x63]),
            Err(CodecError::InvalidUtf8)
        );
    }

    #[test]
    fn test_decode_unicode_content() {
        let message = MessageCodec::decode("zoë,inform,héllo wörld".as_bytes()).unwrap();
        assert_eq!(message.sender(), "zoë");
        assert_eq!(message.content(), "héllo wörld");
    }

    #[test]
    fn test_codec_error_display_mentions_malformed() {
        let err = MessageCodec::decode(b"a,b").unwrap_err();
        assert!(err.to_string().starts_with("Malformed message"));
    }
}
