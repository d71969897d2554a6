//! Wire protocol for the shared room topic
//!
//! Messages are flat `sender,performative,content` triples carried as UTF-8
//! payloads. This module owns the message type, its field validation, and the
//! codec that maps it to and from transport bytes.

pub mod codec;
pub mod message;
pub mod topics;

pub use codec::{CodecError, MessageCodec, DELIMITER};
pub use message::{Field, FieldError, Message};
pub use topics::{validate_identity, validate_topic, ValidationError};
