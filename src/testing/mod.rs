//! Testing utilities and mock implementations
//!
//! This module provides an in-memory transport and a recording sink for
//! exercising the bridge without an MQTT broker.

pub mod mocks;

pub use mocks::*;
