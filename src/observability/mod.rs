//! Observability for the room bridge
//!
//! Structured logging setup and process-wide metrics.

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{bridge_span, mqtt_span};
