//! Thread-safe metrics collection system
//!
//! Provides atomic counters for the bridge's traffic and connection
//! statistics, plus a serializable snapshot.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Thread-safe metrics collector using atomics
pub struct MetricsCollector {
    // Outbound traffic
    messages_published: AtomicU64,
    publish_failures: AtomicU64,
    invalid_fields: AtomicU64,

    // Inbound traffic
    messages_received: AtomicU64,
    malformed_messages: AtomicU64,
    last_message_at: AtomicU64,

    // Connection
    connected: AtomicBool,
    connection_attempts: AtomicU64,
    connections_established: AtomicU64,
    connection_failures: AtomicU64,
    connections_lost: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnect_exhaustions: AtomicU64,
    connection_start_time: AtomicU64,

    // Lifecycle
    bridge_state: Mutex<String>,
    uptime_start: AtomicU64,
    state_transitions: AtomicU64,
}

impl MetricsCollector {
    /// Initialize traffic metrics (pure function)
    fn init_traffic_metrics() -> (
        AtomicU64,
        AtomicU64,
        AtomicU64,
        AtomicU64,
        AtomicU64,
        AtomicU64,
    ) {
        (
            AtomicU64::new(0), // messages_published
            AtomicU64::new(0), // publish_failures
            AtomicU64::new(0), // invalid_fields
            AtomicU64::new(0), // messages_received
            AtomicU64::new(0), // malformed_messages
            AtomicU64::new(0), // last_message_at
        )
    }

    /// Initialize connection metrics (pure function)
    fn init_connection_metrics() -> (
        AtomicBool,
        AtomicU64,
        AtomicU64,
        AtomicU64,
        AtomicU64,
        AtomicU64,
        AtomicU64,
        AtomicU64,
    ) {
        (
            AtomicBool::new(false), // connected
            AtomicU64::new(0),      // connection_attempts
            AtomicU64::new(0),      // connections_established
            AtomicU64::new(0),      // connection_failures
            AtomicU64::new(0),      // connections_lost
            AtomicU64::new(0),      // reconnect_attempts
            AtomicU64::new(0),      // reconnect_exhaustions
            AtomicU64::new(0),      // connection_start_time
        )
    }

    pub fn new() -> Self {
        let now = current_timestamp();

        let (
            messages_published,
            publish_failures,
            invalid_fields,
            messages_received,
            malformed_messages,
            last_message_at,
        ) = Self::init_traffic_metrics();
        let (
            connected,
            connection_attempts,
            connections_established,
            connection_failures,
            connections_lost,
            reconnect_attempts,
            reconnect_exhaustions,
            connection_start_time,
        ) = Self::init_connection_metrics();

        Self {
            messages_published,
            publish_failures,
            invalid_fields,
            messages_received,
            malformed_messages,
            last_message_at,
            connected,
            connection_attempts,
            connections_established,
            connection_failures,
            connections_lost,
            reconnect_attempts,
            reconnect_exhaustions,
            connection_start_time,
            bridge_state: Mutex::new("disconnected".to_string()),
            uptime_start: AtomicU64::new(now),
            state_transitions: AtomicU64::new(0),
        }
    }

    // Outbound traffic
    pub fn message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalid_field_rejected(&self) {
        self.invalid_fields.fetch_add(1, Ordering::Relaxed);
    }

    // Inbound traffic
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.last_message_at
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn malformed_message(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    // Connection
    pub fn connection_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.connected.store(true, Ordering::Relaxed);
        self.connection_start_time
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
    }

    pub fn connection_lost(&self) {
        self.connections_lost.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connected.store(false, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
    }

    pub fn reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconnect_exhausted(&self) {
        self.reconnect_exhaustions.fetch_add(1, Ordering::Relaxed);
    }

    // Lifecycle
    pub fn bridge_state_changed(&self, new_state: &str) {
        if let Ok(mut state) = self.bridge_state.lock() {
            *state = new_state.to_string();
        }
        self.state_transitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.messages_published,
            &self.publish_failures,
            &self.invalid_fields,
            &self.messages_received,
            &self.malformed_messages,
            &self.last_message_at,
            &self.connection_attempts,
            &self.connections_established,
            &self.connection_failures,
            &self.connections_lost,
            &self.reconnect_attempts,
            &self.reconnect_exhaustions,
            &self.connection_start_time,
            &self.state_transitions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.connected.store(false, Ordering::Relaxed);

        if let Ok(mut state) = self.bridge_state.lock() {
            *state = "disconnected".to_string();
        }
        self.uptime_start
            .store(current_timestamp(), Ordering::Relaxed);
    }

    /// Calculate connection duration (pure function)
    fn calculate_connection_duration(&self, now: u64) -> u64 {
        if self.connected.load(Ordering::Relaxed) {
            let start_time = self.connection_start_time.load(Ordering::Relaxed);
            if start_time > 0 {
                now.saturating_sub(start_time)
            } else {
                0
            }
        } else {
            0
        }
    }

    fn get_current_bridge_state(&self) -> String {
        self.bridge_state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();

        MetricsSnapshot {
            traffic: TrafficMetrics {
                messages_published: self.messages_published.load(Ordering::Relaxed),
                publish_failures: self.publish_failures.load(Ordering::Relaxed),
                invalid_fields: self.invalid_fields.load(Ordering::Relaxed),
                messages_received: self.messages_received.load(Ordering::Relaxed),
                malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
                last_message_at: self.last_message_at.load(Ordering::Relaxed),
            },
            connection: ConnectionMetrics {
                connected: self.connected.load(Ordering::Relaxed),
                connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
                connections_established: self.connections_established.load(Ordering::Relaxed),
                connection_failures: self.connection_failures.load(Ordering::Relaxed),
                connections_lost: self.connections_lost.load(Ordering::Relaxed),
                reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
                reconnect_exhaustions: self.reconnect_exhaustions.load(Ordering::Relaxed),
                connection_duration_seconds: self.calculate_connection_duration(now),
            },
            lifecycle: LifecycleMetrics {
                current_state: self.get_current_bridge_state(),
                uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
                state_transitions: self.state_transitions.load(Ordering::Relaxed),
            },
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Public metrics structures
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub traffic: TrafficMetrics,
    pub connection: ConnectionMetrics,
    pub lifecycle: LifecycleMetrics,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct TrafficMetrics {
    pub messages_published: u64,
    pub publish_failures: u64,
    pub invalid_fields: u64,
    pub messages_received: u64,
    pub malformed_messages: u64,
    pub last_message_at: u64,
}

#[derive(Debug, Serialize)]
pub struct ConnectionMetrics {
    pub connected: bool,
    pub connection_attempts: u64,
    pub connections_established: u64,
    pub connection_failures: u64,
    pub connections_lost: u64,
    pub reconnect_attempts: u64,
    pub reconnect_exhaustions: u64,
    pub connection_duration_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct LifecycleMetrics {
    pub current_state: String,
    pub uptime_seconds: u64,
    pub state_transitions: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
