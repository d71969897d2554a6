//! Mock implementations for testing
//!
//! Provides an in-memory Transport and a recording sink so the bridge can be
//! exercised without a broker.

use crate::bridge::{Bridge, ConnectionState, ObservableSink, Perception};
use crate::protocol::Message;
use crate::transport::{EventSender, QosLevel, Transport, TransportEvent};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Topic, payload and QoS of one publish
pub type PublishedMessage = (String, Vec<u8>, QosLevel);

/// Error raised by [`MockTransport`] when a failure is configured
#[derive(Debug, Error, Clone, PartialEq)]
#[error("mock transport: {0}")]
pub struct MockTransportError(pub String);

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    connect_calls: u32,
    disconnect_calls: u32,
    identities: Vec<String>,
    subscriptions: Vec<(String, QosLevel)>,
    published: Vec<PublishedMessage>,
    fail_connect: bool,
    fail_subscribe: bool,
    fail_publish: bool,
    // Connect calls beyond this many fail
    connect_budget: Option<u32>,
    event_tx: Option<EventSender>,
}

/// Mock transport for testing
///
/// Clones share state, so a test keeps one clone to inspect and drive the
/// transport after handing another to the bridge.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.lock().fail_subscribe = fail;
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.lock().fail_publish = fail;
    }

    /// Let the next `successes` connects through, then refuse every later one
    pub fn fail_connects_after(&self, successes: u32) {
        let mut state = self.lock();
        state.connect_budget = Some(state.connect_calls + successes);
    }

    pub fn connect_calls(&self) -> u32 {
        self.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.lock().disconnect_calls
    }

    pub fn identities(&self) -> Vec<String> {
        self.lock().identities.clone()
    }

    pub fn subscriptions(&self) -> Vec<(String, QosLevel)> {
        self.lock().subscriptions.clone()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Published payloads decoded as UTF-8
    pub fn published_payloads(&self) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .map(|(_, payload, _)| String::from_utf8_lossy(payload).into_owned())
            .collect()
    }

    /// Push an event to the bridge as if the broker produced it
    pub fn inject(&self, event: TransportEvent) {
        if let Some(sender) = &self.lock().event_tx {
            let _ = sender.send(event);
        }
    }

    pub fn inject_message(&self, topic: &str, payload: &[u8]) {
        self.inject(TransportEvent::Message {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    /// Drop the link and report the loss, as a broker outage would
    pub fn drop_connection(&self, cause: &str) {
        let was_connected = std::mem::replace(&mut self.lock().connected, false);
        if was_connected {
            self.inject(TransportEvent::ConnectionLost {
                cause: cause.to_string(),
            });
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn connect(&mut self, identity: &str, endpoint: &str) -> Result<(), Self::Error> {
        let mut state = self.lock();
        state.connect_calls += 1;
        state.identities.push(identity.to_string());

        let over_budget = state
            .connect_budget
            .is_some_and(|budget| state.connect_calls > budget);
        if state.fail_connect || over_budget {
            state.connected = false;
            return Err(MockTransportError(format!("connection to {endpoint} refused")));
        }

        state.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), Self::Error> {
        let mut state = self.lock();
        if !state.connected {
            return Err(MockTransportError("not connected".to_string()));
        }
        if state.fail_subscribe {
            return Err(MockTransportError(format!("subscription to {topic} rejected")));
        }

        state.subscriptions.push((topic.to_string(), qos));
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QosLevel,
    ) -> Result<(), Self::Error> {
        let mut state = self.lock();
        if !state.connected {
            return Err(MockTransportError("not connected".to_string()));
        }
        if state.fail_publish {
            return Err(MockTransportError("publish queue closed".to_string()));
        }

        state.published.push((topic.to_string(), payload, qos));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        let mut state = self.lock();
        state.disconnect_calls += 1;
        state.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn set_event_sender(&mut self, sender: EventSender) {
        self.lock().event_tx = Some(sender);
    }
}

/// Sink call, in the order the bridge made it
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    MessageCount(u64),
    LastMessage(Message),
    StateChanged(ConnectionState),
    ReconnectExhausted { attempts: u32, reason: String },
}

/// Sink that records every call for assertions
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: SinkCall) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last_count(&self) -> Option<u64> {
        self.calls().into_iter().rev().find_map(|call| match call {
            SinkCall::MessageCount(count) => Some(count),
            _ => None,
        })
    }

    pub fn last_message(&self) -> Option<Message> {
        self.calls().into_iter().rev().find_map(|call| match call {
            SinkCall::LastMessage(message) => Some(message),
            _ => None,
        })
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::StateChanged(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    /// `(attempts, reason)` for each exhaustion report
    pub fn exhaustions(&self) -> Vec<(u32, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::ReconnectExhausted { attempts, reason } => Some((attempts, reason)),
                _ => None,
            })
            .collect()
    }
}

impl ObservableSink for RecordingSink {
    fn set_message_count(&self, count: u64) {
        self.push(SinkCall::MessageCount(count));
    }

    fn set_last_message(&self, message: &Message) {
        self.push(SinkCall::LastMessage(message.clone()));
    }

    fn connection_state_changed(&self, state: &ConnectionState) {
        self.push(SinkCall::StateChanged(*state));
    }

    fn reconnect_exhausted(&self, attempts: u32, reason: &str) {
        self.push(SinkCall::ReconnectExhausted {
            attempts,
            reason: reason.to_string(),
        });
    }
}

/// Poll until the bridge has counted `count` messages
///
/// Returns `None` if the count is not reached within `timeout`.
pub async fn wait_for_count<T: Transport + 'static>(
    bridge: &Bridge<T>,
    count: u64,
    timeout: Duration,
) -> Option<Perception> {
    tokio::time::timeout(timeout, async {
        loop {
            let perception = bridge.perception();
            if perception.messages_count >= count {
                return perception;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .ok()
}

/// Wait until the state watched by `state_rx` satisfies `predicate`
pub async fn wait_for_state(
    state_rx: &mut watch::Receiver<ConnectionState>,
    timeout: Duration,
    predicate: impl Fn(&ConnectionState) -> bool,
) -> Option<ConnectionState> {
    tokio::time::timeout(timeout, async {
        loop {
            let current = *state_rx.borrow_and_update();
            if predicate(&current) {
                return Some(current);
            }
            if state_rx.changed().await.is_err() {
                return None;
            }
        }
    })
    .await
    .ok()
    .flatten()
}
