//! The bridge between a room topic and an observable state sink
//!
//! The bridge owns its transport. Inbound events are consumed by a single
//! delivery task holding only a weak reference back to the bridge, so
//! inbound handling is serialized and the task ends with the bridge.

use super::reconnect::{ReconnectConfig, ReconnectPolicy, ReconnectionDecision};
use super::sink::ObservableSink;
use super::state::{ConnectionState, Perception};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::observability::metrics;
use crate::protocol::{validate_identity, validate_topic, Message, MessageCodec};
use crate::transport::{MqttTransport, QosLevel, Transport, TransportEvent};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Connection parameters fixed by a successful `start`
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    pub identity: String,
    pub endpoint: String,
    pub topic: String,
    pub qos: QosLevel,
}

/// State shared between the bridge handle and its delivery task
struct BridgeShared<T: Transport> {
    transport: tokio::sync::Mutex<T>,
    settings: Mutex<Option<BridgeSettings>>,
    state_tx: watch::Sender<ConnectionState>,
    perception: Mutex<Perception>,
    sink: Arc<dyn ObservableSink>,
    reconnect: ReconnectConfig,
    shutdown_tx: watch::Sender<bool>,
    // Serializes start, reconnection and shutdown
    lifecycle: tokio::sync::Mutex<()>,
}

/// Connects one participant to the shared room topic
pub struct Bridge<T: Transport + 'static> {
    shared: Arc<BridgeShared<T>>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    delivery_handle: Mutex<Option<JoinHandle<()>>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Bridge<MqttTransport> {
    /// Build an MQTT-backed bridge from loaded configuration
    pub fn from_config(config: &BridgeConfig, sink: Arc<dyn ObservableSink>) -> Self {
        Self::new(
            MqttTransport::new(config.mqtt.clone()),
            sink,
            config.reconnect.clone(),
        )
    }

    /// Start with the identity, broker, topic and QoS from configuration
    pub async fn start_with_config(&self, config: &BridgeConfig) -> BridgeResult<()> {
        self.start(
            &config.bridge.identity,
            &config.mqtt.broker_url,
            &config.mqtt.topic,
            config.mqtt.qos,
        )
        .await
    }
}

impl<T: Transport + 'static> Bridge<T> {
    pub fn new(mut transport: T, sink: Arc<dyn ObservableSink>, reconnect: ReconnectConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        transport.set_event_sender(event_tx);

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            shared: Arc::new(BridgeShared {
                transport: tokio::sync::Mutex::new(transport),
                settings: Mutex::new(None),
                state_tx,
                perception: Mutex::new(Perception::default()),
                sink,
                reconnect,
                shutdown_tx,
                lifecycle: tokio::sync::Mutex::new(()),
            }),
            event_rx: Mutex::new(Some(event_rx)),
            delivery_handle: Mutex::new(None),
        }
    }

    /// Connect, then subscribe to `topic`
    ///
    /// Failures are returned to the caller without retrying. Calling this
    /// while the bridge is not `Disconnected` fails with `AlreadyStarted`
    /// and leaves the existing subscription untouched.
    pub async fn start(
        &self,
        identity: &str,
        endpoint: &str,
        topic: &str,
        qos: QosLevel,
    ) -> BridgeResult<()> {
        let _guard = self.shared.lifecycle.lock().await;

        if *self.shared.shutdown_tx.borrow() {
            return Err(BridgeError::ShutdownRequested);
        }

        let state = self.state();
        if state != ConnectionState::Disconnected {
            return Err(BridgeError::AlreadyStarted { state });
        }

        validate_identity(identity)?;
        validate_topic(topic)?;

        let settings = BridgeSettings {
            identity: identity.to_string(),
            endpoint: endpoint.to_string(),
            topic: topic.to_string(),
            qos,
        };
        *lock(&self.shared.settings) = Some(settings.clone());

        self.ensure_delivery_task();
        self.shared.set_state(ConnectionState::Connecting);

        let span = crate::bridge_span!(operation = "start", identity = %identity, topic = %topic);
        if let Err(e) = self
            .shared
            .connect_and_subscribe(&settings)
            .instrument(span)
            .await
        {
            error!("Bridge failed to start: {}", e);
            self.shared.set_state(ConnectionState::Disconnected);
            return Err(e);
        }

        self.shared.set_state(ConnectionState::Connected);
        info!(
            identity = %settings.identity,
            endpoint = %settings.endpoint,
            topic = %settings.topic,
            "Bridge started"
        );

        let perception = self.perception();
        self.shared.sink.perception_updated(&perception);
        Ok(())
    }

    /// Publish one message to the room topic
    ///
    /// Field validation happens before any I/O. The local counter is not
    /// touched; the message is counted when the broker delivers it back.
    pub async fn send(&self, sender: &str, performative: &str, content: &str) -> BridgeResult<()> {
        let message = Message::new(sender, performative, content).map_err(|e| {
            metrics().invalid_field_rejected();
            BridgeError::from(e)
        })?;

        let state = self.state();
        if !state.can_send() {
            return Err(BridgeError::NotConnected { state });
        }

        let settings = self.settings().ok_or(BridgeError::NotStarted)?;
        let payload = MessageCodec::encode(&message);

        let transport = self.shared.transport.lock().await;
        if let Err(e) = transport
            .publish(&settings.topic, payload.clone(), settings.qos)
            .await
        {
            metrics().publish_failed();
            warn!(topic = %settings.topic, "Failed to publish message: {}", e);
            return Err(BridgeError::PublishFailed(Box::new(e)));
        }

        metrics().message_published();
        info!(
            topic = %settings.topic,
            payload = %String::from_utf8_lossy(&payload),
            "Message sent"
        );
        Ok(())
    }

    /// Retry the connection on demand after the policy gave up
    ///
    /// Runs the same bounded backoff as an automatic reconnection. A bridge
    /// that is already connected is left as is.
    pub async fn reconnect(&self) -> BridgeResult<()> {
        let _guard = self.shared.lifecycle.lock().await;

        if *self.shared.shutdown_tx.borrow() {
            return Err(BridgeError::ShutdownRequested);
        }

        let settings = self.settings().ok_or(BridgeError::NotStarted)?;
        if self.state() == ConnectionState::Connected {
            debug!("Manual reconnect requested while connected, nothing to do");
            return Ok(());
        }

        info!("Manual reconnect requested");
        self.ensure_delivery_task();
        self.shared
            .run_reconnect_policy(&settings, "manual reconnect".to_string())
            .await
    }

    /// Disconnect and stop the delivery task; further calls do nothing
    pub async fn shutdown(&self) -> BridgeResult<()> {
        let already_requested = self.shared.shutdown_tx.send_replace(true);
        let _guard = self.shared.lifecycle.lock().await;

        if already_requested {
            debug!("Bridge already shut down");
            return Ok(());
        }

        info!("Shutting down bridge");
        if let Err(e) = self.shared.transport.lock().await.disconnect().await {
            warn!("Transport disconnect failed during shutdown: {}", e);
        }
        metrics().connection_closed();
        self.shared.set_state(ConnectionState::Disconnected);

        if let Some(handle) = lock(&self.delivery_handle).take() {
            handle.abort();
        }

        info!("Bridge shut down");
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Receiver that observes every connection state transition
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Consistent copy of the message counter and last message
    pub fn perception(&self) -> Perception {
        lock(&self.shared.perception).clone()
    }

    pub fn settings(&self) -> Option<BridgeSettings> {
        self.shared.settings()
    }

    fn ensure_delivery_task(&self) {
        let mut handle = lock(&self.delivery_handle);
        if handle.is_some() {
            return;
        }

        if let Some(event_rx) = lock(&self.event_rx).take() {
            let shared = Arc::downgrade(&self.shared);
            *handle = Some(tokio::spawn(run_delivery(shared, event_rx)));
        }
    }
}

impl<T: Transport + 'static> Drop for Bridge<T> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.delivery_handle).take() {
            handle.abort();
        }
    }
}

/// Consume transport events in order until the bridge goes away
async fn run_delivery<T: Transport + 'static>(
    shared: Weak<BridgeShared<T>>,
    mut event_rx: mpsc::UnboundedReceiver<TransportEvent>,
) {
    debug!("Bridge delivery task started");

    while let Some(event) = event_rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };

        match event {
            TransportEvent::Message { topic, payload } => shared.handle_inbound(&topic, &payload),
            TransportEvent::ConnectionLost { cause } => shared.handle_connection_lost(cause).await,
        }
    }

    debug!("Bridge delivery task stopped");
}

impl<T: Transport> BridgeShared<T> {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn settings(&self) -> Option<BridgeSettings> {
        lock(&self.settings).clone()
    }

    fn set_state(&self, new_state: ConnectionState) {
        let old_state = self.state_tx.send_replace(new_state);
        if old_state != new_state {
            ReconnectPolicy::log_state_transition(&old_state, &new_state);
            metrics().bridge_state_changed(&new_state.to_string());
            self.sink.connection_state_changed(&new_state);
        }
    }

    fn handle_inbound(&self, topic: &str, payload: &[u8]) {
        let Some(settings) = self.settings() else {
            debug!("Dropping message received before start");
            return;
        };

        if topic != settings.topic {
            debug!(topic, "Ignoring message on foreign topic");
            return;
        }

        if self.state() == ConnectionState::Disconnected {
            debug!("Ignoring message received while disconnected");
            return;
        }

        metrics().message_received();
        info!(
            identity = %settings.identity,
            topic,
            payload = %String::from_utf8_lossy(payload),
            "Message received"
        );

        match MessageCodec::decode(payload) {
            Ok(message) => {
                let perception = {
                    let mut perception = lock(&self.perception);
                    perception.record(message);
                    perception.clone()
                };
                self.sink.perception_updated(&perception);
            }
            Err(e) => {
                metrics().malformed_message();
                warn!(identity = %settings.identity, "Discarding payload: {}", e);
            }
        }
    }

    async fn handle_connection_lost(&self, cause: String) {
        let _guard = self.lifecycle.lock().await;

        if self.state() != ConnectionState::Connected {
            debug!("Connection loss reported while not connected: {}", cause);
            return;
        }

        // A loss queued before a later successful reconnect
        if self.transport.lock().await.is_connected() {
            debug!("Ignoring stale connection loss: {}", cause);
            return;
        }

        warn!("Connection lost: {}", cause);
        metrics().connection_lost();

        let Some(settings) = self.settings() else {
            self.set_state(ConnectionState::Disconnected);
            return;
        };

        if let Err(e) = self.run_reconnect_policy(&settings, cause).await {
            debug!("Automatic reconnection ended: {}", e);
        }
    }

    /// Bounded backoff loop; the caller holds the lifecycle lock
    async fn run_reconnect_policy(
        &self,
        settings: &BridgeSettings,
        initial_cause: String,
    ) -> BridgeResult<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut last_cause = initial_cause;
        let mut attempts = 0;

        loop {
            let shutdown_requested = *shutdown_rx.borrow();
            match ReconnectPolicy::should_attempt_reconnection(
                attempts,
                &self.reconnect,
                shutdown_requested,
            ) {
                ReconnectionDecision::Proceed { attempt, delay_ms } => {
                    self.set_state(ConnectionState::Reconnecting(attempt));
                    metrics().reconnect_attempt();
                    info!(attempt, delay_ms, "Reconnection attempt scheduled");

                    let delay = Duration::from_millis(delay_ms);
                    if !ReconnectPolicy::interruptible_sleep(delay, &mut shutdown_rx).await {
                        self.set_state(ConnectionState::Disconnected);
                        return Err(BridgeError::ShutdownRequested);
                    }

                    attempts = attempt;
                    match self.connect_and_subscribe(settings).await {
                        Ok(()) => {
                            self.set_state(ConnectionState::Connected);
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(attempt, "Reconnection attempt failed: {}", e);
                            last_cause = e.to_string();
                        }
                    }
                }
                ReconnectionDecision::AbortShutdownRequested => {
                    self.set_state(ConnectionState::Disconnected);
                    return Err(BridgeError::ShutdownRequested);
                }
                ReconnectionDecision::AbortMaxAttemptsExceeded => {
                    self.set_state(ConnectionState::Disconnected);
                    metrics().reconnect_exhausted();
                    error!(
                        attempts,
                        reason = %last_cause,
                        "Reconnection exhausted"
                    );
                    self.sink.reconnect_exhausted(attempts, &last_cause);
                    return Err(BridgeError::ReconnectExhausted {
                        attempts,
                        reason: last_cause,
                    });
                }
            }
        }
    }

    /// One connect and subscribe pass with the stored settings
    ///
    /// A subscription failure disconnects again so no half-open session is
    /// left behind.
    async fn connect_and_subscribe(&self, settings: &BridgeSettings) -> BridgeResult<()> {
        let span = crate::mqtt_span!(
            identity = %settings.identity,
            endpoint = %settings.endpoint,
            topic = %settings.topic
        );

        async {
            let mut transport = self.transport.lock().await;
            metrics().connection_attempt();

            if let Err(e) = transport.connect(&settings.identity, &settings.endpoint).await {
                metrics().connection_failed();
                return Err(BridgeError::ConnectionFailed(Box::new(e)));
            }

            if let Err(e) = transport.subscribe(&settings.topic, settings.qos).await {
                metrics().connection_failed();
                if let Err(disconnect_error) = transport.disconnect().await {
                    warn!("Disconnect after failed subscription also failed: {}", disconnect_error);
                }
                return Err(BridgeError::SubscriptionFailed(Box::new(e)));
            }

            metrics().connection_established();
            info!("Connected and subscribed");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
