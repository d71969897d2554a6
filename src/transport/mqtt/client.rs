//! Impure I/O operations for MQTT client
//!
//! This module handles all impure I/O operations including network communication,
//! async coordination, and integration with the rumqttc client.

use super::connection::{configure_mqtt_options, to_mqtt_qos, LinkState, MqttError};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::MqttSection;
use crate::transport::{EventSender, QosLevel, Transport, TransportEvent};
use async_trait::async_trait;
use rumqttc::v5::{AsyncClient, EventLoop};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of a SubAck, forwarded from the event loop to `subscribe`
type SubAckResult = Result<(), String>;

const REQUEST_CHANNEL_CAPACITY: usize = 10;
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// MQTT transport client holding exactly one broker connection
///
/// Each successful `connect` owns a fresh rumqttc client and a dedicated
/// event loop task. The task stops on the first connection error; recovery
/// is driven by whoever owns the client, never by the client itself.
pub struct MqttClient {
    config: MqttSection,
    client: Option<AsyncClient>,
    event_loop_handle: Option<JoinHandle<()>>,
    link_tx: Arc<watch::Sender<LinkState>>,
    link_rx: watch::Receiver<LinkState>,
    shutdown_tx: Option<watch::Sender<bool>>,
    suback_rx: Option<mpsc::UnboundedReceiver<SubAckResult>>,
    event_tx: Option<EventSender>,
}

impl MqttClient {
    pub fn new(config: MqttSection) -> Self {
        let (link_tx, link_rx) = watch::channel(LinkState::Down("Not connected".to_string()));

        MqttClient {
            config,
            client: None,
            event_loop_handle: None,
            link_tx: Arc::new(link_tx),
            link_rx,
            shutdown_tx: None,
            suback_rx: None,
            event_tx: None,
        }
    }

    /// Current state of the broker link
    pub fn link_state(&self) -> LinkState {
        self.link_rx.borrow().clone()
    }

    /// Wait for connection confirmation (ConnAck) with timeout
    async fn wait_for_connection_confirmation(
        mut link_rx: watch::Receiver<LinkState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let timeout_result = tokio::time::timeout(timeout, async {
            loop {
                let state = link_rx.borrow_and_update().clone();
                match state {
                    LinkState::Up => return Ok(()),
                    LinkState::Down(reason) => {
                        return Err(MqttError::ConnectionFailed(reason));
                    }
                    LinkState::Connecting | LinkState::Closing => {}
                }
                if link_rx.changed().await.is_err() {
                    return Err(MqttError::ConnectionFailed(
                        "Link state channel closed".to_string(),
                    ));
                }
            }
        })
        .await;

        match timeout_result {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectionFailed(
                "ConnAck timeout - no connection confirmation received".to_string(),
            )),
        }
    }

    /// Drive one connection's event loop until it fails or shutdown is signalled
    async fn run_event_loop(
        mut event_loop: EventLoop,
        identity: String,
        link_tx: Arc<watch::Sender<LinkState>>,
        mut shutdown_rx: watch::Receiver<bool>,
        suback_tx: mpsc::UnboundedSender<SubAckResult>,
        event_tx: Option<EventSender>,
    ) {
        info!("Starting MQTT event loop for client: {}", identity);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping MQTT event loop");
                        break;
                    }
                }

                polled = event_loop.poll() => {
                    let route = match polled {
                        Ok(event) => MessageHandler::route_mqtt_event(&event),
                        Err(e) => EventRoute::Disconnected {
                            reason: e.to_string(),
                        },
                    };
                    if !Self::process_event_route(route, &identity, &link_tx, &suback_tx, &event_tx) {
                        break;
                    }
                }
            }
        }

        info!("MQTT event loop stopped for client: {}", identity);
    }

    /// Process routed MQTT event
    /// Returns true to continue loop, false to break
    fn process_event_route(
        route: EventRoute,
        identity: &str,
        link_tx: &watch::Sender<LinkState>,
        suback_tx: &mpsc::UnboundedSender<SubAckResult>,
        event_tx: &Option<EventSender>,
    ) -> bool {
        match route {
            EventRoute::ConnectionAcknowledged => {
                let _ = link_tx.send(LinkState::Up);
                true
            }
            EventRoute::MessageReceived { topic, payload } => {
                debug!(target: "mqtt_transport", "Message received ({}) on topic: {}", identity, topic);
                match event_tx {
                    Some(sender) => {
                        if sender.send(TransportEvent::Message { topic, payload }).is_err() {
                            warn!("Event receiver dropped - inbound message discarded");
                        }
                    }
                    None => warn!("Received MQTT message but no event sender configured - message dropped"),
                }
                true
            }
            EventRoute::SubscriptionAcknowledged { packet_id, result } => {
                debug!(target: "mqtt_transport", "SubAck {} received: {:?}", packet_id, result);
                let _ = suback_tx.send(result);
                true
            }
            EventRoute::DeliveryConfirmed { packet_id } => {
                debug!(target: "mqtt_transport", "Message delivery confirmed (packet {})", packet_id);
                true
            }
            EventRoute::Disconnected { reason } => {
                let was_up = matches!(*link_tx.borrow(), LinkState::Up);
                let closing = matches!(*link_tx.borrow(), LinkState::Closing);
                let _ = link_tx.send(LinkState::Down(reason.clone()));

                if was_up {
                    warn!("Connection to MQTT broker lost: {}", reason);
                    if let Some(sender) = event_tx {
                        let _ = sender.send(TransportEvent::ConnectionLost { cause: reason });
                    }
                } else if closing {
                    debug!(target: "mqtt_transport", "Connection closed after disconnect: {}", reason);
                } else {
                    error!("MQTT connection attempt failed: {}", reason);
                }
                false
            }
            EventRoute::InfrastructureEvent(event_str) => {
                tracing::trace!(target: "mqtt_transport", "MQTT event: {}", event_str);
                true
            }
            EventRoute::OutgoingEvent => true,
        }
    }

    /// Stop the current event loop task, if any
    fn stop_event_loop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
        self.client = None;
        self.suback_rx = None;
    }

    /// Check connection state before operations
    fn check_link_state(&self) -> Result<&AsyncClient, MqttError> {
        let state = self.link_state();
        match (&state, &self.client) {
            (LinkState::Up, Some(client)) => Ok(client),
            _ => Err(MqttError::NotConnected { state }),
        }
    }

    /// Connect to the broker with a clean session
    ///
    /// Returns only once ConnAck arrives; a refused or timed out handshake
    /// tears the attempt down and returns `ConnectionFailed`.
    pub async fn connect(&mut self, identity: &str, endpoint: &str) -> Result<(), MqttError> {
        // A previous connection's task may still be parked after a loss
        self.stop_event_loop();

        let mqtt_options = configure_mqtt_options(identity, endpoint, &self.config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (suback_tx, suback_rx) = mpsc::unbounded_channel();
        let _ = self.link_tx.send(LinkState::Connecting);

        let handle = tokio::spawn(Self::run_event_loop(
            event_loop,
            identity.to_string(),
            self.link_tx.clone(),
            shutdown_rx,
            suback_tx,
            self.event_tx.clone(),
        ));

        self.client = Some(client);
        self.event_loop_handle = Some(handle);
        self.shutdown_tx = Some(shutdown_tx);
        self.suback_rx = Some(suback_rx);

        let confirmation =
            Self::wait_for_connection_confirmation(self.link_rx.clone(), self.config.connect_timeout())
                .await;

        if let Err(e) = confirmation {
            self.stop_event_loop();
            let _ = self.link_tx.send(LinkState::Down(e.to_string()));
            return Err(e);
        }

        info!("MQTT client {} connected to broker: {}", identity, endpoint);
        Ok(())
    }

    /// Subscribe to a topic and wait for the broker's SubAck
    pub async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), MqttError> {
        let client = self.check_link_state()?.clone();
        let timeout = self.config.connect_timeout();
        let suback_rx = self
            .suback_rx
            .as_mut()
            .ok_or_else(|| MqttError::SubscriptionFailed("No active connection".to_string()))?;

        // Discard acknowledgements left over from earlier requests
        while suback_rx.try_recv().is_ok() {}

        client
            .subscribe(topic, to_mqtt_qos(qos))
            .await
            .map_err(|e| MqttError::SubscriptionFailed(format!("Failed to subscribe to {topic}: {e}")))?;

        match tokio::time::timeout(timeout, suback_rx.recv()).await {
            Ok(Some(Ok(()))) => {
                info!("Subscribed to topic: {}", topic);
                Ok(())
            }
            Ok(Some(Err(reason))) => Err(MqttError::SubscriptionFailed(reason)),
            Ok(None) => Err(MqttError::SubscriptionFailed(
                "Connection closed before SubAck".to_string(),
            )),
            Err(_) => Err(MqttError::SubscriptionFailed(format!(
                "SubAck timeout for topic {topic}"
            ))),
        }
    }

    /// Enqueue a publish on the current connection
    pub async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QosLevel,
    ) -> Result<(), MqttError> {
        let client = self.check_link_state()?;
        client
            .publish(topic, to_mqtt_qos(qos), false, payload)
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

        debug!(target: "mqtt_transport", "Queued publish to {} with {:?}", topic, qos);
        Ok(())
    }

    /// Disconnect from the broker
    ///
    /// Sends DISCONNECT when the link is up and gives the event loop a short
    /// window to flush it before the task is aborted.
    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        let was_up = matches!(self.link_state(), LinkState::Up);

        if was_up {
            let _ = self.link_tx.send(LinkState::Closing);
            if let Some(client) = &self.client {
                if let Err(e) = client.disconnect().await {
                    warn!("Failed to queue MQTT disconnect: {}", e);
                }
            }

            if let Some(handle) = self.event_loop_handle.as_mut() {
                match tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, handle).await {
                    Ok(_) => info!("Event loop task shut down gracefully"),
                    Err(_) => warn!("Event loop task didn't shut down gracefully, forcing abort"),
                }
            }
        }

        self.stop_event_loop();
        let _ = self
            .link_tx
            .send(LinkState::Down("Client disconnected".to_string()));

        info!("MQTT client disconnected");
        Ok(())
    }
}

/// Implementation of Transport trait for MqttClient
#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self, identity: &str, endpoint: &str) -> Result<(), Self::Error> {
        MqttClient::connect(self, identity, endpoint).await
    }

    async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), Self::Error> {
        MqttClient::subscribe(self, topic, qos).await
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QosLevel,
    ) -> Result<(), Self::Error> {
        MqttClient::publish(self, topic, payload, qos).await
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        MqttClient::disconnect(self).await
    }

    fn is_connected(&self) -> bool {
        matches!(self.link_state(), LinkState::Up)
    }

    fn set_event_sender(&mut self, sender: EventSender) {
        self.event_tx = Some(sender);
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        // No async in Drop; callers should disconnect() for a clean DISCONNECT
        self.stop_event_loop();
    }
}
