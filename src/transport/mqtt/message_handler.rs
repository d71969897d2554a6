//! Pure message routing logic for MQTT events
//!
//! This module maps raw rumqttc events onto the small set of decisions the
//! event loop task acts on.

use rumqttc::v5::mqttbytes::v5::{Packet, SubscribeReasonCode};
use rumqttc::v5::Event;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: publish.payload.to_vec(),
                },
                Packet::SubAck(suback) => EventRoute::SubscriptionAcknowledged {
                    packet_id: suback.pkid,
                    result: Self::validate_subscription_success(&suback.return_codes),
                },
                Packet::PubAck(puback) => EventRoute::DeliveryConfirmed {
                    packet_id: puback.pkid,
                },
                Packet::PubComp(pubcomp) => EventRoute::DeliveryConfirmed {
                    packet_id: pubcomp.pkid,
                },
                Packet::Disconnect(disconnect) => EventRoute::Disconnected {
                    reason: format!("Broker disconnected: {:?}", disconnect.reason_code),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Validate subscription success from SubAck reason codes (pure function)
    pub fn validate_subscription_success(return_codes: &[SubscribeReasonCode]) -> Result<(), String> {
        let failures: Vec<String> = return_codes
            .iter()
            .filter(|code| !matches!(code, SubscribeReasonCode::Success(_)))
            .map(|code| format!("{code:?}"))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(format!("Subscription rejected by broker: {}", failures.join(", ")))
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged,
    /// Message received on a subscribed topic
    MessageReceived { topic: String, payload: Vec<u8> },
    /// Subscription answered by the broker
    SubscriptionAcknowledged {
        packet_id: u16,
        result: Result<(), String>,
    },
    /// Outgoing QoS 1/2 publish acknowledged by the broker
    DeliveryConfirmed { packet_id: u16 },
    /// Broker sent DISCONNECT
    Disconnected { reason: String },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}
