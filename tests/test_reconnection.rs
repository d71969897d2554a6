//! Reconnection policy behavior against an in-memory transport
//!
//! Connection loss, bounded retries, exhaustion reporting, manual retry and
//! shutdown during backoff.


use room_bridge::bridge::{ConnectionState, ReconnectConfig};
use room_bridge::error::BridgeError;
use room_bridge::testing::{wait_for_count, wait_for_state, RecordingSink};
use room_bridge::transport::QosLevel;
use std::time::Duration;
use test_helpers::*;

/// Poll `condition` until it holds or the test wait expires
async fn eventually(condition: impl Fn() -> bool) -> bool {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

fn ends_with_reconnected(sink: &RecordingSink) -> bool {
    let states = sink.states();
    states.len() >= 2
        && matches!(states[states.len() - 2], ConnectionState::Reconnecting(_))
        && states[states.len() - 1] == ConnectionState::Connected
}

#[tokio::test]
async fn test_connection_loss_reconnects_and_resubscribes() {
    let (bridge, transport, sink) = started_bridge(fast_reconnect(3)).await;

    transport.drop_connection("network down");

    assert!(eventually(|| ends_with_reconnected(&sink)).await);
    assert_eq!(bridge.state(), ConnectionState::Connected);
    assert_eq!(transport.connect_calls(), 2);
    assert_eq!(
        transport.identities(),
        vec!["alice".to_string(), "alice".to_string()]
    );
    assert_eq!(
        transport.subscriptions(),
        vec![
            (TEST_TOPIC.to_string(), QosLevel::ExactlyOnce),
            (TEST_TOPIC.to_string(), QosLevel::ExactlyOnce),
        ]
    );
    assert!(sink
        .states()
        .contains(&ConnectionState::Reconnecting(1)));
    assert!(sink.exhaustions().is_empty());
}

#[tokio::test]
async fn test_messages_counted_after_reconnect() {
    let (bridge, transport, sink) = started_bridge(fast_reconnect(3)).await;

    transport.inject_message(TEST_TOPIC, b"bob,request,status");
    wait_for_count(&bridge, 1, WAIT).await.unwrap();

    transport.drop_connection("network down");
    assert!(eventually(|| ends_with_reconnected(&sink)).await);

    transport.inject_message(TEST_TOPIC, b"carol,inform,back");
    let perception = wait_for_count(&bridge, 2, WAIT).await.unwrap();

    // The counter survives reconnection
    assert_eq!(perception.messages_count, 2);
    assert_eq!(perception.last_message.unwrap().sender(), "carol");
}

#[tokio::test]
async fn test_reconnect_succeeds_after_failed_attempts() {
    let steady = ReconnectConfig {
        max_attempts: 10,
        initial_delay_ms: 20,
        max_delay_ms: 20,
        multiplier: 1.0,
    };
    let (bridge, transport, sink) = started_bridge(steady).await;

    transport.set_fail_connect(true);
    transport.drop_connection("network down");

    assert!(eventually(|| transport.connect_calls() >= 3).await);
    transport.set_fail_connect(false);

    assert!(eventually(|| bridge.state() == ConnectionState::Connected).await);
    assert!(sink.exhaustions().is_empty());
}

#[tokio::test]
async fn test_reconnect_exhaustion_reports_once() {
    let (bridge, transport, sink) = started_bridge(fast_reconnect(3)).await;
    let mut state_rx = bridge.watch_state();

    transport.fail_connects_after(0);
    transport.drop_connection("network down");

    let state = wait_for_state(&mut state_rx, WAIT, |state| {
        *state == ConnectionState::Disconnected
    })
    .await;
    assert_eq!(state, Some(ConnectionState::Disconnected));

    assert!(eventually(|| !sink.exhaustions().is_empty()).await);
    let exhaustions = sink.exhaustions();
    assert_eq!(exhaustions.len(), 1);
    assert_eq!(exhaustions[0].0, 3);
    assert!(exhaustions[0].1.contains("refused"));

    // One startup connect plus three retries
    assert_eq!(transport.connect_calls(), 4);

    let send = bridge.send("alice", "inform", "hello").await;
    assert!(matches!(
        send,
        Err(BridgeError::NotConnected {
            state: ConnectionState::Disconnected
        })
    ));
}

#[tokio::test]
async fn test_subscription_failure_counts_as_failed_attempt() {
    let (bridge, transport, sink) = started_bridge(fast_reconnect(2)).await;

    transport.set_fail_subscribe(true);
    transport.drop_connection("network down");

    assert!(eventually(|| !sink.exhaustions().is_empty()).await);
    assert_eq!(bridge.state(), ConnectionState::Disconnected);
    assert_eq!(sink.exhaustions()[0].0, 2);
    assert_eq!(transport.subscriptions().len(), 1);
}

#[tokio::test]
async fn test_single_attempt_policy() {
    let (bridge, transport, sink) = started_bridge(ReconnectConfig::single_attempt()).await;

    transport.fail_connects_after(0);
    transport.drop_connection("network down");

    assert!(eventually(|| !sink.exhaustions().is_empty()).await);
    assert_eq!(bridge.state(), ConnectionState::Disconnected);
    assert_eq!(sink.exhaustions()[0].0, 1);
    assert_eq!(transport.connect_calls(), 2);
}

#[tokio::test]
async fn test_manual_reconnect_after_exhaustion() {
    let (bridge, transport, sink) = started_bridge(fast_reconnect(2)).await;

    transport.fail_connects_after(0);
    transport.drop_connection("network down");
    assert!(eventually(|| !sink.exhaustions().is_empty()).await);

    transport.fail_connects_after(1);
    bridge.reconnect().await.unwrap();

    assert_eq!(bridge.state(), ConnectionState::Connected);
    assert_eq!(transport.subscriptions().len(), 2);
    bridge.send("alice", "inform", "back").await.unwrap();
}

#[tokio::test]
async fn test_manual_reconnect_exhaustion_is_returned() {
    let (bridge, transport, sink) = started_bridge(fast_reconnect(2)).await;

    transport.fail_connects_after(0);
    transport.drop_connection("network down");
    assert!(eventually(|| !sink.exhaustions().is_empty()).await);

    let result = bridge.reconnect().await;
    assert!(matches!(
        result,
        Err(BridgeError::ReconnectExhausted { attempts: 2, .. })
    ));
    assert_eq!(sink.exhaustions().len(), 2);
}

#[tokio::test]
async fn test_manual_reconnect_requires_start() {
    let (bridge, transport, _sink) = mock_bridge(fast_reconnect(2));

    assert!(matches!(
        bridge.reconnect().await,
        Err(BridgeError::NotStarted)
    ));
    assert_eq!(transport.connect_calls(), 0);
}

#[tokio::test]
async fn test_manual_reconnect_while_connected_is_noop() {
    let (bridge, transport, _sink) = started_bridge(fast_reconnect(2)).await;

    bridge.reconnect().await.unwrap();

    assert_eq!(bridge.state(), ConnectionState::Connected);
    assert_eq!(transport.connect_calls(), 1);
}

#[tokio::test]
async fn test_shutdown_interrupts_backoff() {
    let slow = ReconnectConfig {
        max_attempts: 5,
        initial_delay_ms: 60_000,
        max_delay_ms: 60_000,
        multiplier: 1.0,
    };
    let (bridge, transport, sink) = started_bridge(slow).await;
    let mut state_rx = bridge.watch_state();

    transport.drop_connection("network down");
    let reconnecting = wait_for_state(&mut state_rx, WAIT, |state| {
        matches!(state, ConnectionState::Reconnecting(_))
    })
    .await;
    assert_eq!(reconnecting, Some(ConnectionState::Reconnecting(1)));

    tokio::time::timeout(WAIT, bridge.shutdown())
        .await
        .expect("shutdown should not wait out the backoff")
        .unwrap();

    assert_eq!(bridge.state(), ConnectionState::Disconnected);
    // The attempt never ran
    assert_eq!(transport.connect_calls(), 1);
    assert!(sink.exhaustions().is_empty());
}
