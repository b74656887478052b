use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use super::MessageHub;
use crate::address::Address;
use crate::channel::ChannelKey;
use crate::concurrent::Stoppable;
use crate::testing::{RecordingConnection, eventually, settle};
use crate::utils::error::DispatchError;

fn workers() -> ChannelKey {
    ChannelKey::new("com.example.Worker")
}

fn reports() -> ChannelKey {
    ChannelKey::new("com.example.Report")
}

#[tokio::test]
async fn test_dispatch_reaches_only_connections_of_the_channel() {
    let hub = MessageHub::new("test hub", "node-a");
    let (first, first_log) = RecordingConnection::new();
    let (second, second_log) = RecordingConnection::new();
    let (other, other_log) = RecordingConnection::new();

    hub.add_connection(workers(), Address::new("a1"), first)
        .await
        .expect("add first");
    hub.add_connection(workers(), Address::new("a2"), second)
        .await
        .expect("add second");
    hub.add_connection(reports(), Address::new("a3"), other)
        .await
        .expect("add other");
    assert_eq!(hub.connection_count(&workers()), 2);
    assert_eq!(hub.connection_count(&reports()), 1);

    hub.add_multicast_outgoing(workers())
        .dispatch(json!({"job": 7}));

    eventually(|| first_log.sent().len() == 1 && second_log.sent().len() == 1).await;
    settle().await;
    assert!(other_log.sent().is_empty());

    let message = &first_log.sent()[0];
    assert_eq!(message.channel, workers());
    assert_eq!(message.sender, "node-a");
    assert_eq!(message.payload, json!({"job": 7}));
    assert_eq!(second_log.sent()[0].message_id, message.message_id);

    hub.stop().await.expect("stop");
}

#[tokio::test]
async fn test_sender_obtained_early_reaches_later_connections() {
    let hub = MessageHub::new("test hub", "node-a");
    let sender = hub.add_multicast_outgoing(workers());

    // nobody is listening yet: dropped, not queued
    sender.dispatch(json!("too early"));

    let (connection, log) = RecordingConnection::new();
    hub.add_connection(workers(), Address::new("a1"), connection)
        .await
        .expect("add");
    sender.dispatch(json!("on time"));

    eventually(|| log.sent().len() == 1).await;
    assert_eq!(log.sent()[0].payload, json!("on time"));

    hub.stop().await.expect("stop");
}

#[derive(Serialize)]
struct Job {
    id: u32,
}

#[tokio::test]
async fn test_typed_sender_encodes_payload() {
    let hub = MessageHub::new("test hub", "node-a");
    let (connection, log) = RecordingConnection::new();
    hub.add_connection(ChannelKey::of::<Job>(), Address::new("a1"), connection)
        .await
        .expect("add");

    let sender = hub.add_multicast_outgoing(ChannelKey::of::<Job>()).typed::<Job>();
    sender.dispatch(&Job { id: 3 });

    eventually(|| log.sent().len() == 1).await;
    assert_eq!(log.sent()[0].payload, json!({"id": 3}));

    hub.stop().await.expect("stop");
}

#[tokio::test]
async fn test_failing_connection_is_removed() {
    let hub = MessageHub::new("test hub", "node-a");
    let (connection, log) = RecordingConnection::failing();
    hub.add_connection(workers(), Address::new("a1"), connection)
        .await
        .expect("add");

    hub.add_multicast_outgoing(workers()).dispatch(json!(1));

    eventually(|| hub.connection_count(&workers()) == 0).await;
    assert!(log.is_closed());

    hub.stop().await.expect("stop");
}

#[tokio::test]
async fn test_stop_closes_connections_and_silences_senders() {
    let hub = MessageHub::new("test hub", "node-a");
    let sender = hub.add_multicast_outgoing(workers());
    let (connection, log) = RecordingConnection::new();
    hub.add_connection(workers(), Address::new("a1"), connection)
        .await
        .expect("add");

    sender.dispatch(json!("before stop"));
    hub.stop().await.expect("stop");

    // queued messages are flushed before the connection closes
    assert_eq!(log.sent().len(), 1);
    assert!(log.is_closed());
    assert_eq!(hub.connection_count(&workers()), 0);

    sender.dispatch(json!("after stop"));
    settle().await;
    assert_eq!(log.sent().len(), 1);

    let (late, late_log) = RecordingConnection::new();
    let err = hub
        .add_connection(workers(), Address::new("a2"), late)
        .await
        .expect_err("hub stopped");
    assert!(matches!(err, DispatchError::Stopped(_)));
    assert!(late_log.is_closed());

    hub.stop().await.expect("second stop is harmless");
}

#[tokio::test]
async fn test_connection_can_carry_several_channels() {
    let hub = MessageHub::new("test hub", "node-a");
    let a1 = Address::new("a1");
    let (connection, log) = RecordingConnection::new();
    hub.add_connection(workers(), a1.clone(), connection)
        .await
        .expect("add");

    assert!(hub.add_channel(&a1, reports()));
    assert!(!hub.add_channel(&Address::new("unknown"), reports()));
    assert_eq!(hub.connection_count(&workers()), 1);
    assert_eq!(hub.connection_count(&reports()), 1);

    hub.add_multicast_outgoing(reports()).dispatch(json!("r"));
    hub.add_multicast_outgoing(workers()).dispatch(json!("w"));

    eventually(|| log.sent().len() == 2).await;
    let channels: Vec<_> = log.sent().into_iter().map(|m| m.channel).collect();
    assert_eq!(channels, vec![reports(), workers()]);

    hub.stop().await.expect("stop");
    assert!(!hub.add_channel(&a1, workers()));
}

#[tokio::test]
async fn test_lost_connections_are_reported_but_stopped_ones_are_not() {
    let closed = Arc::new(Mutex::new(Vec::new()));
    let seen = closed.clone();
    let hub = MessageHub::new("test hub", "node-a").on_connection_closed(Arc::new(
        move |address: &Address| seen.lock().unwrap().push(address.clone()),
    ));

    let (broken, _) = RecordingConnection::failing();
    let (healthy, healthy_log) = RecordingConnection::new();
    hub.add_connection(workers(), Address::new("broken"), broken)
        .await
        .expect("add broken");
    hub.add_connection(reports(), Address::new("healthy"), healthy)
        .await
        .expect("add healthy");

    hub.add_multicast_outgoing(workers()).dispatch(json!(1));
    eventually(|| closed.lock().unwrap().len() == 1).await;

    hub.stop().await.expect("stop");
    assert!(healthy_log.is_closed());
    assert_eq!(*closed.lock().unwrap(), vec![Address::new("broken")]);
}

#[tokio::test]
async fn test_stop_aborts_writers_stuck_on_a_send() {
    let hub = MessageHub::new("test hub", "node-a").with_stop_timeout(Duration::from_millis(50));
    let (connection, _log) = RecordingConnection::stalled();
    hub.add_connection(workers(), Address::new("a1"), connection)
        .await
        .expect("add");
    hub.add_multicast_outgoing(workers()).dispatch(json!("never drained"));
    settle().await;

    let err = tokio::time::timeout(Duration::from_secs(2), hub.stop())
        .await
        .expect("stop does not hang")
        .expect_err("stuck writer is reported");
    assert!(err.to_string().contains("aborted"));
    assert_eq!(hub.connection_count(&workers()), 0);
}
