use std::time::Duration;

use tokio::net::TcpListener;

use super::OutgoingConnector;
use super::websocket::{WebSocketConnector, millis};
use crate::address::Address;
use crate::utils::error::ConnectionError;

#[test]
fn test_timeout_millis_saturate() {
    assert_eq!(millis(Duration::from_millis(250)), 250);
    assert_eq!(millis(Duration::MAX), u64::MAX);
}

#[tokio::test]
async fn test_connect_times_out_on_a_silent_peer() {
    // accepts TCP through the backlog but never answers the handshake
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = Address::from(listener.local_addr().expect("local addr"));
    let connector = WebSocketConnector::new(Duration::from_millis(50));

    let err = connector
        .connect(&address)
        .await
        .err()
        .expect("handshake never completes");

    match err {
        ConnectionError::Timeout {
            address: timed_out,
            timeout_ms,
        } => {
            assert_eq!(timed_out, address);
            assert_eq!(timeout_ms, 50);
        }
        other => panic!("expected a timeout, got {other}"),
    }
    drop(listener);
}
