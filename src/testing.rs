//! In-memory doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::address::Address;
use crate::connection::{Connection, OutgoingConnector};
use crate::dispatch::Dispatch;
use crate::hub::Message;
use crate::protocol::DiscoveryMessage;
use crate::utils::error::{ConnectionError, DispatchError};

/// Polls `condition` until it holds, failing the test after two seconds.
pub(crate) async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

/// Lets queued work run, for asserting that something did *not* happen.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[derive(Debug, Default)]
pub(crate) struct RecordingDispatch {
    messages: Mutex<Vec<DiscoveryMessage>>,
}

impl RecordingDispatch {
    pub(crate) fn messages(&self) -> Vec<DiscoveryMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub(crate) fn lookup_requests(&self) -> Vec<DiscoveryMessage> {
        self.messages()
            .into_iter()
            .filter(|m| matches!(m, DiscoveryMessage::LookupRequest { .. }))
            .collect()
    }
}

impl Dispatch<DiscoveryMessage> for RecordingDispatch {
    fn dispatch(&self, message: DiscoveryMessage) -> Result<(), DispatchError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// What happened on one recorded connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectionLog {
    sent: Arc<Mutex<Vec<Message>>>,
    closed: Arc<AtomicBool>,
}

impl ConnectionLog {
    pub(crate) fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) struct RecordingConnection {
    log: ConnectionLog,
    fail_sends: bool,
    stall_sends: bool,
}

impl RecordingConnection {
    pub(crate) fn new() -> (Self, ConnectionLog) {
        let log = ConnectionLog::default();
        (
            Self {
                log: log.clone(),
                fail_sends: false,
                stall_sends: false,
            },
            log,
        )
    }

    pub(crate) fn failing() -> (Self, ConnectionLog) {
        let (mut connection, log) = Self::new();
        connection.fail_sends = true;
        (connection, log)
    }

    /// A connection whose sends never complete.
    pub(crate) fn stalled() -> (Self, ConnectionLog) {
        let (mut connection, log) = Self::new();
        connection.stall_sends = true;
        (connection, log)
    }
}

impl Connection for RecordingConnection {
    async fn send(&mut self, message: Message) -> Result<(), ConnectionError> {
        if self.stall_sends {
            std::future::pending::<()>().await;
        }
        if self.fail_sends {
            return Err(ConnectionError::Refused(Address::new("recording")));
        }
        self.log.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&mut self) {
        self.log.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector that records every attempt and refuses chosen addresses.
#[derive(Debug, Default)]
pub(crate) struct RecordingConnector {
    attempts: Mutex<Vec<Address>>,
    refused: Mutex<HashSet<Address>>,
    failing: Mutex<HashSet<Address>>,
    logs: Mutex<HashMap<Address, ConnectionLog>>,
}

impl RecordingConnector {
    pub(crate) fn refuse(&self, address: &Address) {
        self.refused.lock().unwrap().insert(address.clone());
    }

    /// Connections made to `address` from now on fail on first send.
    pub(crate) fn fail_sends_to(&self, address: &Address) {
        self.failing.lock().unwrap().insert(address.clone());
    }

    /// Undoes [`refuse`](Self::refuse) and [`fail_sends_to`](Self::fail_sends_to).
    pub(crate) fn accept(&self, address: &Address) {
        self.refused.lock().unwrap().remove(address);
        self.failing.lock().unwrap().remove(address);
    }

    pub(crate) fn attempts(&self) -> Vec<Address> {
        self.attempts.lock().unwrap().clone()
    }

    pub(crate) fn attempts_to(&self, address: &Address) -> usize {
        self.attempts().iter().filter(|a| *a == address).count()
    }

    pub(crate) fn log(&self, address: &Address) -> Option<ConnectionLog> {
        self.logs.lock().unwrap().get(address).cloned()
    }
}

impl OutgoingConnector for RecordingConnector {
    type Connection = RecordingConnection;

    async fn connect(&self, address: &Address) -> Result<RecordingConnection, ConnectionError> {
        self.attempts.lock().unwrap().push(address.clone());
        if self.refused.lock().unwrap().contains(address) {
            return Err(ConnectionError::Refused(address.clone()));
        }
        let (connection, log) = if self.failing.lock().unwrap().contains(address) {
            RecordingConnection::failing()
        } else {
            RecordingConnection::new()
        };
        self.logs.lock().unwrap().insert(address.clone(), log);
        Ok(connection)
    }
}
