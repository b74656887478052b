//! Message hub
//!
//! This module contains the hub that owns the live outgoing connections of
//! a broadcaster:
//! - each connection is registered under the channels it was discovered
//!   for; a provider serving several channels shares one connection
//! - each connection gets its own writer task, fed through an unbounded
//!   queue, so a slow peer never blocks senders or other peers
//! - a multicast sender for a channel enqueues one copy of each message
//!   for every connection registered under that channel at dispatch time
//!
//! Concurrency and usage notes:
//! - The hub state sits behind a std mutex which is only held while
//!   touching the connection map, never across I/O.
//! - Stopping the hub drops every queue; writers flush what was already
//!   queued, close their connection and are joined by the hub's executor.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::channel::ChannelKey;
use crate::concurrent::{Stoppable, StoppableExecutor};
use crate::connection::Connection;
use crate::hub::Message;
use crate::hub::sender::MulticastSender;
use crate::utils::error::{DispatchError, StopError};

pub type ConnectionId = String;

/// Called with the address of a connection whose writer gave up.
pub type ClosedListener = Arc<dyn Fn(&Address) + Send + Sync>;

#[derive(Debug)]
pub(crate) struct HubConnection {
    pub(crate) address: Address,
    pub(crate) channels: HashSet<ChannelKey>,
    pub(crate) queue: mpsc::UnboundedSender<Message>,
}

#[derive(Debug, Default)]
pub(crate) struct HubState {
    pub(crate) stopped: bool,
    pub(crate) connections: HashMap<ConnectionId, HubConnection>,
}

pub(crate) fn lock_state(state: &Mutex<HubState>) -> std::sync::MutexGuard<'_, HubState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns a broadcaster's live connections, grouped by channel.
pub struct MessageHub {
    name: String,
    node_name: Arc<str>,
    state: Arc<Mutex<HubState>>,
    executor: StoppableExecutor,
    on_closed: Option<ClosedListener>,
}

impl MessageHub {
    pub fn new(name: &str, node_name: &str) -> Self {
        Self {
            name: name.to_string(),
            node_name: Arc::from(node_name),
            state: Arc::new(Mutex::new(HubState::default())),
            executor: StoppableExecutor::new(format!("{name} connections")),
            on_closed: None,
        }
    }

    /// Notifies `listener` whenever a connection is dropped because a send
    /// failed. Connections closed by [`stop`](Stoppable::stop) are not
    /// reported.
    pub fn on_connection_closed(mut self, listener: ClosedListener) -> Self {
        self.on_closed = Some(listener);
        self
    }

    /// Bounds how long `stop` waits for writers before aborting them.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.executor = self.executor.with_join_timeout(timeout);
        self
    }

    /// Returns a sender fanning out to every connection registered under
    /// `channel`, now or later.
    pub fn add_multicast_outgoing(&self, channel: ChannelKey) -> MulticastSender {
        MulticastSender::new(channel, self.node_name.clone(), self.state.clone())
    }

    /// Registers `connection` under `channel` and starts its writer.
    ///
    /// A stopped hub closes the connection and rejects it.
    pub async fn add_connection<C>(
        &self,
        channel: ChannelKey,
        address: Address,
        mut connection: C,
    ) -> Result<ConnectionId, DispatchError>
    where
        C: Connection,
    {
        let id = format!("connection-{}", uuid::Uuid::new_v4());

        {
            let mut state = lock_state(&self.state);
            if !state.stopped {
                let (tx, rx) = mpsc::unbounded_channel();
                self.executor.spawn(write_to(
                    id.clone(),
                    address.clone(),
                    connection,
                    rx,
                    self.state.clone(),
                    self.on_closed.clone(),
                ))?;
                state.connections.insert(
                    id.clone(),
                    HubConnection {
                        address: address.clone(),
                        channels: HashSet::from([channel.clone()]),
                        queue: tx,
                    },
                );
                info!(hub = %self.name, %channel, %address, "Connection added");
                return Ok(id);
            }
        }

        connection.close().await;
        Err(DispatchError::Stopped(self.name.clone()))
    }

    /// Adds `channel` to the live connection to `address`.
    ///
    /// Returns `false` when no such connection exists (never made, already
    /// dropped, or the hub has stopped).
    pub fn add_channel(&self, address: &Address, channel: ChannelKey) -> bool {
        let mut state = lock_state(&self.state);
        match state
            .connections
            .values_mut()
            .find(|c| &c.address == address)
        {
            Some(connection) => {
                if connection.channels.insert(channel.clone()) {
                    info!(hub = %self.name, %channel, %address, "Channel added to connection");
                }
                true
            }
            None => false,
        }
    }

    /// Number of live connections registered under `channel`.
    pub fn connection_count(&self, channel: &ChannelKey) -> usize {
        lock_state(&self.state)
            .connections
            .values()
            .filter(|c| c.channels.contains(channel))
            .count()
    }

    async fn shutdown(&self) -> Result<(), StopError> {
        let closed = {
            let mut state = lock_state(&self.state);
            state.stopped = true;
            std::mem::take(&mut state.connections)
        };

        for connection in closed.values() {
            debug!(hub = %self.name, address = %connection.address, "Closing connection");
        }
        // dropping the queues lets every writer drain and exit
        drop(closed);

        self.executor.stop().await
    }
}

impl fmt::Debug for MessageHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHub")
            .field("name", &self.name)
            .field("node_name", &self.node_name)
            .finish()
    }
}

impl Stoppable for MessageHub {
    fn stop(&self) -> BoxFuture<'_, Result<(), StopError>> {
        Box::pin(self.shutdown())
    }
}

async fn write_to<C: Connection>(
    id: ConnectionId,
    address: Address,
    mut connection: C,
    mut queue: mpsc::UnboundedReceiver<Message>,
    state: Arc<Mutex<HubState>>,
    on_closed: Option<ClosedListener>,
) {
    let mut failed = false;
    while let Some(message) = queue.recv().await {
        if let Err(e) = connection.send(message).await {
            warn!(%address, error = %e, "Failed to send message, dropping connection");
            failed = true;
            break;
        }
    }

    connection.close().await;
    lock_state(&state).connections.remove(&id);
    debug!(%address, "Connection closed");

    // the hub lock is released before the listener runs
    if failed {
        if let Some(listener) = on_closed {
            listener(&address);
        }
    }
}
