//! Outgoing broadcast
//!
//! The outgoing side of a broadcaster. Asking for a sender on a channel
//! looks the channel up on the discovery transport; every provider that
//! answers is connected to once and added to the channel's fan-out set in
//! the hub, so senders handed out earlier start reaching it. A provider
//! answering for several channels keeps one connection carrying all of
//! them; once that connection is lost the provider can be rediscovered.
//!
//! Concurrency and usage notes:
//! - `add_outgoing` and `dispatch` may be called from any thread; neither
//!   blocks on the network.
//! - Discovery responses are handled one at a time by the stack worker.
//!   The state lock is released before connecting, so a slow connect holds
//!   up later responses but never a caller.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::address::Address;
use crate::broadcast::state::{Admission, BroadcastState, lock};
use crate::channel::ChannelKey;
use crate::concurrent::{CompositeStoppable, Stoppable, StoppableExecutor};
use crate::connection::OutgoingConnector;
use crate::dispatch::{DiscardingFailureHandler, Dispatch, Handler};
use crate::hub::{ChannelSender, MessageHub, MulticastSender};
use crate::protocol::{ChannelLookupProtocol, DiscoveryMessage, GroupMessageFilter, ProtocolStack};
use crate::transport::DiscoveryConnection;
use crate::utils::error::{BroadcastError, DispatchError, StopError};

/// Sends messages to every provider of a channel discovered in one group.
pub struct OutgoingBroadcast {
    group: String,
    state: Arc<Mutex<BroadcastState>>,
    hub: Arc<MessageHub>,
    stack: Arc<ProtocolStack<DiscoveryMessage>>,
    executor: Arc<StoppableExecutor>,
}

impl OutgoingBroadcast {
    /// Wires a broadcaster onto `transport` and starts its lookup worker.
    ///
    /// `node_name` is stamped as the sender of every message; `connector`
    /// reaches the providers that answer lookups.
    pub fn new<T, C>(
        group: &str,
        node_name: &str,
        transport: Arc<T>,
        connector: C,
    ) -> Result<Self, BroadcastError>
    where
        T: DiscoveryConnection + 'static,
        C: OutgoingConnector,
    {
        let state = Arc::new(Mutex::new(BroadcastState::default()));
        let released = state.clone();
        let hub = Arc::new(
            MessageHub::new("outgoing broadcast", node_name).on_connection_closed(Arc::new(
                move |address: &Address| {
                    lock(&released).release(address);
                    debug!(%address, "Connection lost, provider may be rediscovered");
                },
            )),
        );
        let executor = Arc::new(StoppableExecutor::new("broadcast lookup"));
        let stack: Arc<ProtocolStack<DiscoveryMessage>> = Arc::new(ProtocolStack::new(
            &format!("{group} lookup"),
            ChannelLookupProtocol::new(),
            Arc::new(DiscardingFailureHandler::new("outgoing broadcast")),
            transport.clone(),
        ));

        transport.dispatch_to(Arc::new(GroupMessageFilter::new(group, stack.bottom())));
        stack.start(
            &executor,
            Arc::new(DiscoveryResponseHandler {
                state: state.clone(),
                hub: hub.clone(),
                connector,
            }),
        )?;

        info!(%group, %node_name, "Outgoing broadcast started");

        Ok(Self {
            group: group.to_string(),
            state,
            hub,
            stack,
            executor,
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns a sender for messages of type `T`, looking up providers of
    /// `T`'s channel unless a lookup is already pending.
    pub fn add_outgoing<T: Serialize>(&self) -> ChannelSender<T> {
        self.add_outgoing_channel(ChannelKey::of::<T>()).typed()
    }

    /// Untyped form of [`add_outgoing`](Self::add_outgoing).
    ///
    /// Always returns a usable sender. Messages sent before any provider is
    /// connected reach nobody; after [`stop`](Stoppable::stop) the sender
    /// reaches nobody for good.
    pub fn add_outgoing_channel(&self, channel: ChannelKey) -> MulticastSender {
        {
            let mut state = lock(&self.state);
            if state.begin_lookup(&channel) {
                let request = DiscoveryMessage::lookup_request(self.group.clone(), channel.clone());
                if let Err(e) = self.stack.top().dispatch(request) {
                    warn!(group = %self.group, %channel, error = %e, "Failed to send lookup request");
                }
            } else {
                trace!(group = %self.group, %channel, "Lookup already pending or broadcaster stopped");
            }
        }

        self.hub.add_multicast_outgoing(channel)
    }

    /// Whether a lookup for `channel` awaits its first answer.
    pub fn is_pending(&self, channel: &ChannelKey) -> bool {
        lock(&self.state).is_pending(channel)
    }

    /// Whether `address` is connected or being connected to.
    pub fn is_connected(&self, address: &Address) -> bool {
        lock(&self.state).is_connected(address)
    }

    /// Number of live connections serving `channel`.
    pub fn connection_count(&self, channel: &ChannelKey) -> usize {
        self.hub.connection_count(channel)
    }

    async fn shutdown(&self) -> Result<(), StopError> {
        let first_stop = lock(&self.state).stop();
        if !first_stop {
            return Ok(());
        }
        debug!(group = %self.group, "Stopping outgoing broadcast");

        CompositeStoppable::new()
            .add("hub", self.hub.clone())
            .add("lookup stack", self.stack.clone())
            .add("lookup executor", self.executor.clone())
            .stop()
            .await
    }
}

impl Stoppable for OutgoingBroadcast {
    fn stop(&self) -> BoxFuture<'_, Result<(), StopError>> {
        Box::pin(self.shutdown())
    }
}

/// Turns availability announcements into hub connections.
struct DiscoveryResponseHandler<C> {
    state: Arc<Mutex<BroadcastState>>,
    hub: Arc<MessageHub>,
    connector: C,
}

impl<C: OutgoingConnector> DiscoveryResponseHandler<C> {
    async fn on_message(&self, message: DiscoveryMessage) -> Result<(), DispatchError> {
        let (channel, address) = match message {
            DiscoveryMessage::LookupRequest { channel, .. } => {
                trace!(%channel, "Not serving anything, ignoring lookup");
                return Ok(());
            }
            DiscoveryMessage::ChannelAvailable {
                channel, address, ..
            } => (channel, address),
        };

        let admission = lock(&self.state).admit(&channel, &address);
        match admission {
            Admission::Connect => {}
            Admission::Unsolicited => {
                trace!(%channel, %address, "No lookup pending, ignoring announcement");
                return Ok(());
            }
            Admission::AlreadyConnected => {
                if self.hub.add_channel(&address, channel.clone()) {
                    debug!(%channel, %address, "Provider already connected, sharing its connection");
                } else {
                    debug!(%channel, %address, "Provider connection is gone, ignoring announcement");
                }
                return Ok(());
            }
            Admission::Stopped => {
                trace!(%channel, %address, "Stopped, ignoring announcement");
                return Ok(());
            }
        }

        let connection = match self.connector.connect(&address).await {
            Ok(connection) => connection,
            Err(e) => {
                lock(&self.state).release(&address);
                debug!(%channel, %address, error = %e, "Failed to connect to provider, releasing address");
                return Err(DispatchError::failed(e));
            }
        };

        self.hub.add_connection(channel, address, connection).await?;
        Ok(())
    }
}

impl<C: OutgoingConnector> Handler<DiscoveryMessage> for DiscoveryResponseHandler<C> {
    fn handle(&self, message: DiscoveryMessage) -> BoxFuture<'_, Result<(), DispatchError>> {
        Box::pin(self.on_message(message))
    }
}
