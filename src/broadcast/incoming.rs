//! Incoming broadcast
//!
//! The provider side of a broadcaster: serves channels on a WebSocket
//! listener, announces them in its group and answers every lookup for a
//! channel it serves.

use std::sync::{Arc, PoisonError};

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::address::Address;
use crate::channel::ChannelKey;
use crate::concurrent::{CompositeStoppable, Stoppable, StoppableExecutor};
use crate::connection::websocket::{Routes, accept_connections};
use crate::dispatch::{DiscardingFailureHandler, Dispatch, Handler};
use crate::hub::{ChannelReceiver, Message};
use crate::protocol::{
    ChannelLookupProtocol, DiscoveryMessage, GroupMessageFilter, ProtocolStack, StackEndpoint,
};
use crate::transport::DiscoveryConnection;
use crate::utils::error::{BroadcastError, DispatchError, StopError};

/// Serves channels to the outgoing broadcasts of one group.
pub struct IncomingBroadcast {
    group: String,
    address: Address,
    routes: Routes,
    stack: Arc<ProtocolStack<DiscoveryMessage>>,
    executor: Arc<StoppableExecutor>,
    shutdown: watch::Sender<bool>,
}

impl IncomingBroadcast {
    /// Starts serving on `listener`, whose local address is the one
    /// announced to the group.
    pub fn new<T>(group: &str, transport: Arc<T>, listener: TcpListener) -> Result<Self, BroadcastError>
    where
        T: DiscoveryConnection + 'static,
    {
        let address = Address::from(listener.local_addr()?);
        let routes = Routes::default();
        let executor = Arc::new(StoppableExecutor::new("incoming broadcast"));
        let (shutdown, stopped) = watch::channel(false);
        let stack: Arc<ProtocolStack<DiscoveryMessage>> = Arc::new(ProtocolStack::new(
            &format!("{group} announcements"),
            ChannelLookupProtocol::new(),
            Arc::new(DiscardingFailureHandler::new("incoming broadcast")),
            transport.clone(),
        ));

        transport.dispatch_to(Arc::new(GroupMessageFilter::new(group, stack.bottom())));
        stack.start(
            &executor,
            Arc::new(LookupResponder {
                group: group.to_string(),
                address: address.clone(),
                routes: routes.clone(),
                announcer: stack.top(),
            }),
        )?;
        executor.spawn(accept_connections(
            listener,
            routes.clone(),
            executor.clone(),
            stopped,
        ))?;

        info!(%group, %address, "Incoming broadcast started");

        Ok(Self {
            group: group.to_string(),
            address,
            routes,
            stack,
            executor,
            shutdown,
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Serves `T`'s channel and returns its decoded messages.
    pub fn add_incoming<T: DeserializeOwned>(&self) -> ChannelReceiver<T> {
        let channel = ChannelKey::of::<T>();
        ChannelReceiver::new(channel.clone(), self.add_incoming_channel(channel))
    }

    /// Serves `channel` and announces it to the group.
    ///
    /// Serving a channel again replaces the previous receiver, which then
    /// sees the end of its stream.
    pub fn add_incoming_channel(&self, channel: ChannelKey) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.clone(), tx);

        let announcement = DiscoveryMessage::channel_available(
            self.group.clone(),
            channel.clone(),
            self.address.clone(),
        );
        if let Err(e) = self.stack.top().dispatch(announcement) {
            warn!(group = %self.group, %channel, error = %e, "Failed to announce channel");
        }
        rx
    }

    async fn shutdown(&self) -> Result<(), StopError> {
        if self.shutdown.send_replace(true) {
            return Ok(());
        }
        debug!(group = %self.group, address = %self.address, "Stopping incoming broadcast");

        let stopped = CompositeStoppable::new()
            .add("announcement stack", self.stack.clone())
            .add("incoming executor", self.executor.clone())
            .stop()
            .await;

        // ends every receiver's stream
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        stopped
    }
}

impl Stoppable for IncomingBroadcast {
    fn stop(&self) -> BoxFuture<'_, Result<(), StopError>> {
        Box::pin(self.shutdown())
    }
}

/// Answers lookups for the channels currently served.
struct LookupResponder {
    group: String,
    address: Address,
    routes: Routes,
    announcer: StackEndpoint<DiscoveryMessage>,
}

impl LookupResponder {
    fn respond(&self, message: DiscoveryMessage) -> Result<(), DispatchError> {
        let DiscoveryMessage::LookupRequest { channel, .. } = message else {
            return Ok(());
        };

        let served = self
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&channel);
        if !served {
            trace!(%channel, "Not serving channel, ignoring lookup");
            return Ok(());
        }

        debug!(%channel, address = %self.address, "Answering lookup");
        self.announcer.dispatch(DiscoveryMessage::channel_available(
            self.group.clone(),
            channel,
            self.address.clone(),
        ))
    }
}

impl Handler<DiscoveryMessage> for LookupResponder {
    fn handle(&self, message: DiscoveryMessage) -> BoxFuture<'_, Result<(), DispatchError>> {
        let outcome = self.respond(message);
        Box::pin(async move { outcome })
    }
}
