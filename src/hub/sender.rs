use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::channel::ChannelKey;
use crate::hub::Message;
use crate::hub::engine::{HubState, lock_state};

/// Fans messages out to every connection registered for one channel.
///
/// Dispatching never blocks and never fails: with no connections
/// registered (yet, or any more after the hub stopped) the message simply
/// reaches nobody.
#[derive(Clone)]
pub struct MulticastSender {
    channel: ChannelKey,
    node_name: Arc<str>,
    state: Arc<Mutex<HubState>>,
}

impl MulticastSender {
    pub(crate) fn new(channel: ChannelKey, node_name: Arc<str>, state: Arc<Mutex<HubState>>) -> Self {
        Self {
            channel,
            node_name,
            state,
        }
    }

    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    /// Sends `payload` to every connection currently registered under this
    /// sender's channel.
    pub fn dispatch(&self, payload: serde_json::Value) {
        let message = Message::new(self.channel.clone(), &self.node_name, payload);

        let state = lock_state(&self.state);
        let mut queued = 0;
        for (id, connection) in state
            .connections
            .iter()
            .filter(|(_, c)| c.channels.contains(&self.channel))
        {
            match connection.queue.send(message.clone()) {
                Ok(()) => queued += 1,
                Err(_) => debug!(connection = %id, "Writer already gone, skipping"),
            }
        }

        trace!(channel = %self.channel, message_id = %message.message_id, queued, "Dispatched message");
    }

    /// Typed view of this sender.
    pub fn typed<T: Serialize>(self) -> ChannelSender<T> {
        ChannelSender {
            inner: self,
            marker: PhantomData,
        }
    }
}

impl fmt::Debug for MulticastSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastSender")
            .field("channel", &self.channel)
            .finish()
    }
}

/// Multicast sender for messages of type `T`.
pub struct ChannelSender<T> {
    inner: MulticastSender,
    marker: PhantomData<fn(&T)>,
}

impl<T: Serialize> ChannelSender<T> {
    pub fn channel(&self) -> &ChannelKey {
        self.inner.channel()
    }

    /// Encodes `message` and fans it out. A message that cannot be encoded
    /// is logged and dropped.
    pub fn dispatch(&self, message: &T) {
        match serde_json::to_value(message) {
            Ok(payload) => self.inner.dispatch(payload),
            Err(e) => {
                warn!(channel = %self.inner.channel, error = %e, "Failed to encode message, dropping");
            }
        }
    }
}

impl<T> Clone for ChannelSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ChannelSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSender")
            .field("channel", &self.inner.channel)
            .finish()
    }
}
