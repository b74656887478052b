use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::warn;

use crate::channel::ChannelKey;
use crate::hub::Message;

/// Receives the messages of one channel, decoded as `T`.
pub struct ChannelReceiver<T> {
    channel: ChannelKey,
    inner: mpsc::UnboundedReceiver<Message>,
    marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> ChannelReceiver<T> {
    pub fn new(channel: ChannelKey, inner: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            channel,
            inner,
            marker: PhantomData,
        }
    }

    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    /// Waits for the next message that decodes as `T`.
    ///
    /// Messages that do not decode are logged and skipped. Returns `None`
    /// once the channel is no longer served.
    pub async fn recv(&mut self) -> Option<T> {
        while let Some(message) = self.inner.recv().await {
            match serde_json::from_value(message.payload) {
                Ok(decoded) => return Some(decoded),
                Err(e) => warn!(
                    channel = %self.channel,
                    message_id = %message.message_id,
                    sender = %message.sender,
                    error = %e,
                    "Failed to decode message, skipping"
                ),
            }
        }
        None
    }
}

impl<T> fmt::Debug for ChannelReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelReceiver")
            .field("channel", &self.channel)
            .finish()
    }
}
