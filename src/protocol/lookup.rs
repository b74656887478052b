use std::collections::HashSet;

use tracing::{debug, trace};

use crate::channel::ChannelKey;
use crate::protocol::stack::{Protocol, ProtocolContext};
use crate::protocol::DiscoveryMessage;

/// Correlates channel lookups with availability announcements.
///
/// Availability of a channel is only passed up once this layer has seen a
/// lookup for it go down. Channels stay requested for the lifetime of the
/// layer, since several providers may announce the same channel over time;
/// deduplicating individual responses is left to the layer above.
#[derive(Debug, Default)]
pub struct ChannelLookupProtocol {
    requested: HashSet<ChannelKey>,
}

impl ChannelLookupProtocol {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Protocol<DiscoveryMessage> for ChannelLookupProtocol {
    fn handle_outgoing(
        &mut self,
        message: DiscoveryMessage,
        context: &mut ProtocolContext<DiscoveryMessage>,
    ) {
        if let DiscoveryMessage::LookupRequest { channel, .. } = &message {
            if self.requested.insert(channel.clone()) {
                debug!(%channel, "Looking up channel");
            }
        }
        context.dispatch_outgoing(message);
    }

    fn handle_incoming(
        &mut self,
        message: DiscoveryMessage,
        context: &mut ProtocolContext<DiscoveryMessage>,
    ) {
        if let DiscoveryMessage::ChannelAvailable { channel, .. } = &message {
            if !self.requested.contains(channel) {
                trace!(%channel, "Ignoring availability of channel never looked up");
                return;
            }
        }
        context.dispatch_incoming(message);
    }

    fn stop(&mut self) {
        self.requested.clear();
    }
}
