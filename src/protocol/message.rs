use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::channel::ChannelKey;

/// Control-plane message used to find providers of a channel.
///
/// Every message is scoped to a group; broadcasters sharing a discovery
/// transport only ever see the messages of their own group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiscoveryMessage {
    /// "Who serves `channel` in `group`?"
    #[serde(rename = "lookup_request")]
    LookupRequest { group: String, channel: ChannelKey },

    /// "`channel` is served at `address`."
    #[serde(rename = "channel_available")]
    ChannelAvailable {
        group: String,
        channel: ChannelKey,
        address: Address,
    },
}

impl DiscoveryMessage {
    pub fn lookup_request(group: impl Into<String>, channel: ChannelKey) -> Self {
        DiscoveryMessage::LookupRequest {
            group: group.into(),
            channel,
        }
    }

    pub fn channel_available(
        group: impl Into<String>,
        channel: ChannelKey,
        address: Address,
    ) -> Self {
        DiscoveryMessage::ChannelAvailable {
            group: group.into(),
            channel,
            address,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            DiscoveryMessage::LookupRequest { group, .. }
            | DiscoveryMessage::ChannelAvailable { group, .. } => group,
        }
    }

    pub fn channel(&self) -> &ChannelKey {
        match self {
            DiscoveryMessage::LookupRequest { channel, .. }
            | DiscoveryMessage::ChannelAvailable { channel, .. } => channel,
        }
    }
}
