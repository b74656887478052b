//! # chanlink
//!
//! `chanlink` sends messages to a set of consumers that is neither known
//! up front nor fixed. Consumers announce the channels they serve within a
//! group; producers look channels up, connect to every provider that
//! answers and fan each message out to all of them.
//!
//! ## Core Modules
//!
//! - `broadcast`: the outgoing (producer) and incoming (provider) sides.
//! - `protocol`: discovery messages, the group filter and the lookup stack.
//! - `transport`: carries discovery messages between broadcasters.
//! - `hub`: live connections grouped by channel, with multicast senders.
//! - `connection`: connector and connection traits, WebSocket implementation.
//! - `concurrent` and `dispatch`: lifecycle and pipeline plumbing.
//! - `config`: loading settings from files and the environment.
//! - `utils`: error types and logging setup.

pub mod address;
pub mod broadcast;
pub mod channel;
pub mod concurrent;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod hub;
pub mod protocol;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod testing;

pub use address::Address;
pub use broadcast::{IncomingBroadcast, OutgoingBroadcast};
pub use channel::ChannelKey;
pub use concurrent::Stoppable;
pub use hub::{ChannelReceiver, ChannelSender, Message, MulticastSender};
pub use protocol::DiscoveryMessage;
pub use transport::{DiscoveryConnection, LocalDiscoveryTransport};
