//! The `protocol` module implements the discovery side of the system: the
//! discovery messages, the group filter, the lookup layer and the protocol
//! stack that hosts it.

pub mod filter;
pub mod lookup;
pub mod message;
pub mod stack;

pub use filter::GroupMessageFilter;
pub use lookup::ChannelLookupProtocol;
pub use message::DiscoveryMessage;
pub use stack::{Protocol, ProtocolContext, ProtocolStack, StackEndpoint};
