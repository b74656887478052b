//! The `transport` module carries discovery messages between broadcasters.
//!
//! A [`DiscoveryConnection`] is both a sink for outgoing discovery messages
//! and a source of incoming ones, delivered to every handler registered
//! with [`DiscoveryConnection::dispatch_to`]. Group scoping happens above
//! the transport, so one transport can be shared by any number of groups.

mod local;

pub use local::LocalDiscoveryTransport;

use std::sync::Arc;

use crate::dispatch::Dispatch;
use crate::protocol::DiscoveryMessage;

/// Bidirectional discovery transport.
pub trait DiscoveryConnection: Dispatch<DiscoveryMessage> {
    /// Registers `handler` for every discovery message received from now on.
    fn dispatch_to(&self, handler: Arc<dyn Dispatch<DiscoveryMessage>>);
}
