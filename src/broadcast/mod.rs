//! The `broadcast` module ties discovery, connections and the hub together.
//!
//! - [`OutgoingBroadcast`] looks channels up in its group and fans messages
//!   out to every provider that answers.
//! - [`IncomingBroadcast`] serves channels on a WebSocket listener and
//!   answers the lookups of its group.

pub mod incoming;
pub mod outgoing;
mod state;

pub use incoming::IncomingBroadcast;
pub use outgoing::OutgoingBroadcast;
