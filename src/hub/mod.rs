pub mod engine;
pub mod message;
pub mod receiver;
pub mod sender;

pub use engine::{ClosedListener, ConnectionId, MessageHub};
pub use message::Message;
pub use receiver::ChannelReceiver;
pub use sender::{ChannelSender, MulticastSender};

#[cfg(test)]
mod tests;
