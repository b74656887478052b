//! The `connection` module defines the point-to-point side of the system:
//! how an [`Address`] becomes a live [`Connection`] that messages can be
//! written to.
//!
//! [`websocket`] provides the implementation used in production, which
//! speaks JSON text frames over a WebSocket.

pub mod websocket;

use std::future::Future;
use std::sync::Arc;

use crate::address::Address;
use crate::hub::Message;
use crate::utils::error::ConnectionError;

/// A send-only connection to one remote endpoint.
pub trait Connection: Send + 'static {
    fn send(&mut self, message: Message) -> impl Future<Output = Result<(), ConnectionError>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Establishes outgoing connections.
pub trait OutgoingConnector: Send + Sync + 'static {
    type Connection: Connection;

    fn connect(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<Self::Connection, ConnectionError>> + Send;
}

impl<C: OutgoingConnector> OutgoingConnector for Arc<C> {
    type Connection = C::Connection;

    fn connect(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<Self::Connection, ConnectionError>> + Send {
        (**self).connect(address)
    }
}

#[cfg(test)]
mod tests;
