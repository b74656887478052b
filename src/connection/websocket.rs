//! WebSocket transport
//!
//! Outgoing side: [`WebSocketConnector`] dials `ws://{address}` and every
//! [`Message`] is written as one JSON text frame.
//!
//! Incoming side: [`accept_connections`] accepts peers on a listener, reads
//! their frames and routes each decoded message to the receiver registered
//! for its channel. Frames for channels nobody serves, and frames that do
//! not decode, are logged and dropped.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::address::Address;
use crate::channel::ChannelKey;
use crate::concurrent::StoppableExecutor;
use crate::config::ConnectorSettings;
use crate::connection::{Connection, OutgoingConnector};
use crate::hub::Message;
use crate::utils::error::ConnectionError;

/// Per-channel destinations for inbound messages.
pub type Routes = Arc<Mutex<HashMap<ChannelKey, mpsc::UnboundedSender<Message>>>>;

/// Connects to providers over WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn from_settings(settings: &ConnectorSettings) -> Self {
        Self::new(Duration::from_millis(settings.connect_timeout_ms))
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::from_settings(&ConnectorSettings::default())
    }
}

impl OutgoingConnector for WebSocketConnector {
    type Connection = WebSocketConnection;

    async fn connect(&self, address: &Address) -> Result<WebSocketConnection, ConnectionError> {
        let url = format!("ws://{address}");
        let attempt = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str())).await;

        match attempt {
            Err(_) => Err(ConnectionError::Timeout {
                address: address.clone(),
                timeout_ms: millis(self.connect_timeout),
            }),
            Ok(Err(source)) => Err(ConnectionError::Connect {
                address: address.clone(),
                source,
            }),
            Ok(Ok((stream, _response))) => {
                debug!(%address, "WebSocket connection established");
                Ok(WebSocketConnection {
                    address: address.clone(),
                    stream,
                })
            }
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Send-only WebSocket connection to one provider.
pub struct WebSocketConnection {
    address: Address,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection for WebSocketConnection {
    async fn send(&mut self, message: Message) -> Result<(), ConnectionError> {
        let text = serde_json::to_string(&message)?;
        self.stream.send(WsMessage::text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(address = %self.address, error = %e, "Error while closing WebSocket");
        }
    }
}

/// Accepts peers on `listener` until `shutdown` turns true.
///
/// Each peer is read by its own task spawned on `executor`.
pub async fn accept_connections(
    listener: TcpListener,
    routes: Routes,
    executor: Arc<StoppableExecutor>,
    shutdown: watch::Receiver<bool>,
) {
    let mut stop = shutdown.clone();
    match listener.local_addr() {
        Ok(addr) => info!("WebSocket listener accepting on ws://{addr}"),
        Err(e) => warn!(error = %e, "WebSocket listener has no local address"),
    }

    loop {
        tokio::select! {
            _ = stopped(&mut stop) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let reader = read_from(stream, peer, routes.clone(), shutdown.clone());
                    if let Err(e) = executor.spawn(reader) {
                        debug!(%peer, error = %e, "Listener stopping, refusing peer");
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            },
        }
    }

    debug!("WebSocket listener closed");
}

async fn read_from(
    stream: TcpStream,
    peer: SocketAddr,
    routes: Routes,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake error");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            frame = ws_stream.next() => match frame {
                Some(Ok(msg)) if msg.is_text() => {
                    if let Ok(text) = msg.to_text() {
                        route(&routes, peer, text);
                    }
                }
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%peer, error = %e, "WebSocket read error");
                    break;
                }
                None => break,
            },
        }
    }

    debug!(%peer, "Peer disconnected");
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // a dropped sender counts as shutdown too
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

fn route(routes: &Routes, peer: SocketAddr, text: &str) {
    let message = match serde_json::from_str::<Message>(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(
                "Invalid message from {peer}: {err} | {}",
                &text.chars().take(100).collect::<String>()
            );
            return;
        }
    };

    let routes = routes.lock().unwrap_or_else(PoisonError::into_inner);
    match routes.get(&message.channel) {
        Some(receiver) => {
            if receiver.send(message).is_err() {
                debug!(%peer, "Receiver dropped, discarding message");
            }
        }
        None => debug!(%peer, channel = %message.channel, "No receiver for channel"),
    }
}
