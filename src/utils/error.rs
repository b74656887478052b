//! The `error` module defines the error types used within `chanlink`.
//!
//! Discovery and connection failures never reach callers of
//! `add_outgoing`; these types surface through connectors, the stack's
//! failure handler and `stop()`.

use thiserror::Error;

use crate::address::Address;

/// Failure to establish or use a point-to-point connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection to {address} timed out after {timeout_ms}ms")]
    Timeout { address: Address, timeout_ms: u64 },

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: Address,
        #[source]
        source: tungstenite::Error,
    },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("connection refused by {0}")]
    Refused(Address),
}

/// Failure to hand a message to the next stage of a pipeline.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The receiving component has been stopped.
    #[error("{0} has been stopped")]
    Stopped(String),

    #[error("dispatch failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("handler panicked while processing message")]
    Panicked,
}

impl DispatchError {
    pub fn failed<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DispatchError::Failed(Box::new(error))
    }
}

/// Failure of one or more components to shut down cleanly.
#[derive(Debug, Error)]
pub enum StopError {
    #[error("{component} failed to stop: {reason}")]
    Component { component: String, reason: String },

    #[error("{} component(s) failed to stop: {}", .0.len(), join_failures(.0))]
    Composite(Vec<StopError>),
}

fn join_failures(failures: &[StopError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure to set up a broadcaster.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}
