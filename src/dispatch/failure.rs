use std::fmt::Debug;

use tracing::warn;

use crate::utils::error::DispatchError;

/// Receives messages whose dispatch failed.
pub trait DispatchFailureHandler<M>: Send + Sync {
    fn dispatch_failed(&self, message: &M, failure: &DispatchError);
}

/// Logs the failure and drops the message.
#[derive(Debug, Clone)]
pub struct DiscardingFailureHandler {
    component: String,
}

impl DiscardingFailureHandler {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl<M: Debug> DispatchFailureHandler<M> for DiscardingFailureHandler {
    fn dispatch_failed(&self, message: &M, failure: &DispatchError) {
        warn!(
            component = %self.component,
            ?message,
            error = %failure,
            "Failed to dispatch message, discarding"
        );
    }
}
