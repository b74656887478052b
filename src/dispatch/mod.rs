//! The `dispatch` module holds the small set of traits that connect the
//! stages of a message pipeline.
//!
//! - [`Dispatch`] is a synchronous, non-blocking hand-off (enqueue, filter,
//!   forward to a transport).
//! - [`Handler`] is the asynchronous end of a pipeline, allowed to do I/O.
//! - [`DispatchFailureHandler`] decides what happens to a message whose
//!   delivery failed; [`DiscardingFailureHandler`] logs and drops it.

mod failure;

pub use failure::{DiscardingFailureHandler, DispatchFailureHandler};

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::utils::error::DispatchError;

/// Synchronous hand-off of a message to the next stage.
///
/// Implementations must not block; anything slow belongs behind a queue.
pub trait Dispatch<M>: Send + Sync {
    fn dispatch(&self, message: M) -> Result<(), DispatchError>;
}

impl<M, D> Dispatch<M> for Arc<D>
where
    D: Dispatch<M> + ?Sized,
{
    fn dispatch(&self, message: M) -> Result<(), DispatchError> {
        (**self).dispatch(message)
    }
}

/// Asynchronous consumer sitting at the end of a pipeline.
pub trait Handler<M>: Send + Sync {
    fn handle(&self, message: M) -> BoxFuture<'_, Result<(), DispatchError>>;
}
