//! Lifecycle plumbing shared by every long-lived component.
//!
//! Components that own tasks or connections implement [`Stoppable`].
//! [`CompositeStoppable`] stops a group of them in order, attempting every
//! member even when an earlier one fails, and [`StoppableExecutor`] owns
//! the tokio tasks a component spawns so that stopping it joins them.

mod executor;
mod stoppable;

pub use executor::StoppableExecutor;
pub use stoppable::{CompositeStoppable, Stoppable};

#[cfg(test)]
mod tests;
