use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::utils::error::StopError;

/// A component that can be shut down.
///
/// `stop` must tolerate being called more than once.
pub trait Stoppable: Send + Sync {
    fn stop(&self) -> BoxFuture<'_, Result<(), StopError>>;
}

/// Stops a sequence of components, in insertion order.
///
/// A failing or panicking member never prevents the remaining members from
/// being stopped; all failures are reported together once the sequence has
/// completed.
#[derive(Default)]
pub struct CompositeStoppable {
    parts: Vec<(String, Arc<dyn Stoppable>)>,
}

impl CompositeStoppable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, part: Arc<dyn Stoppable>) -> Self {
        self.parts.push((name.into(), part));
        self
    }

    pub async fn stop(self) -> Result<(), StopError> {
        let mut failures = Vec::new();

        for (name, part) in self.parts {
            let outcome = AssertUnwindSafe(async { part.stop().await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => debug!(component = %name, "Stopped"),
                Ok(Err(e)) => {
                    warn!(component = %name, error = %e, "Failed to stop cleanly");
                    failures.push(e);
                }
                Err(_) => {
                    warn!(component = %name, "Panicked while stopping");
                    failures.push(StopError::Component {
                        component: name,
                        reason: "panicked while stopping".to_string(),
                    });
                }
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(StopError::Composite(failures)),
        }
    }
}
