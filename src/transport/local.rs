use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace, warn};

use crate::dispatch::Dispatch;
use crate::protocol::DiscoveryMessage;
use crate::transport::DiscoveryConnection;
use crate::utils::error::DispatchError;

type DiscoveryHandler = Arc<dyn Dispatch<DiscoveryMessage>>;

/// In-process discovery bus.
///
/// Every dispatched message is delivered to every registered handler,
/// including the stack of the broadcaster that sent it. A handler that
/// fails is logged and skipped; a handler reporting that it has stopped is
/// unregistered.
#[derive(Default)]
pub struct LocalDiscoveryTransport {
    handlers: Mutex<Vec<DiscoveryHandler>>,
}

impl LocalDiscoveryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Dispatch<DiscoveryMessage> for LocalDiscoveryTransport {
    fn dispatch(&self, message: DiscoveryMessage) -> Result<(), DispatchError> {
        // handlers may dispatch back onto the bus, so never call them locked
        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        trace!(?message, handlers = handlers.len(), "Delivering discovery message");

        let mut stopped = Vec::new();
        for handler in handlers {
            match handler.dispatch(message.clone()) {
                Ok(()) => {}
                Err(DispatchError::Stopped(component)) => {
                    debug!(%component, "Unregistering stopped discovery handler");
                    stopped.push(handler);
                }
                Err(e) => warn!(error = %e, "Discovery handler failed, skipping"),
            }
        }

        if !stopped.is_empty() {
            self.handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|h| !stopped.iter().any(|s| Arc::ptr_eq(h, s)));
        }
        Ok(())
    }
}

impl DiscoveryConnection for LocalDiscoveryTransport {
    fn dispatch_to(&self, handler: DiscoveryHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }
}
