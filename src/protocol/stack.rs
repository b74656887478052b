//! A single-layer protocol stack driven by a dedicated worker task.
//!
//! ```text
//!   top handler (async)          <- incoming    ^
//!   [ top endpoint ]                             |
//!   [ Protocol layer ]  runs on the stack worker |
//!   [ bottom endpoint ]                          |
//!   bottom sink (transport)      -> outgoing     v
//! ```
//!
//! Both endpoints only enqueue, so they can be called from any thread
//! without blocking. The worker takes events off the queue one at a time,
//! runs them through the protocol layer and delivers whatever the layer
//! produced. A failing or panicking sink never stops the worker; the
//! failure goes to the stack's [`DispatchFailureHandler`].

use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::debug;

use crate::concurrent::{Stoppable, StoppableExecutor};
use crate::dispatch::{Dispatch, DispatchFailureHandler, Handler};
use crate::utils::error::{DispatchError, StopError};

/// One layer of protocol logic.
///
/// Messages travelling down come from the top endpoint, messages travelling
/// up come from the bottom endpoint. The layer emits its results through
/// the [`ProtocolContext`].
pub trait Protocol<M>: Send + 'static {
    fn handle_outgoing(&mut self, message: M, context: &mut ProtocolContext<M>);

    fn handle_incoming(&mut self, message: M, context: &mut ProtocolContext<M>);

    fn stop(&mut self) {}
}

/// Messages produced by a [`Protocol`] while handling one event.
#[derive(Debug)]
pub struct ProtocolContext<M> {
    outgoing: Vec<M>,
    incoming: Vec<M>,
}

impl<M> Default for ProtocolContext<M> {
    fn default() -> Self {
        Self {
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }
}

impl<M> ProtocolContext<M> {
    /// Sends `message` towards the bottom sink.
    pub fn dispatch_outgoing(&mut self, message: M) {
        self.outgoing.push(message);
    }

    /// Sends `message` towards the top handler.
    pub fn dispatch_incoming(&mut self, message: M) {
        self.incoming.push(message);
    }

    pub fn outgoing(&self) -> &[M] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[M] {
        &self.incoming
    }
}

#[derive(Debug)]
enum StackEvent<M> {
    FromTop(M),
    FromBottom(M),
    Stop,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Top,
    Bottom,
}

/// Entry point into one side of a [`ProtocolStack`].
pub struct StackEndpoint<M> {
    name: Arc<str>,
    side: Side,
    events: mpsc::UnboundedSender<StackEvent<M>>,
    stopped: Arc<AtomicBool>,
}

impl<M> Clone for StackEndpoint<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            side: self.side,
            events: self.events.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

impl<M: Send> Dispatch<M> for StackEndpoint<M> {
    fn dispatch(&self, message: M) -> Result<(), DispatchError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(DispatchError::Stopped(self.name.to_string()));
        }
        let event = match self.side {
            Side::Top => StackEvent::FromTop(message),
            Side::Bottom => StackEvent::FromBottom(message),
        };
        self.events
            .send(event)
            .map_err(|_| DispatchError::Stopped(self.name.to_string()))
    }
}

struct StackWorker<M> {
    protocol: Box<dyn Protocol<M>>,
    events: mpsc::UnboundedReceiver<StackEvent<M>>,
    bottom: Arc<dyn Dispatch<M>>,
    failure_handler: Arc<dyn DispatchFailureHandler<M>>,
}

impl<M> StackWorker<M>
where
    M: Clone + Debug + Send + 'static,
{
    async fn run(mut self, name: Arc<str>, top: Arc<dyn Handler<M>>) {
        debug!(stack = %name, "Protocol stack started");

        while let Some(event) = self.events.recv().await {
            let mut context = ProtocolContext::default();
            match event {
                StackEvent::FromTop(message) => {
                    self.protocol.handle_outgoing(message, &mut context)
                }
                StackEvent::FromBottom(message) => {
                    self.protocol.handle_incoming(message, &mut context)
                }
                StackEvent::Stop => break,
            }

            for message in context.outgoing {
                if let Err(e) = self.bottom.dispatch(message.clone()) {
                    self.failure_handler.dispatch_failed(&message, &e);
                }
            }

            for message in context.incoming {
                let handler = &top;
                let delivered = message.clone();
                let outcome = AssertUnwindSafe(async move { handler.handle(delivered).await })
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => self.failure_handler.dispatch_failed(&message, &e),
                    Err(_) => self
                        .failure_handler
                        .dispatch_failed(&message, &DispatchError::Panicked),
                }
            }
        }

        self.protocol.stop();
        debug!(stack = %name, "Protocol stack stopped");
    }
}

/// Protocol stack with a bottom (wire-facing) and a top
/// (application-facing) endpoint around one [`Protocol`] layer.
///
/// The stack is built first so that its endpoints can be wired into the
/// surrounding components, then [`start`](ProtocolStack::start)ed with the
/// handler receiving messages that come out of the top. Events enqueued
/// before `start` are processed once the worker runs.
pub struct ProtocolStack<M> {
    name: Arc<str>,
    events: mpsc::UnboundedSender<StackEvent<M>>,
    stopped: Arc<AtomicBool>,
    worker: Mutex<Option<StackWorker<M>>>,
}

impl<M> ProtocolStack<M>
where
    M: Clone + Debug + Send + 'static,
{
    pub fn new<P>(
        name: &str,
        protocol: P,
        failure_handler: Arc<dyn DispatchFailureHandler<M>>,
        bottom: Arc<dyn Dispatch<M>>,
    ) -> Self
    where
        P: Protocol<M>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: Arc::from(name),
            events: tx,
            stopped: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(Some(StackWorker {
                protocol: Box::new(protocol),
                events: rx,
                bottom,
                failure_handler,
            })),
        }
    }

    pub fn top(&self) -> StackEndpoint<M> {
        self.endpoint(Side::Top)
    }

    pub fn bottom(&self) -> StackEndpoint<M> {
        self.endpoint(Side::Bottom)
    }

    fn endpoint(&self, side: Side) -> StackEndpoint<M> {
        StackEndpoint {
            name: self.name.clone(),
            side,
            events: self.events.clone(),
            stopped: self.stopped.clone(),
        }
    }

    /// Spawns the worker on `executor`, delivering upward messages to `top`.
    pub fn start(
        &self,
        executor: &StoppableExecutor,
        top: Arc<dyn Handler<M>>,
    ) -> Result<(), DispatchError> {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| DispatchError::Stopped(self.name.to_string()))?;
        executor.spawn(worker.run(self.name.clone(), top))
    }

    /// Rejects further messages and tells the worker to exit once it has
    /// drained everything enqueued so far.
    fn signal_stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // never started: drop the queue and the protocol right away
        if let Some(mut worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            worker.protocol.stop();
            return;
        }
        let _ = self.events.send(StackEvent::Stop);
    }
}

impl<M> Stoppable for ProtocolStack<M>
where
    M: Clone + Debug + Send + 'static,
{
    fn stop(&self) -> BoxFuture<'_, Result<(), StopError>> {
        self.signal_stop();
        Box::pin(async { Ok(()) })
    }
}
