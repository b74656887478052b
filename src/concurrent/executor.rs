use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::concurrent::Stoppable;
use crate::utils::error::{DispatchError, StopError};

/// How long `stop` waits for tasks unless configured otherwise.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the tokio tasks spawned on behalf of one component.
///
/// Once stopped, no new tasks are accepted and `stop` waits for every task
/// spawned earlier to finish. Tasks are expected to observe their own
/// shutdown signal (a closed queue, a stop marker, a broadcast); the
/// executor only joins them. Tasks still running when the join timeout
/// runs out are aborted and reported as failures.
#[derive(Debug)]
pub struct StoppableExecutor {
    name: String,
    join_timeout: Duration,
    state: Mutex<ExecutorState>,
}

#[derive(Debug, Default)]
struct ExecutorState {
    stopped: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl StoppableExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            state: Mutex::new(ExecutorState::default()),
        }
    }

    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawns `task` on the current tokio runtime.
    pub fn spawn<F>(&self, task: F) -> Result<(), DispatchError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.stopped {
            return Err(DispatchError::Stopped(self.name.clone()));
        }
        state.tasks.retain(|task| !task.is_finished());
        state.tasks.push(tokio::spawn(task));
        Ok(())
    }

    async fn join_all(&self) -> Result<(), StopError> {
        let tasks = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.stopped = true;
            std::mem::take(&mut state.tasks)
        };

        debug!(executor = %self.name, tasks = tasks.len(), "Joining tasks");

        // one deadline for the whole batch
        let deadline = tokio::time::Instant::now() + self.join_timeout;
        let mut failures = Vec::new();
        for mut task in tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(StopError::Component {
                    component: self.name.clone(),
                    reason: e.to_string(),
                }),
                Err(_) => {
                    warn!(executor = %self.name, "Task did not stop in time, aborting");
                    task.abort();
                    failures.push(StopError::Component {
                        component: self.name.clone(),
                        reason: format!(
                            "task did not stop within {}ms and was aborted",
                            self.join_timeout.as_millis()
                        ),
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

impl Stoppable for StoppableExecutor {
    fn stop(&self) -> BoxFuture<'_, Result<(), StopError>> {
        Box::pin(self.join_all())
    }
}
