//! Delayed task execution on the tokio runtime.
//!
//! Each scheduled task is its own tokio task: it sleeps on the runtime
//! timer, then runs the closure. Failures and panics are logged and stay
//! contained to that task.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::error;

pub type ScheduledTask = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Cancellable handle to a scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    abort: AbortHandle,
}

impl TaskHandle {
    /// Cancel the task if it has not fired yet. A task whose closure is
    /// already running completes.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

pub trait Scheduler: Send + Sync {
    /// Run `task` no earlier than `delay` from now.
    fn schedule_task(&self, task: ScheduledTask, delay: Duration) -> TaskHandle;
}

#[derive(Debug, Clone)]
pub struct RuntimeScheduler {
    handle: Handle,
}

impl RuntimeScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler bound to the runtime of the calling context.
    pub fn current() -> anyhow::Result<Self> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl Scheduler for RuntimeScheduler {
    fn schedule_task(&self, task: ScheduledTask, delay: Duration) -> TaskHandle {
        let join = self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Scheduled task failed: {:#}", e),
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("Scheduled task panicked: {}", message);
                }
            }
        });
        TaskHandle {
            abort: join.abort_handle(),
        }
    }
}
