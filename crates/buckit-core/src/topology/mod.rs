//! Supervision of the service's long-running loops.
//!
//! Every loop is expected to run until shutdown is requested. A loop that
//! returns for any other reason, fails, or panics takes the whole process
//! down so an external supervisor can restart it.

mod task;

pub use task::{BoxFuture, Task, TaskError, TaskResult};

use std::collections::HashMap;
use std::fmt;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// How a loop ended when it was not supposed to.
#[derive(Debug)]
pub enum ExitReason {
    /// Returned `Ok` without shutdown being requested.
    Completed,
    /// Returned an error or panicked.
    Failed(TaskError),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// A loop that exited unexpectedly.
#[derive(Debug)]
pub struct LoopExit {
    pub name: &'static str,
    pub reason: ExitReason,
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the {} loop exited unexpectedly: {}", self.name, self.reason)
    }
}

impl std::error::Error for LoopExit {}

/// Run `tasks` concurrently until they all stop.
///
/// Returns `Ok` only if every task returned `Ok` after `shutdown` was
/// cancelled. The first unexpected exit cancels `shutdown`, aborts the
/// remaining tasks and is returned as the error.
pub async fn run_until_exit(tasks: Vec<Task>, shutdown: CancellationToken) -> Result<(), LoopExit> {
    let mut set = JoinSet::new();
    let mut names = HashMap::new();

    for task in tasks {
        let handle = set.spawn(task.future);
        names.insert(handle.id(), task.name);
    }

    info!("Spawned {} loops", set.len());

    while let Some(joined) = set.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => (e.id(), Err(TaskError::Panicked(e.to_string()))),
        };
        let name = names.get(&id).copied().unwrap_or("unknown");

        let reason = match result {
            Ok(()) if shutdown.is_cancelled() => {
                info!(task = name, "Loop stopped");
                continue;
            }
            Ok(()) => ExitReason::Completed,
            Err(e) => ExitReason::Failed(e),
        };

        error!(
            task = name,
            "The {} loop completed unexpectedly [{}]. Terminating the server.", name, reason
        );
        shutdown.cancel();
        set.abort_all();
        return Err(LoopExit { name, reason });
    }

    info!("All loops stopped");
    Ok(())
}
