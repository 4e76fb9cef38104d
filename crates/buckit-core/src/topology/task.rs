//! Named long-running tasks.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// A boxed future that produces a TaskResult.
pub type BoxFuture = Pin<Box<dyn Future<Output = TaskResult> + Send + 'static>>;

/// Result type for task execution.
pub type TaskResult = Result<(), TaskError>;

/// Why a task stopped other than by returning `Ok`.
#[derive(Debug)]
pub enum TaskError {
    /// Task panicked during execution.
    Panicked(String),
    /// Task returned an error.
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panicked(msg) => write!(f, "task panicked: {msg}"),
            Self::Failed(err) => write!(f, "task failed: {err}"),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(err) => Some(err.as_ref()),
            Self::Panicked(_) => None,
        }
    }
}

impl TaskError {
    /// Create a Failed error from any error type.
    pub fn failed<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed(Box::new(err))
    }

    pub fn is_panicked(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

/// A long-running loop identified by name for logging and exit reporting.
pub struct Task {
    pub name: &'static str,
    pub future: BoxFuture,
}

impl Task {
    pub fn new<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            name,
            future: Box::pin(future),
        }
    }

    /// Wrap a future returning any error type.
    pub fn from_result<F, E>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(name, async move { future.await.map_err(TaskError::failed) })
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
