//! Error types for the Strix kernel

use crate::state_machine::ExecutionStatus;
use strix_model::{ExecutionId, TaskId};

/// Execution or task lifecycle failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// Transition not allowed by the state machine
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current status
        from: ExecutionStatus,
        /// Requested status
        to: ExecutionStatus,
    },

    /// Unknown execution
    #[error("unknown execution: {0}")]
    UnknownExecution(ExecutionId),

    /// Unknown task
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// The task is already finalized and takes no new executions
    #[error("task already finalized: {0}")]
    TaskEnded(TaskId),
}

impl LifecycleError {
    /// Whether the operation lost a race against another terminal transition
    /// (e.g. a cancellation) and can be ignored
    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        match self {
            Self::IllegalTransition { from, .. } => from.is_terminal(),
            Self::TaskEnded(_) => true,
            Self::UnknownExecution(_) | Self::UnknownTask(_) => false,
        }
    }
}

/// Work queue failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue no longer accepts jobs
    #[error("work queue closed")]
    Closed,

    /// A job with this id is already queued
    #[error("job already queued: {0}")]
    Duplicate(ExecutionId),
}
