//! Completion events sent from workers to the task aggregator

use crate::state_machine::ExecutionStatus;
use serde::Serialize;
use strix_model::{ExecutionId, TaskId};

/// Emitted by a worker after a terminal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionEvent {
    /// Terminated execution
    pub execution: ExecutionId,
    /// Owning task
    pub task: TaskId,
    /// Terminal status
    pub status: ExecutionStatus,
}

