//! Execution and task lifecycles
//!
//! `Requested -> Running -> {Completed, Error, Skipped}`; cancellation is
//! accepted from every non-terminal state. Terminal states have no exits.

use crate::error::LifecycleError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, waiting in the queue
    Requested,
    /// Picked up by a worker
    Running,
    /// Ran cleanly, findings persisted
    Completed,
    /// Tool fault or runtime failure
    Error,
    /// Missing argument or tool not installed
    Skipped,
    /// Task cancelled before the execution finished
    Cancelled,
}

impl ExecutionStatus {
    /// Every status
    pub const ALL: [Self; 6] = [
        Self::Requested,
        Self::Running,
        Self::Completed,
        Self::Error,
        Self::Skipped,
        Self::Cancelled,
    ];

    /// Whether no transition leaves this status
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Skipped | Self::Cancelled)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Aggregate status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Admitted, nothing started yet
    Requested,
    /// At least one execution started
    Running,
    /// Every execution completed or skipped
    Completed,
    /// At least one execution failed
    Error,
    /// Cancelled by a user
    Cancelled,
}

impl TaskStatus {
    /// Whether the task is finalized
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    /// Aggregate of fully terminated sibling executions
    #[must_use]
    pub fn aggregate(statuses: impl IntoIterator<Item = ExecutionStatus>) -> Self {
        if statuses.into_iter().any(|s| s == ExecutionStatus::Error) {
            Self::Error
        } else {
            Self::Completed
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Validate an execution transition
pub fn validate_transition(from: ExecutionStatus, to: ExecutionStatus) -> Result<(), LifecycleError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(LifecycleError::IllegalTransition { from, to })
    }
}

/// Statuses reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: ExecutionStatus) -> Vec<ExecutionStatus> {
    use ExecutionStatus::{Cancelled, Completed, Error, Requested, Running, Skipped};
    match from {
        Requested => vec![Running, Cancelled],
        Running => vec![Completed, Error, Skipped, Cancelled],
        Completed | Error | Skipped | Cancelled => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_transitions() {
        assert!(validate_transition(ExecutionStatus::Requested, ExecutionStatus::Running).is_ok());
        assert!(validate_transition(ExecutionStatus::Requested, ExecutionStatus::Cancelled).is_ok());
        assert!(validate_transition(ExecutionStatus::Requested, ExecutionStatus::Completed).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in ExecutionStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            assert!(allowed_transitions(from).is_empty());
        }
    }

    #[test]
    fn test_aggregate() {
        use ExecutionStatus::{Completed, Error, Skipped};
        assert_eq!(TaskStatus::aggregate([Completed, Skipped]), TaskStatus::Completed);
        assert_eq!(TaskStatus::aggregate([Completed, Error]), TaskStatus::Error);
        assert_eq!(TaskStatus::aggregate(Vec::new()), TaskStatus::Completed);
    }
}
