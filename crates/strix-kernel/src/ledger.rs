//! Task and execution ledger
//!
//! Authoritative record of every task and execution status. Execution
//! transitions are validated against the state machine under the record's
//! map-entry lock; task finalization re-reads every sibling status and
//! stamps the end time exactly once.
//!
//! Lock order: an execution entry is never held while a task entry is
//! acquired.

use crate::error::LifecycleError;
use crate::state_machine::{validate_transition, ExecutionStatus, TaskStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use strix_model::{ExecutionId, StepId, TaskId};

/// Persisted view of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    /// Identity
    pub id: TaskId,
    /// Human readable subject, e.g. `process recon`
    pub subject: String,
    /// Target address
    pub target: String,
    /// Aggregate status
    pub status: TaskStatus,
    /// Admission time
    pub created: DateTime<Utc>,
    /// First execution start
    pub start: Option<DateTime<Utc>>,
    /// Finalization time, stamped once
    pub end: Option<DateTime<Utc>>,
    /// Set by every cancellation, including one arriving after the end
    pub cancel_requested: bool,
    /// Executions in creation order
    pub executions: Vec<ExecutionId>,
}

impl TaskRecord {
    /// New requested task
    #[must_use]
    pub fn new(id: TaskId, subject: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id,
            subject: subject.into(),
            target: target.into(),
            status: TaskStatus::Requested,
            created: Utc::now(),
            start: None,
            end: None,
            cancel_requested: false,
            executions: Vec::new(),
        }
    }
}

/// Persisted view of an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    /// Identity
    pub id: ExecutionId,
    /// Owning task
    pub task: TaskId,
    /// Originating step
    pub step: Option<StepId>,
    /// `tool/configuration`
    pub configuration: String,
    /// Dependency depth
    pub group: u32,
    /// Status
    pub status: ExecutionStatus,
    /// Start of the run
    pub start: Option<DateTime<Utc>>,
    /// Terminal transition time
    pub end: Option<DateTime<Utc>>,
    /// Report artifact path
    pub output_file: Option<String>,
    /// Console output
    pub output_plain: Option<String>,
    /// Error text for skips and failures
    pub output_error: Option<String>,
}

impl ExecutionRecord {
    /// New requested execution
    #[must_use]
    pub fn new(id: ExecutionId, task: TaskId, step: Option<StepId>, configuration: impl Into<String>, group: u32) -> Self {
        Self {
            id,
            task,
            step,
            configuration: configuration.into(),
            group,
            status: ExecutionStatus::Requested,
            start: None,
            end: None,
            output_file: None,
            output_plain: None,
            output_error: None,
        }
    }
}

/// Outcome of [`Ledger::cancel_task`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cancellation {
    /// Executions moved to cancelled by this call
    pub executions: Vec<ExecutionId>,
    /// Whether this call finalized the task
    pub finalized: bool,
}

/// Concurrent ledger of tasks and executions
#[derive(Debug, Default)]
pub struct Ledger {
    tasks: DashMap<TaskId, TaskRecord>,
    executions: DashMap<ExecutionId, ExecutionRecord>,
}

impl Ledger {
    /// Empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task
    pub fn insert_task(&self, record: TaskRecord) {
        tracing::debug!(task = %record.id, subject = %record.subject, "task recorded");
        self.tasks.insert(record.id, record);
    }

    /// Register an execution under its task. A finalized task takes no
    /// new executions.
    pub fn insert_execution(&self, record: ExecutionRecord) -> Result<(), LifecycleError> {
        let id = record.id;
        {
            let mut task = self
                .tasks
                .get_mut(&record.task)
                .ok_or(LifecycleError::UnknownTask(record.task))?;
            if task.end.is_some() {
                return Err(LifecycleError::TaskEnded(record.task));
            }
            if !task.executions.contains(&id) {
                task.executions.push(id);
            }
        }
        self.executions.insert(id, record);
        Ok(())
    }

    /// Snapshot of a task
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<TaskRecord> {
        self.tasks.get(&id).map(|r| r.clone())
    }

    /// Snapshot of an execution
    #[must_use]
    pub fn execution(&self, id: ExecutionId) -> Option<ExecutionRecord> {
        self.executions.get(&id).map(|r| r.clone())
    }

    /// Executions of a task in creation order
    pub fn executions_of(&self, task: TaskId) -> Result<Vec<ExecutionRecord>, LifecycleError> {
        let ids = self
            .tasks
            .get(&task)
            .map(|t| t.executions.clone())
            .ok_or(LifecycleError::UnknownTask(task))?;
        Ok(ids.into_iter().filter_map(|id| self.execution(id)).collect())
    }

    /// Every task, oldest first
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = self.tasks.iter().map(|r| r.clone()).collect();
        tasks.sort_by_key(|t| (t.created, t.id));
        tasks
    }

    /// Apply a validated transition and return the updated snapshot.
    /// The first start of an execution also marks its task running.
    pub fn transition(&self, id: ExecutionId, to: ExecutionStatus) -> Result<ExecutionRecord, LifecycleError> {
        let snapshot = {
            let mut record = self
                .executions
                .get_mut(&id)
                .ok_or(LifecycleError::UnknownExecution(id))?;
            validate_transition(record.status, to)?;
            let now = Utc::now();
            record.status = to;
            if to == ExecutionStatus::Running {
                record.start = Some(now);
            }
            if to.is_terminal() {
                record.end = Some(now);
            }
            record.clone()
        };

        if to == ExecutionStatus::Running {
            if let Some(mut task) = self.tasks.get_mut(&snapshot.task) {
                if task.status == TaskStatus::Requested {
                    task.status = TaskStatus::Running;
                }
                if task.start.is_none() {
                    task.start = snapshot.start;
                }
            }
        }
        tracing::debug!(execution = %id, status = %to, "execution transition");
        Ok(snapshot)
    }

    /// Mutate the non-status fields of an execution
    pub fn update_execution<F>(&self, id: ExecutionId, update: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(&mut ExecutionRecord),
    {
        let mut record = self
            .executions
            .get_mut(&id)
            .ok_or(LifecycleError::UnknownExecution(id))?;
        let status = record.status;
        update(&mut record);
        record.status = status;
        Ok(())
    }

    /// Finalize the task if every execution is terminal.
    ///
    /// Returns the final status only to the caller that performed the
    /// finalization; concurrent callers racing on the last terminal
    /// transitions get `None`.
    pub fn finalize_if_drained(&self, task: TaskId) -> Result<Option<TaskStatus>, LifecycleError> {
        let mut record = self.tasks.get_mut(&task).ok_or(LifecycleError::UnknownTask(task))?;
        if record.end.is_some() {
            return Ok(None);
        }

        let mut statuses = Vec::with_capacity(record.executions.len());
        for id in &record.executions {
            let status = self
                .executions
                .get(id)
                .map(|e| e.status)
                .ok_or(LifecycleError::UnknownExecution(*id))?;
            if !status.is_terminal() {
                return Ok(None);
            }
            statuses.push(status);
        }

        let status = TaskStatus::aggregate(statuses);
        record.status = status;
        record.end = Some(Utc::now());
        tracing::info!(task = %task, status = %status, executions = record.executions.len(), "task finalized");
        Ok(Some(status))
    }

    /// Finalize a task that could not be planned. Returns `false` when the
    /// task was already finalized.
    pub fn fail_task(&self, task: TaskId) -> Result<bool, LifecycleError> {
        let mut record = self.tasks.get_mut(&task).ok_or(LifecycleError::UnknownTask(task))?;
        if record.end.is_some() {
            return Ok(false);
        }
        record.status = TaskStatus::Error;
        record.end = Some(Utc::now());
        tracing::warn!(task = %task, "task failed before execution");
        Ok(true)
    }

    /// Finalize a task as cancelled, then cancel every non-terminal
    /// execution it has.
    ///
    /// The end is stamped before the executions are visited, so no
    /// execution can be added behind the cancellation. Only the call that
    /// stamped it reports `finalized`; later calls still cancel stragglers
    /// and set `cancel_requested`.
    pub fn cancel_task(&self, task: TaskId) -> Result<Cancellation, LifecycleError> {
        let (ids, finalized) = {
            let mut record = self.tasks.get_mut(&task).ok_or(LifecycleError::UnknownTask(task))?;
            record.cancel_requested = true;
            let finalized = record.end.is_none();
            if finalized {
                record.status = TaskStatus::Cancelled;
                record.end = Some(Utc::now());
            }
            (record.executions.clone(), finalized)
        };

        let mut executions = Vec::new();
        for id in ids {
            match self.transition(id, ExecutionStatus::Cancelled) {
                Ok(_) => executions.push(id),
                Err(e) if e.is_stale() => {}
                Err(e) => return Err(e),
            }
        }
        tracing::info!(task = %task, cancelled = executions.len(), finalized, "task cancelled");
        Ok(Cancellation { executions, finalized })
    }
}
