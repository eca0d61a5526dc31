//! Collaborators notified when a task finishes

use crate::error::ObserverError;
use async_trait::async_trait;
use strix_kernel::{FindingRecord, TaskRecord};

/// Receives finished tasks together with the findings they produced.
///
/// Observers run outside the aggregation path; a failing observer is
/// logged and never affects task state.
#[async_trait]
pub trait TaskObserver: Send + Sync {
    /// Observer name used in logs
    fn name(&self) -> &'static str;

    /// Called once per finished task
    async fn on_task_finished(&self, task: &TaskRecord, findings: &[FindingRecord]) -> Result<(), ObserverError>;
}

/// Observer writing a summary line per finished task
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

#[async_trait]
impl TaskObserver for TracingObserver {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn on_task_finished(&self, task: &TaskRecord, findings: &[FindingRecord]) -> Result<(), ObserverError> {
        tracing::info!(
            task = %task.id,
            subject = %task.subject,
            target = %task.target,
            status = %task.status,
            findings = findings.len(),
            "task finished"
        );
        Ok(())
    }
}
