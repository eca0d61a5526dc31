//! Error types for the Strix engine
//!
//! - [`EngineError`]: failures of the engine API (admission, lookups, config)
//! - [`ExecutionFault`]: why one execution did not complete; decides
//!   between SKIPPED and ERROR
//! - [`ObserverError`]: collaborator notification failures, logged only

use std::path::PathBuf;
use strix_kernel::{LifecycleError, QueueError};
use strix_model::{CatalogError, TaskId};
use strix_planner::{PlanError, ResolveError};

/// Engine API error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Task rejected by the planner
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    /// Ledger inconsistency
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Queue rejected a job
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Catalog could not be loaded
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Unknown task
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// Engine configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem failure
    #[error("io error on {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The engine is shutting down
    #[error("engine is shutting down")]
    ShuttingDown,
}

impl EngineError {
    /// Whether the request was rejected because of its content
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Plan(_) | Self::UnknownTask(_))
    }
}

/// Reason an execution did not complete
#[derive(Debug, thiserror::Error)]
pub enum ExecutionFault {
    /// Tool binary not found
    #[error("tool '{0}' is not installed")]
    ToolNotInstalled(String),

    /// Command line could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Nonzero exit, timeout or process failure
    #[error("{tool} failed: {message}")]
    ToolFault {
        /// Tool name
        tool: String,
        /// Exit code, when the process exited
        exit_code: Option<i32>,
        /// Diagnostic text
        message: String,
    },

    /// Output could not be parsed
    #[error("output of {tool} could not be parsed: {message}")]
    Parse {
        /// Tool name
        tool: String,
        /// Diagnostic text
        message: String,
    },

    /// Report artifact could not be prepared
    #[error("io error on {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl ExecutionFault {
    /// Whether the execution is SKIPPED rather than ERROR
    #[inline]
    #[must_use]
    pub fn is_skip(&self) -> bool {
        match self {
            Self::ToolNotInstalled(_) => true,
            Self::Resolve(e) => e.is_skip(),
            Self::ToolFault { .. } | Self::Parse { .. } | Self::Io { .. } => false,
        }
    }
}

/// Collaborator notification failure
#[derive(Debug, thiserror::Error)]
#[error("observer {observer} failed: {message}")]
pub struct ObserverError {
    /// Observer name
    pub observer: String,
    /// Diagnostic text
    pub message: String,
}
