//! Strix kernel
//!
//! Shared mutable state of the engine:
//! - execution and task lifecycles ([`state_machine`])
//! - the authoritative [`Ledger`] with exactly-once task finalization
//! - the dependency-gated [`WorkQueue`]
//! - the [`FindingStore`] with atomic insert-or-merge

pub mod error;
pub mod events;
pub mod ledger;
pub mod queue;
pub mod state_machine;
pub mod store;

pub use error::{LifecycleError, QueueError};
pub use events::CompletionEvent;
pub use ledger::{Cancellation, ExecutionRecord, Ledger, TaskRecord};
pub use queue::{Job, WorkQueue};
pub use state_machine::{allowed_transitions, validate_transition, ExecutionStatus, TaskStatus};
pub use store::{FindingQuery, FindingRecord, FindingStore};
