//! Strix core - the task engine
//!
//! Ties the planner and the kernel together behind the [`Engine`] facade:
//! - admits tasks and plans their executions
//! - runs executions on a worker pool through a [`ToolRunner`]
//! - parses tool output into findings with [`OutputParser`]s
//! - finalizes tasks and notifies [`TaskObserver`]s
//!
//! # Example
//!
//! ```rust,ignore
//! use strix_core::prelude::*;
//!
//! # async fn example(catalog: Catalog) -> Result<(), EngineError> {
//! let engine = Engine::builder(Arc::new(catalog)).build()?;
//! let task = engine.create_task(TaskRequest::new(
//!     TaskSubject::process("recon"),
//!     TargetScope::new("10.0.0.1").with_port(80),
//!     IntensityRank::Normal,
//! ))?;
//! let record = engine.wait_for(task).await?;
//! println!("{} finished {}", record.id, record.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod observer;
pub mod parser;
pub mod runner;
pub mod types;
mod worker;

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, ExecutionFault, ObserverError};
pub use observer::{TaskObserver, TracingObserver};
pub use parser::{GreppableNmapParser, OutputParser, ParseInput, ParserRegistry};
pub use runner::{ProcessRunner, RunOutput, RunRequest, ToolRunner};
pub use types::{ExecutionPayload, Schedule, TaskRequest};

/// Commonly used types
pub mod prelude {
    pub use crate::{
        Engine, EngineConfig, EngineError, ExecutionFault, TaskObserver, TaskRequest, ToolRunner,
    };
    pub use std::sync::Arc;
    pub use strix_kernel::{ExecutionStatus, FindingQuery, TaskStatus};
    pub use strix_model::{Catalog, IntensityRank, TargetScope};
    pub use strix_planner::TaskSubject;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
