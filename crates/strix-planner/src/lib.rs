//! Strix planner
//!
//! Pure, synchronous planning over an immutable catalog:
//! - [`Partitioner`] splits a candidate pool into execution bundles
//! - [`resolve`] turns a bundle into the command line of one execution
//! - [`PlanBuilder`] orders process steps, links dependencies and plans
//!   one execution per bundle
//! - [`fan_out`] re-partitions a dependent execution once upstream
//!   findings are known

pub mod error;
pub mod partition;
pub mod plan;
pub mod resolve;

pub use error::{PlanError, ResolveError};
pub use partition::{Bundle, Partitioner};
pub use plan::{
    fan_out, DroppedStep, Plan, PlanBuilder, PlannedExecution, PlannedStep, TaskSubject,
};
pub use resolve::{check, resolve, tokenize, ResolveContext, ResolvedCommand};
