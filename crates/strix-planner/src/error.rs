//! Error types for the Strix planner
//!
//! - Argument resolution failures, split into skips and faults
//! - Plan building failures (unknown subjects, no admissible intensity)

use strix_model::template::TemplateError;
use strix_model::IntensityRank;

/// Argument resolution failure for one bundle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A required argument found no usable entity
    #[error("argument '{argument}' is required to execute tool '{tool}'")]
    MissingArgument {
        /// Argument name
        argument: String,
        /// Tool name
        tool: String,
    },

    /// A template could not be rendered
    #[error("template of {owner} cannot be rendered: {source}")]
    Template {
        /// `tool/configuration[/argument]`
        owner: String,
        /// Underlying error
        #[source]
        source: TemplateError,
    },
}

impl ResolveError {
    /// Whether the execution should be skipped rather than failed
    #[inline]
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::MissingArgument { .. })
    }
}

/// Plan building failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Unknown tool
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Unknown configuration
    #[error("unknown configuration {configuration} for tool {tool}")]
    UnknownConfiguration {
        /// Tool name
        tool: String,
        /// Configuration name
        configuration: String,
    },

    /// Unknown process
    #[error("unknown process: {0}")]
    UnknownProcess(String),

    /// Nothing can run at the requested intensity
    #[error("{subject} has no intensity at or below {requested}")]
    NoAdmissibleIntensity {
        /// Tool or process name
        subject: String,
        /// Requested ceiling
        requested: IntensityRank,
    },

    /// Step dependencies are cyclic
    #[error("step dependencies contain a cycle")]
    CyclicPlan,
}
