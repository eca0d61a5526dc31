//! Error types for the Strix model
//!
//! - Input type forest validation failures
//! - Catalog loading and validation failures

use crate::input_type::InputTypeName;
use std::path::PathBuf;

/// Invalid input type forest
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    /// The same input type was declared twice
    #[error("input type declared twice: {0}")]
    DuplicateInputType(InputTypeName),

    /// A parent type is referenced but never declared
    #[error("input type {child} references undeclared parent {parent}")]
    UnknownParentType {
        /// Declaring type
        child: InputTypeName,
        /// Missing parent
        parent: InputTypeName,
    },

    /// Parent links do not form a forest
    #[error("input type graph contains a cycle through {0}")]
    CyclicTypeGraph(InputTypeName),
}

/// Catalog loading error
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Catalog file could not be read
    #[error("failed to read catalog {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Catalog file is not valid TOML for the catalog schema
    #[error("invalid catalog: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two tools share a name
    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    /// Two configurations of one tool share a name
    #[error("duplicate configuration {configuration} for tool {tool}")]
    DuplicateConfiguration {
        /// Tool name
        tool: String,
        /// Configuration name
        configuration: String,
    },

    /// Two processes share a name
    #[error("duplicate process: {0}")]
    DuplicateProcess(String),

    /// A step references an unknown tool
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A step references an unknown configuration
    #[error("unknown configuration {configuration} for tool {tool}")]
    UnknownConfiguration {
        /// Tool name
        tool: String,
        /// Configuration name
        configuration: String,
    },

    /// A tool declares no intensity level
    #[error("tool {0} declares no intensity")]
    NoIntensities(String),

    /// An argument declares no input
    #[error("argument {argument} of {owner} declares no input")]
    ArgumentWithoutInputs {
        /// `tool/configuration`
        owner: String,
        /// Argument name
        argument: String,
    },

    /// A template references a name it cannot be rendered with
    #[error("template of {owner} references unknown placeholder {{{placeholder}}}")]
    UnknownPlaceholder {
        /// `tool/configuration` or `tool/configuration/argument`
        owner: String,
        /// Placeholder name
        placeholder: String,
    },

    /// A template is malformed
    #[error("malformed template in {owner}: {reason}")]
    MalformedTemplate {
        /// Template owner
        owner: String,
        /// Reason
        reason: String,
    },
}

impl CatalogError {
    /// Build an IO error for a path
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
