//! Strix model
//!
//! Static vocabulary shared by every other Strix crate:
//! - Input type forest (which entity kinds an argument may consume)
//! - Tool catalog (tools, configurations, arguments, inputs, processes)
//! - Entity sum type over the finding and target families
//! - Filter expressions, the parse accumulator and finding identity keys

pub mod args;
pub mod catalog;
pub mod entity;
pub mod error;
pub mod filter;
pub mod identity;
pub mod ids;
pub mod input_type;
pub mod scope;
pub mod template;

pub use args::{ArgValue, InputKeyword, ParsedArgs};
pub use catalog::{
    Argument, Catalog, CatalogBuilder, Configuration, Input, Intensity, IntensityRank, Process,
    Stage, Step, StepSpec, Tool,
};
pub use entity::{Entity, EntityKind, FilterContext, Identified, Links};
pub use error::{CatalogError, ModelError};
pub use filter::FilterExpr;
pub use identity::IdentityKey;
pub use ids::{EntityId, ExecutionId, StepId, TaskId};
pub use input_type::{InputType, InputTypeName, TypeRegistry};
pub use scope::TargetScope;

/// Commonly used types
pub mod prelude {
    pub use crate::entity::findings::{
        Credential, Exploit, Host, Osint, Path, Port, Technology, Vulnerability,
    };
    pub use crate::entity::kinds::{
        AuthenticationKind, HostOs, OsintDataType, PathKind, PortStatus, Protocol, Severity,
        TargetKind, WordlistKind,
    };
    pub use crate::entity::targets::{
        Target, TargetAuthentication, TargetEndpoint, TargetPort, TargetTechnology,
        TargetVulnerability, Wordlist,
    };
    pub use crate::{
        Argument, Catalog, Configuration, Entity, EntityId, EntityKind, ExecutionId, FilterExpr,
        Input, InputKeyword, InputTypeName, Intensity, IntensityRank, ParsedArgs, Stage, Step,
        TargetScope, TaskId, Tool, TypeRegistry,
    };
}
