//! Tool catalog
//!
//! Tools, their configurations (argument templates + pipeline stage), the
//! arguments and inputs binding templates to input types, and processes
//! (ordered steps). A [`Catalog`] is built once, validated, and shared
//! read-only behind `Arc`.

use crate::args::InputKeyword;
use crate::error::CatalogError;
use crate::filter::FilterExpr;
use crate::ids::StepId;
use crate::input_type::InputTypeName;
use crate::template;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Placeholders every configuration template may use besides its arguments
pub const BUILTIN_PLACEHOLDERS: [&str; 4] = ["command", "script", "intensity", "output"];

/// Aggressiveness level, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityRank {
    /// Stealthiest
    Sneaky = 1,
    /// Low
    Low = 2,
    /// Normal
    Normal = 3,
    /// Hard
    Hard = 4,
    /// Most aggressive
    Insane = 5,
}

impl IntensityRank {
    /// Every rank, ascending
    pub const ALL: [IntensityRank; 5] = [
        Self::Sneaky,
        Self::Low,
        Self::Normal,
        Self::Hard,
        Self::Insane,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Sneaky => "sneaky",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::Hard => "hard",
            Self::Insane => "insane",
        }
    }
}

impl fmt::Display for IntensityRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntensityRank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown intensity: {s}"))
    }
}

/// Intensity level supported by a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intensity {
    /// Rank
    pub rank: IntensityRank,
    /// Fragment rendered into `{intensity}`
    #[serde(default)]
    pub argument: String,
}

/// Pipeline stage, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Open-source intelligence
    Osint = 1,
    /// Enumeration
    Enumeration = 2,
    /// Vulnerability detection
    Vulnerabilities = 3,
    /// Service-specific checks
    Services = 4,
    /// Exploitation
    Exploitation = 5,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Osint => "osint",
            Self::Enumeration => "enumeration",
            Self::Vulnerabilities => "vulnerabilities",
            Self::Services => "services",
            Self::Exploitation => "exploitation",
        };
        f.write_str(name)
    }
}

/// External tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    /// Unique name
    pub name: String,
    /// Binary invoked
    pub command: String,
    /// Wrapper script rendered into `{script}`
    pub script: Option<String>,
    /// Report file extension; `None` means console output only
    pub output_format: Option<String>,
    /// Whether a nonzero exit code still counts as success
    pub ignore_exit_code: bool,
    /// Hard timeout for one run
    pub timeout: Option<Duration>,
    /// Supported levels, ascending
    pub intensities: Vec<Intensity>,
}

impl Tool {
    /// New tool without intensities
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            script: None,
            output_format: None,
            ignore_exit_code: false,
            timeout: None,
            intensities: Vec::new(),
        }
    }

    /// Add a supported intensity
    #[inline]
    #[must_use]
    pub fn with_intensity(mut self, rank: IntensityRank, argument: impl Into<String>) -> Self {
        self.intensities.push(Intensity {
            rank,
            argument: argument.into(),
        });
        self.intensities.sort_by_key(|i| i.rank);
        self
    }

    /// Set the report file format
    #[inline]
    #[must_use]
    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    /// Tolerate nonzero exit codes
    #[inline]
    #[must_use]
    pub fn ignoring_exit_code(mut self) -> Self {
        self.ignore_exit_code = true;
        self
    }

    /// Set the run timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Highest supported intensity not above `ceiling`
    #[must_use]
    pub fn intensity_for(&self, ceiling: IntensityRank) -> Option<&Intensity> {
        self.intensities
            .iter()
            .filter(|i| i.rank <= ceiling)
            .max_by_key(|i| i.rank)
    }
}

/// Binding of an argument to an input type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Consumed type
    pub input_type: InputTypeName,
    /// Fallback rank, ascending
    pub order: u32,
    /// Filter applied to candidates
    pub filter: FilterExpr,
}

impl Input {
    /// Unfiltered input
    #[must_use]
    pub fn new(input_type: InputTypeName, order: u32) -> Self {
        Self {
            input_type,
            order,
            filter: FilterExpr::default(),
        }
    }

    /// Set the filter
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<FilterExpr>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Named placeholder of a configuration template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Placeholder name
    pub name: String,
    /// Fragment rendered with the parse accumulator
    pub template: String,
    /// Abort resolution when unresolved
    pub required: bool,
    /// Fold every matching entity instead of the first
    pub multiple: bool,
    /// Inputs sorted by `order`
    pub inputs: Vec<Input>,
}

impl Argument {
    /// Optional, single-valued argument
    #[must_use]
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            required: false,
            multiple: false,
            inputs: Vec::new(),
        }
    }

    /// Mark as required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark as multiple
    #[inline]
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Add an input, keeping inputs sorted by order
    #[inline]
    #[must_use]
    pub fn with_input(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self.inputs.sort_by_key(|i| i.order);
        self
    }
}

/// Named argument template of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Owning tool name
    pub tool: String,
    /// Name, unique per tool
    pub name: String,
    /// Pipeline stage
    pub stage: Stage,
    /// Command template
    pub template: String,
    /// Arguments in declaration order
    pub arguments: Vec<Argument>,
    /// Input types this configuration is known to produce
    pub outputs: Vec<InputTypeName>,
    /// Used when a step or task names only the tool
    pub default: bool,
}

impl Configuration {
    /// New configuration
    #[must_use]
    pub fn new(
        tool: impl Into<String>,
        name: impl Into<String>,
        stage: Stage,
        template: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            name: name.into(),
            stage,
            template: template.into(),
            arguments: Vec::new(),
            outputs: Vec::new(),
            default: false,
        }
    }

    /// Add an argument
    #[inline]
    #[must_use]
    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Declare a produced input type
    #[inline]
    #[must_use]
    pub fn with_output(mut self, output: InputTypeName) -> Self {
        if !self.outputs.contains(&output) {
            self.outputs.push(output);
        }
        self
    }

    /// Mark as the tool's default configuration
    #[inline]
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    /// `tool/name`
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.tool, self.name)
    }

    /// Every consumed input type, in order of first appearance
    #[must_use]
    pub fn input_types(&self) -> Vec<InputTypeName> {
        let mut types = Vec::new();
        for input in self.arguments.iter().flat_map(|a| a.inputs.iter()) {
            if !types.contains(&input.input_type) {
                types.push(input.input_type);
            }
        }
        types
    }

    /// Argument and input that drive partitioning for a type: the input of
    /// that type with the lowest order, first declared argument on ties.
    #[must_use]
    pub fn binding_for(&self, input_type: InputTypeName) -> Option<(&Argument, &Input)> {
        self.arguments
            .iter()
            .filter_map(|a| {
                a.inputs
                    .iter()
                    .find(|i| i.input_type == input_type)
                    .map(|i| (a, i))
            })
            .min_by_key(|(_, i)| i.order)
    }

    /// Whether the configuration declares `output`
    #[must_use]
    pub fn produces(&self, output: InputTypeName) -> bool {
        self.outputs.contains(&output)
    }
}

/// Step of a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Identity
    pub id: StepId,
    /// Configuration run by the step
    pub configuration: Arc<Configuration>,
    /// Order within a stage, descending
    pub priority: u32,
}

/// Named pipeline of steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    /// Unique name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Steps in declaration order
    pub steps: Vec<Step>,
}

/// Immutable, validated catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tools: IndexMap<String, Arc<Tool>>,
    configurations: IndexMap<(String, String), Arc<Configuration>>,
    processes: IndexMap<String, Arc<Process>>,
}

impl Catalog {
    /// Start building a catalog
    #[must_use]
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Parse and validate a TOML catalog
    pub fn from_toml_str(source: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(source)?;
        file.into_catalog()
    }

    /// Read, parse and validate a TOML catalog file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        let catalog = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            tools = catalog.tools.len(),
            processes = catalog.processes.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Tool by name
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&Arc<Tool>> {
        self.tools.get(name)
    }

    /// Configuration by tool and name
    #[must_use]
    pub fn configuration(&self, tool: &str, name: &str) -> Option<&Arc<Configuration>> {
        self.configurations.get(&(tool.to_string(), name.to_string()))
    }

    /// The tool's default configuration, or its first one
    #[must_use]
    pub fn default_configuration(&self, tool: &str) -> Option<&Arc<Configuration>> {
        let mut of_tool = self.configurations.values().filter(|c| c.tool == tool);
        let first = of_tool.next()?;
        if first.default {
            return Some(first);
        }
        of_tool.find(|c| c.default).or(Some(first))
    }

    /// Process by name
    #[must_use]
    pub fn process(&self, name: &str) -> Option<&Arc<Process>> {
        self.processes.get(name)
    }

    /// Every tool
    pub fn tools(&self) -> impl Iterator<Item = &Arc<Tool>> {
        self.tools.values()
    }

    /// Every configuration
    pub fn configurations(&self) -> impl Iterator<Item = &Arc<Configuration>> {
        self.configurations.values()
    }

    /// Every process
    pub fn processes(&self) -> impl Iterator<Item = &Arc<Process>> {
        self.processes.values()
    }
}

/// Step declaration used by [`CatalogBuilder::add_process`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    /// Tool name
    pub tool: String,
    /// Configuration name; the tool's default when `None`
    pub configuration: Option<String>,
    /// Priority within the stage
    pub priority: u32,
}

impl StepSpec {
    /// Step running a tool's default configuration
    #[must_use]
    pub fn new(tool: impl Into<String>, priority: u32) -> Self {
        Self {
            tool: tool.into(),
            configuration: None,
            priority,
        }
    }

    /// Run a named configuration
    #[inline]
    #[must_use]
    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }
}

/// Validating catalog builder
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    tools: Vec<Tool>,
    configurations: Vec<Configuration>,
    processes: Vec<(String, Option<String>, Vec<StepSpec>)>,
}

impl CatalogBuilder {
    /// Add a tool
    #[must_use]
    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add a configuration
    #[must_use]
    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configurations.push(configuration);
        self
    }

    /// Add a process
    #[must_use]
    pub fn add_process(
        mut self,
        name: impl Into<String>,
        description: Option<String>,
        steps: Vec<StepSpec>,
    ) -> Self {
        self.processes.push((name.into(), description, steps));
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog::default();

        for tool in self.tools {
            if tool.intensities.is_empty() {
                return Err(CatalogError::NoIntensities(tool.name));
            }
            if catalog.tools.contains_key(&tool.name) {
                return Err(CatalogError::DuplicateTool(tool.name));
            }
            catalog.tools.insert(tool.name.clone(), Arc::new(tool));
        }

        for configuration in self.configurations {
            if !catalog.tools.contains_key(&configuration.tool) {
                return Err(CatalogError::UnknownTool(configuration.tool));
            }
            validate_configuration(&configuration)?;
            let key = (configuration.tool.clone(), configuration.name.clone());
            if catalog.configurations.contains_key(&key) {
                return Err(CatalogError::DuplicateConfiguration {
                    tool: key.0,
                    configuration: key.1,
                });
            }
            catalog.configurations.insert(key, Arc::new(configuration));
        }

        for (name, description, specs) in self.processes {
            if catalog.processes.contains_key(&name) {
                return Err(CatalogError::DuplicateProcess(name));
            }
            let mut steps = Vec::with_capacity(specs.len());
            for spec in specs {
                let configuration = match &spec.configuration {
                    Some(config) => catalog.configuration(&spec.tool, config).cloned().ok_or_else(|| {
                        CatalogError::UnknownConfiguration {
                            tool: spec.tool.clone(),
                            configuration: config.clone(),
                        }
                    })?,
                    None => catalog
                        .default_configuration(&spec.tool)
                        .cloned()
                        .ok_or_else(|| CatalogError::UnknownTool(spec.tool.clone()))?,
                };
                steps.push(Step {
                    id: StepId::new(),
                    configuration,
                    priority: spec.priority,
                });
            }
            let process = Process {
                name: name.clone(),
                description,
                steps,
            };
            catalog.processes.insert(name, Arc::new(process));
        }

        Ok(catalog)
    }
}

fn validate_configuration(configuration: &Configuration) -> Result<(), CatalogError> {
    let owner = configuration.key();
    let malformed = |owner: &str, e: template::TemplateError| CatalogError::MalformedTemplate {
        owner: owner.to_string(),
        reason: e.to_string(),
    };

    for placeholder in template::placeholders(&configuration.template).map_err(|e| malformed(&owner, e))? {
        let known = BUILTIN_PLACEHOLDERS.contains(&placeholder.as_str())
            || configuration.arguments.iter().any(|a| a.name == placeholder);
        if !known {
            return Err(CatalogError::UnknownPlaceholder { owner, placeholder });
        }
    }

    for argument in &configuration.arguments {
        let arg_owner = format!("{owner}/{}", argument.name);
        if argument.inputs.is_empty() {
            return Err(CatalogError::ArgumentWithoutInputs {
                owner,
                argument: argument.name.clone(),
            });
        }
        for placeholder in template::placeholders(&argument.template).map_err(|e| malformed(&arg_owner, e))? {
            if InputKeyword::from_name(&placeholder).is_none() {
                return Err(CatalogError::UnknownPlaceholder {
                    owner: arg_owner,
                    placeholder,
                });
            }
        }
    }
    Ok(())
}

// On-disk schema

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    tools: Vec<ToolSpec>,
    #[serde(default)]
    processes: Vec<ProcessSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolSpec {
    name: String,
    command: String,
    script: Option<String>,
    output_format: Option<String>,
    #[serde(default)]
    ignore_exit_code: bool,
    timeout_secs: Option<u64>,
    intensities: Vec<Intensity>,
    #[serde(default)]
    configurations: Vec<ConfigurationSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigurationSpec {
    name: String,
    stage: Stage,
    template: String,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    outputs: Vec<InputTypeName>,
    #[serde(default)]
    arguments: Vec<ArgumentSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArgumentSpec {
    name: String,
    template: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    multiple: bool,
    inputs: Vec<InputSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputSpec {
    #[serde(rename = "type")]
    input_type: InputTypeName,
    order: Option<u32>,
    #[serde(default)]
    filter: FilterExpr,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcessSpec {
    name: String,
    description: Option<String>,
    #[serde(default)]
    steps: Vec<ProcessStepSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcessStepSpec {
    tool: String,
    configuration: Option<String>,
    #[serde(default)]
    priority: u32,
}

impl CatalogFile {
    fn into_catalog(self) -> Result<Catalog, CatalogError> {
        let mut builder = Catalog::builder();
        for spec in self.tools {
            let mut tool = Tool::new(&spec.name, spec.command);
            tool.script = spec.script;
            tool.output_format = spec.output_format;
            tool.ignore_exit_code = spec.ignore_exit_code;
            tool.timeout = spec.timeout_secs.map(Duration::from_secs);
            for intensity in spec.intensities {
                tool = tool.with_intensity(intensity.rank, intensity.argument);
            }
            builder = builder.tool(tool);

            for config in spec.configurations {
                let mut configuration =
                    Configuration::new(&spec.name, config.name, config.stage, config.template);
                configuration.default = config.default;
                for output in config.outputs {
                    configuration = configuration.with_output(output);
                }
                for arg in config.arguments {
                    let mut argument = Argument::new(arg.name, arg.template);
                    argument.required = arg.required;
                    argument.multiple = arg.multiple;
                    for (position, input) in (1u32..).zip(arg.inputs) {
                        argument = argument.with_input(
                            Input::new(input.input_type, input.order.unwrap_or(position))
                                .with_filter(input.filter),
                        );
                    }
                    configuration = configuration.with_argument(argument);
                }
                builder = builder.configuration(configuration);
            }
        }
        for process in self.processes {
            let steps = process
                .steps
                .into_iter()
                .map(|s| StepSpec {
                    tool: s.tool,
                    configuration: s.configuration,
                    priority: s.priority,
                })
                .collect();
            builder = builder.add_process(process.name, process.description, steps);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CATALOG: &str = r#"
[[tools]]
name = "nmap"
command = "nmap"
output_format = "gnmap"
timeout_secs = 600
intensities = [
    { rank = "sneaky", argument = "-T1" },
    { rank = "normal", argument = "-T3" },
    { rank = "insane", argument = "-T5" },
]

[[tools.configurations]]
name = "tcp"
stage = "enumeration"
default = true
template = "{command} {intensity} -sV {ports} {host} -oG {output}"
outputs = ["host", "port"]

[[tools.configurations.arguments]]
name = "host"
template = "{host}"
required = true
inputs = [{ type = "host" }]

[[tools.configurations.arguments]]
name = "ports"
template = "-p {ports_commas}"
multiple = true
inputs = [{ type = "port", filter = "!22" }]

[[processes]]
name = "recon"
description = "Port discovery"
steps = [{ tool = "nmap", priority = 1 }]
"#;

    #[test]
    fn test_load_catalog() {
        let catalog = Catalog::from_toml_str(CATALOG).unwrap();
        let tool = catalog.tool("nmap").unwrap();
        assert_eq!(tool.timeout, Some(Duration::from_secs(600)));
        assert_eq!(tool.intensity_for(IntensityRank::Hard).unwrap().argument, "-T3");
        assert_eq!(tool.intensity_for(IntensityRank::Sneaky).unwrap().argument, "-T1");

        let config = catalog.default_configuration("nmap").unwrap();
        assert_eq!(config.input_types(), vec![InputTypeName::Host, InputTypeName::Port]);
        assert!(config.produces(InputTypeName::Port));
        let (argument, input) = config.binding_for(InputTypeName::Port).unwrap();
        assert!(argument.multiple);
        assert_eq!(input.filter.to_string(), "!22");

        let process = catalog.process("recon").unwrap();
        assert_eq!(process.steps.len(), 1);
        assert_eq!(process.steps[0].configuration.name, "tcp");
    }

    #[test]
    fn test_intensity_below_every_level() {
        let tool = Tool::new("t", "t").with_intensity(IntensityRank::Normal, "");
        assert!(tool.intensity_for(IntensityRank::Low).is_none());
    }

    #[test]
    fn test_rejects_unknown_config_placeholder() {
        let broken = CATALOG.replace("-oG {output}", "-oG {report}");
        let err = Catalog::from_toml_str(&broken).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownPlaceholder { placeholder, .. } if placeholder == "report"));
    }

    #[test]
    fn test_rejects_unknown_argument_keyword() {
        let broken = CATALOG.replace("template = \"{host}\"", "template = \"{address}\"");
        let err = Catalog::from_toml_str(&broken).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownPlaceholder { owner, .. } if owner == "nmap/tcp/host"));
    }

    #[test]
    fn test_rejects_unknown_step_configuration() {
        let broken = CATALOG.replace(
            "steps = [{ tool = \"nmap\", priority = 1 }]",
            "steps = [{ tool = \"nmap\", configuration = \"udp\" }]",
        );
        assert!(matches!(
            Catalog::from_toml_str(&broken).unwrap_err(),
            CatalogError::UnknownConfiguration { .. }
        ));
    }

    #[test]
    fn test_rejects_duplicate_tool() {
        let result = Catalog::builder()
            .tool(Tool::new("a", "a").with_intensity(IntensityRank::Normal, ""))
            .tool(Tool::new("a", "a").with_intensity(IntensityRank::Normal, ""))
            .build();
        assert!(matches!(result, Err(CatalogError::DuplicateTool(name)) if name == "a"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, CATALOG).unwrap();
        assert!(Catalog::from_file(&path).is_ok());
        assert!(matches!(
            Catalog::from_file(dir.path().join("missing.toml")),
            Err(CatalogError::Io { .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_intensity_never_exceeds_ceiling(
            supported in proptest::sample::subsequence(IntensityRank::ALL.to_vec(), 1..=5),
            ceiling in proptest::sample::select(IntensityRank::ALL.to_vec()),
        ) {
            let tool = supported
                .iter()
                .fold(Tool::new("t", "t"), |tool, rank| tool.with_intensity(*rank, rank.to_string()));
            let expected = supported.iter().copied().filter(|r| *r <= ceiling).max();
            proptest::prop_assert_eq!(tool.intensity_for(ceiling).map(|i| i.rank), expected);
        }
    }
}
