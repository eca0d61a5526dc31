//! Plan building
//!
//! Expands a task subject into planned executions:
//! - steps ordered by stage ascending, then priority descending
//! - highest admissible intensity per step; inadmissible steps are dropped
//! - a step depends on every earlier step producing one of its input types;
//!   those types are covered and their fallback kinds leave the seed pool
//! - each step is partitioned into bundles, one execution per bundle,
//!   depending on every execution of its dependency steps

use crate::error::PlanError;
use crate::partition::{Bundle, Partitioner};
use crate::resolve::{check, ResolveContext};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use strix_model::{
    Catalog, Configuration, Entity, ExecutionId, InputTypeName, Intensity, IntensityRank, StepId,
    TargetScope, Tool, TypeRegistry,
};

/// What a task runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskSubject {
    /// One tool, with a named or default configuration
    Tool {
        /// Tool name
        tool: String,
        /// Configuration name
        configuration: Option<String>,
    },
    /// A process
    Process {
        /// Process name
        process: String,
    },
}

impl TaskSubject {
    /// Tool subject running the default configuration
    #[must_use]
    pub fn tool(tool: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            configuration: None,
        }
    }

    /// Process subject
    #[must_use]
    pub fn process(process: impl Into<String>) -> Self {
        Self::Process {
            process: process.into(),
        }
    }
}

impl fmt::Display for TaskSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool {
                tool,
                configuration: Some(configuration),
            } => write!(f, "tool {tool}/{configuration}"),
            Self::Tool { tool, .. } => write!(f, "tool {tool}"),
            Self::Process { process } => write!(f, "process {process}"),
        }
    }
}

/// Step kept in the plan
#[derive(Debug, Clone)]
pub struct PlannedStep {
    /// Step identity
    pub id: StepId,
    /// Tool run by the step
    pub tool: Arc<Tool>,
    /// Configuration run by the step
    pub configuration: Arc<Configuration>,
    /// Selected intensity
    pub intensity: Intensity,
    /// Upstream steps
    pub dependencies: Vec<StepId>,
    /// Input types produced upstream
    pub covered: Vec<InputTypeName>,
    /// Dependency depth
    pub group: u32,
}

/// Step left out of the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedStep {
    /// Step identity
    pub id: StepId,
    /// `tool/configuration`
    pub configuration: String,
    /// Ceiling that admitted no intensity
    pub requested: IntensityRank,
}

/// One concrete run
#[derive(Debug, Clone)]
pub struct PlannedExecution {
    /// Execution identity, also the queue job identity
    pub id: ExecutionId,
    /// Originating step for process tasks
    pub step: Option<StepId>,
    /// Tool
    pub tool: Arc<Tool>,
    /// Configuration
    pub configuration: Arc<Configuration>,
    /// Selected intensity
    pub intensity: Intensity,
    /// Seed entities
    pub bundle: Bundle,
    /// Executions that must terminate first
    pub dependencies: Vec<ExecutionId>,
    /// Dependency depth
    pub group: u32,
}

/// Expanded task
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Planned steps in execution order; empty for tool tasks
    pub steps: Vec<PlannedStep>,
    /// Executions in submission order
    pub executions: Vec<PlannedExecution>,
    /// Steps without an admissible intensity
    pub dropped: Vec<DroppedStep>,
}

impl Plan {
    /// Whether nothing will run
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}

/// Plan builder over a catalog
#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder<'a> {
    catalog: &'a Catalog,
    registry: &'a TypeRegistry,
}

impl<'a> PlanBuilder<'a> {
    /// New builder
    #[must_use]
    pub fn new(catalog: &'a Catalog, registry: &'a TypeRegistry) -> Self {
        Self { catalog, registry }
    }

    /// Validate a subject and its intensity before admission
    pub fn admit(&self, subject: &TaskSubject, intensity: IntensityRank) -> Result<(), PlanError> {
        match subject {
            TaskSubject::Tool { tool, configuration } => {
                let (tool, _) = self.tool_subject(tool, configuration.as_deref())?;
                if tool.intensity_for(intensity).is_none() {
                    return Err(PlanError::NoAdmissibleIntensity {
                        subject: subject.to_string(),
                        requested: intensity,
                    });
                }
            }
            TaskSubject::Process { process } => {
                let process = self
                    .catalog
                    .process(process)
                    .ok_or_else(|| PlanError::UnknownProcess(process.clone()))?;
                let admissible = process.steps.iter().any(|step| {
                    self.catalog
                        .tool(&step.configuration.tool)
                        .and_then(|t| t.intensity_for(intensity))
                        .is_some()
                });
                if !admissible {
                    return Err(PlanError::NoAdmissibleIntensity {
                        subject: subject.to_string(),
                        requested: intensity,
                    });
                }
            }
        }
        Ok(())
    }

    /// Expand a subject against a target scope
    pub fn build(
        &self,
        subject: &TaskSubject,
        scope: &TargetScope,
        intensity: IntensityRank,
    ) -> Result<Plan, PlanError> {
        self.admit(subject, intensity)?;
        match subject {
            TaskSubject::Tool { tool, configuration } => {
                let (tool, configuration) = self.tool_subject(tool, configuration.as_deref())?;
                let selected = tool.intensity_for(intensity).cloned().ok_or_else(|| {
                    PlanError::NoAdmissibleIntensity {
                        subject: subject.to_string(),
                        requested: intensity,
                    }
                })?;
                let bundles = self.bundles(&configuration, &scope.entities(), scope);
                let executions = bundles
                    .into_iter()
                    .map(|bundle| PlannedExecution {
                        id: ExecutionId::new(),
                        step: None,
                        tool: Arc::clone(&tool),
                        configuration: Arc::clone(&configuration),
                        intensity: selected.clone(),
                        bundle,
                        dependencies: Vec::new(),
                        group: 0,
                    })
                    .collect::<Vec<_>>();
                tracing::debug!(%subject, executions = executions.len(), "tool task planned");
                Ok(Plan {
                    steps: Vec::new(),
                    executions,
                    dropped: Vec::new(),
                })
            }
            TaskSubject::Process { process } => self.build_process(process, scope, intensity),
        }
    }

    fn build_process(
        &self,
        name: &str,
        scope: &TargetScope,
        intensity: IntensityRank,
    ) -> Result<Plan, PlanError> {
        let process = self
            .catalog
            .process(name)
            .ok_or_else(|| PlanError::UnknownProcess(name.to_string()))?;

        let mut ordered: Vec<_> = process.steps.iter().collect();
        ordered.sort_by(|a, b| {
            a.configuration
                .stage
                .cmp(&b.configuration.stage)
                .then(b.priority.cmp(&a.priority))
        });

        let mut plan = Plan::default();
        let mut graph: DiGraphMap<StepId, ()> = DiGraphMap::new();

        for step in ordered {
            let configuration = &step.configuration;
            let tool = self
                .catalog
                .tool(&configuration.tool)
                .ok_or_else(|| PlanError::UnknownTool(configuration.tool.clone()))?;
            let Some(selected) = tool.intensity_for(intensity) else {
                tracing::info!(
                    step = %step.id,
                    configuration = %configuration.key(),
                    requested = %intensity,
                    "step dropped: no admissible intensity"
                );
                plan.dropped.push(DroppedStep {
                    id: step.id,
                    configuration: configuration.key(),
                    requested: intensity,
                });
                continue;
            };

            let inputs = configuration.input_types();
            let mut dependencies = Vec::new();
            let mut covered = Vec::new();
            for upstream in &plan.steps {
                let shared: Vec<InputTypeName> = upstream
                    .configuration
                    .outputs
                    .iter()
                    .copied()
                    .filter(|o| inputs.contains(o))
                    .collect();
                if shared.is_empty() {
                    continue;
                }
                dependencies.push(upstream.id);
                for name in shared {
                    if !covered.contains(&name) {
                        covered.push(name);
                    }
                }
            }

            graph.add_node(step.id);
            for dependency in &dependencies {
                graph.add_edge(*dependency, step.id, ());
            }
            let group = plan
                .steps
                .iter()
                .filter(|s| dependencies.contains(&s.id))
                .map(|s| s.group + 1)
                .max()
                .unwrap_or(0);

            plan.steps.push(PlannedStep {
                id: step.id,
                tool: Arc::clone(tool),
                configuration: Arc::clone(configuration),
                intensity: selected.clone(),
                dependencies,
                covered,
                group,
            });
        }

        // Steps only depend on earlier steps; a cycle means a corrupted catalog
        toposort(&graph, None).map_err(|_| PlanError::CyclicPlan)?;

        let mut by_step: HashMap<StepId, Vec<ExecutionId>> = HashMap::new();
        for step in &plan.steps {
            let seeds = scope.entities_excluding(&self.registry.fallback_kinds(&step.covered));
            let bundles = self.bundles(&step.configuration, &seeds, scope);
            let dependencies: Vec<ExecutionId> = step
                .dependencies
                .iter()
                .flat_map(|d| by_step.get(d).into_iter().flatten().copied())
                .collect();

            let mut ids = Vec::with_capacity(bundles.len());
            for bundle in bundles {
                let id = ExecutionId::new();
                ids.push(id);
                plan.executions.push(PlannedExecution {
                    id,
                    step: Some(step.id),
                    tool: Arc::clone(&step.tool),
                    configuration: Arc::clone(&step.configuration),
                    intensity: step.intensity.clone(),
                    bundle,
                    dependencies: dependencies.clone(),
                    group: step.group,
                });
            }
            tracing::debug!(
                step = %step.id,
                configuration = %step.configuration.key(),
                executions = ids.len(),
                dependencies = dependencies.len(),
                group = step.group,
                "step planned"
            );
            by_step.insert(step.id, ids);
        }

        Ok(plan)
    }

    fn tool_subject(
        &self,
        tool: &str,
        configuration: Option<&str>,
    ) -> Result<(Arc<Tool>, Arc<Configuration>), PlanError> {
        let found = self
            .catalog
            .tool(tool)
            .ok_or_else(|| PlanError::UnknownTool(tool.to_string()))?;
        let configuration = match configuration {
            Some(name) => self.catalog.configuration(tool, name),
            None => self.catalog.default_configuration(tool),
        }
        .ok_or_else(|| PlanError::UnknownConfiguration {
            tool: tool.to_string(),
            configuration: configuration.unwrap_or("default").to_string(),
        })?;
        Ok((Arc::clone(found), Arc::clone(configuration)))
    }

    /// Partition seeds; a configuration consuming nothing still runs once
    fn bundles(&self, configuration: &Configuration, seeds: &[Entity], scope: &TargetScope) -> Vec<Bundle> {
        let bundles = Partitioner::new(self.registry, configuration)
            .with_context(scope.filter_context())
            .partition(seeds);
        if bundles.is_empty() {
            vec![Vec::new()]
        } else {
            bundles
        }
    }
}

/// Runtime fan-out of a dependent execution: re-partition its seed bundle
/// together with the findings of its dependency executions, keeping only
/// bundles that resolve. Order is stable; the caller runs the first bundle
/// itself and enqueues the rest.
#[must_use]
pub fn fan_out(
    configuration: &Configuration,
    seed: &[Entity],
    upstream: &[Entity],
    ctx: &ResolveContext<'_>,
) -> Vec<Bundle> {
    let mut seen = HashSet::new();
    let pool: Vec<Entity> = seed
        .iter()
        .chain(upstream)
        .filter(|e| seen.insert(e.id()))
        .cloned()
        .collect();
    let bundles = Partitioner::new(ctx.registry, configuration)
        .with_context(ctx.filter)
        .partition(&pool);
    let kept: Vec<Bundle> = bundles
        .into_iter()
        .filter(|bundle| check(bundle, configuration, ctx))
        .collect();
    tracing::debug!(
        configuration = %configuration.key(),
        pool = pool.len(),
        bundles = kept.len(),
        "fan-out"
    );
    kept
}
