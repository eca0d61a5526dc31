//! Execution partitioning
//!
//! Turns a pool of candidate entities into bundles, one per execution a
//! configuration needs:
//! - dimensions (input types) are processed in the registry's canonical order
//! - a `multiple` dimension rides along in every bundle it relates to
//! - a single-valued dimension branches: the first related value stays in
//!   place, every further value clones the bundle right after it
//! - a value relates to a bundle through its nearest ancestor present in
//!   the bundles; values whose ancestors appear in no bundle are
//!   independent and relate to all
//!
//! Branching in place keeps each bundle's expansions contiguous, so the
//! first processed dimension varies slowest across the result.

use std::collections::HashSet;
use strix_model::{
    Configuration, Entity, EntityId, EntityKind, FilterContext, Input, InputType, TypeRegistry,
};

/// Entities assigned to one execution
pub type Bundle = Vec<Entity>;

/// Partitioner for one configuration
#[derive(Debug, Clone, Copy)]
pub struct Partitioner<'a> {
    registry: &'a TypeRegistry,
    configuration: &'a Configuration,
    context: FilterContext<'a>,
}

impl<'a> Partitioner<'a> {
    /// Partitioner with an empty filter context
    #[must_use]
    pub fn new(registry: &'a TypeRegistry, configuration: &'a Configuration) -> Self {
        Self {
            registry,
            configuration,
            context: FilterContext::default(),
        }
    }

    /// Evaluate filters in the context of a target
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: FilterContext<'a>) -> Self {
        self.context = context;
        self
    }

    /// Compute bundles. Returns no bundle when no candidate is consumed by
    /// the configuration; missing required inputs are left to resolution.
    #[must_use]
    pub fn partition(&self, candidates: &[Entity]) -> Vec<Bundle> {
        let candidates = dedup(candidates);
        let mut bundles: Vec<Bundle> = vec![Vec::new()];
        let mut consumed = false;

        for name in self.registry.processing_order() {
            let Some((argument, input)) = self.configuration.binding_for(*name) else {
                continue;
            };
            let Some(input_type) = self.registry.get(*name) else {
                continue;
            };
            let values = self.dimension(&candidates, input_type, input);
            if values.is_empty() {
                continue;
            }
            tracing::trace!(
                configuration = %self.configuration.key(),
                input_type = %name,
                values = values.len(),
                multiple = argument.multiple,
                "partitioning dimension"
            );
            consumed = true;
            bundles = attach(bundles, &values, argument.multiple);
        }

        if consumed {
            bundles
        } else {
            Vec::new()
        }
    }

    /// Candidates of the primary kind passing the input filter, or of the
    /// fallback kind when none do
    fn dimension(&self, candidates: &[Entity], input_type: &InputType, input: &Input) -> Vec<Entity> {
        let of_kind = |kind: EntityKind| -> Vec<Entity> {
            candidates
                .iter()
                .filter(|e| e.kind() == kind && e.accepts(&input.filter, &self.context))
                .cloned()
                .collect()
        };
        let primary = of_kind(input_type.primary);
        if !primary.is_empty() {
            return primary;
        }
        input_type.fallback.map(of_kind).unwrap_or_default()
    }
}

fn dedup(candidates: &[Entity]) -> Vec<Entity> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|e| seen.insert(e.id()))
        .cloned()
        .collect()
}

fn attach(bundles: Vec<Bundle>, values: &[Entity], multiple: bool) -> Vec<Bundle> {
    let present: HashSet<EntityId> = bundles.iter().flatten().map(Entity::id).collect();
    // a value hangs off its nearest ancestor present in any bundle
    let anchors: Vec<Option<EntityId>> = values
        .iter()
        .map(|v| v.ancestor_ids().into_iter().find(|id| present.contains(id)))
        .collect();

    let mut out = Vec::with_capacity(bundles.len());
    for bundle in bundles {
        let ids: HashSet<EntityId> = bundle.iter().map(Entity::id).collect();
        let related: Vec<&Entity> = values
            .iter()
            .zip(&anchors)
            .filter(|(_, anchor)| anchor.map_or(true, |id| ids.contains(&id)))
            .map(|(value, _)| value)
            .collect();

        if related.is_empty() {
            out.push(bundle);
        } else if multiple {
            let mut joined = bundle;
            joined.extend(related.into_iter().cloned());
            out.push(joined);
        } else {
            for value in related {
                let mut branch = bundle.clone();
                branch.push(value.clone());
                out.push(branch);
            }
        }
    }
    out
}
