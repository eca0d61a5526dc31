//! Finding identity store
//!
//! Findings are keyed by their [`IdentityKey`]. Insert-or-merge happens
//! under the key's map-entry lock, so concurrent workers observing the same
//! finding converge on one record without retries.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use strix_model::{Entity, EntityId, EntityKind, ExecutionId, IdentityKey, Links};

/// Stored finding with its observation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindingRecord {
    /// Current merged state
    pub entity: Entity,
    /// Target scope of the identity key
    pub scope: EntityId,
    /// Cleared when a collaborator retires the finding
    pub is_active: bool,
    /// First observation
    pub first_seen: DateTime<Utc>,
    /// Latest observation
    pub last_seen: DateTime<Utc>,
    /// Executions that observed it, oldest first
    pub executions: Vec<ExecutionId>,
}

/// Query over stored findings
#[derive(Debug, Clone, Default)]
pub struct FindingQuery {
    /// Only findings of this target scope
    pub scope: Option<EntityId>,
    /// Only findings of this kind
    pub kind: Option<EntityKind>,
    /// Only findings observed by one of these executions
    pub executions: Option<Vec<ExecutionId>>,
    /// Include retired findings
    pub include_inactive: bool,
}

impl FindingQuery {
    fn accepts(&self, record: &FindingRecord) -> bool {
        self.scope.map_or(true, |s| s == record.scope)
            && self.kind.map_or(true, |k| k == record.entity.kind())
            && (self.include_inactive || record.is_active)
            && self
                .executions
                .as_ref()
                .map_or(true, |ids| record.executions.iter().any(|e| ids.contains(e)))
    }
}

/// Concurrent finding store
#[derive(Debug, Default)]
pub struct FindingStore {
    by_key: DashMap<IdentityKey, FindingRecord>,
    index: DashMap<EntityId, IdentityKey>,
}

impl FindingStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a finding or merge it into the live record with the same key,
    /// recording `execution` as an observer. Returns the stored state, or
    /// `None` for target-family entities.
    pub fn upsert(&self, scope: EntityId, draft: &Entity, execution: ExecutionId) -> Option<Entity> {
        let key = IdentityKey::of(scope, draft)?;
        let now = Utc::now();
        let stored = match self.by_key.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                record.entity = record.entity.merged(draft);
                if !record.is_active {
                    tracing::debug!(finding = %record.entity, "finding reactivated");
                    record.is_active = true;
                }
                record.last_seen = now;
                if !record.executions.contains(&execution) {
                    record.executions.push(execution);
                }
                record.entity.clone()
            }
            Entry::Vacant(vacant) => {
                let record = FindingRecord {
                    entity: draft.clone(),
                    scope,
                    is_active: true,
                    first_seen: now,
                    last_seen: now,
                    executions: vec![execution],
                };
                tracing::debug!(finding = %draft, execution = %execution, "finding created");
                vacant.insert(record).entity.clone()
            }
        };
        self.index.insert(stored.id(), key);
        Some(stored)
    }

    /// Persist the drafts of one execution.
    ///
    /// Drafts are stored parents first. Parent references pointing at other
    /// drafts of the batch are rewritten to the stored records; empty parent
    /// references are filled from `used`, the entities the execution
    /// consumed. Returns the stored findings in draft order.
    pub fn persist_batch(
        &self,
        scope: EntityId,
        drafts: &[Entity],
        used: &[Entity],
        execution: ExecutionId,
    ) -> Vec<Entity> {
        let mut order: Vec<usize> = (0..drafts.len()).collect();
        order.sort_by_key(|&i| drafts[i].ancestor_ids().len());

        let mut persisted: HashMap<EntityId, Entity> = HashMap::new();
        for i in order {
            let draft = &drafts[i];
            let lookup = |id: EntityId| persisted.get(&id).cloned().or_else(|| self.get(id));
            let relinked = draft.relinked(&Links::new(&lookup, used));
            if let Some(stored) = self.upsert(scope, &relinked, execution) {
                persisted.insert(draft.id(), stored);
            }
        }

        drafts
            .iter()
            .filter_map(|d| persisted.get(&d.id()).cloned())
            .collect()
    }

    /// Stored state by id
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<Entity> {
        let key = self.index.get(&id)?.clone();
        self.by_key.get(&key).map(|r| r.entity.clone())
    }

    /// Full record by id
    #[must_use]
    pub fn record(&self, id: EntityId) -> Option<FindingRecord> {
        let key = self.index.get(&id)?.clone();
        self.by_key.get(&key).map(|r| r.clone())
    }

    /// Retire a finding; it is reactivated when observed again
    pub fn deactivate(&self, id: EntityId) -> bool {
        let Some(key) = self.index.get(&id).map(|k| k.clone()) else {
            return false;
        };
        match self.by_key.get_mut(&key) {
            Some(mut record) => {
                record.is_active = false;
                true
            }
            None => false,
        }
    }

    /// Findings matching a query, oldest first
    #[must_use]
    pub fn query(&self, query: &FindingQuery) -> Vec<FindingRecord> {
        let mut records: Vec<FindingRecord> = self
            .by_key
            .iter()
            .filter(|r| query.accepts(r.value()))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| (r.first_seen, r.entity.id()));
        records
    }

    /// Active findings observed by any of `executions`
    #[must_use]
    pub fn observed_by(&self, executions: &[ExecutionId]) -> Vec<Entity> {
        self.query(&FindingQuery {
            executions: Some(executions.to_vec()),
            ..FindingQuery::default()
        })
        .into_iter()
        .map(|r| r.entity)
        .collect()
    }

    /// Number of stored findings
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
