//! Finding identity keys

use crate::entity::{Entity, EntityKind};
use crate::ids::EntityId;
use serde::Serialize;

/// Uniqueness key of a finding within one target scope.
///
/// Reference fields contribute the referenced record's id, so parents must
/// be relinked to their persisted records before the key is computed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IdentityKey {
    /// Target the finding was observed on
    pub scope: EntityId,
    /// Finding kind
    pub kind: EntityKind,
    /// Key field values in declaration order
    pub parts: Vec<Option<String>>,
}

impl IdentityKey {
    /// Key for a finding; `None` for target-family entities
    #[must_use]
    pub fn of(scope: EntityId, entity: &Entity) -> Option<Self> {
        entity.key_parts().map(|parts| Self {
            scope,
            kind: entity.kind(),
            parts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_same_key_fields_same_key() {
        let scope = EntityId::new();
        let a: Entity = Host::new("10.0.0.1").into();
        let b: Entity = Host::new("10.0.0.1").with_os("Ubuntu", HostOs::Linux).into();
        assert_eq!(IdentityKey::of(scope, &a), IdentityKey::of(scope, &b));
    }

    #[test]
    fn test_scope_separates_targets() {
        let a: Entity = Host::new("10.0.0.1").into();
        assert_ne!(IdentityKey::of(EntityId::new(), &a), IdentityKey::of(EntityId::new(), &a));
    }

    #[test]
    fn test_reference_fields_use_parent_ids() {
        let scope = EntityId::new();
        let h1 = Arc::new(Host::new("10.0.0.1"));
        let h2 = Arc::new(Host::new("10.0.0.2"));
        let p1: Entity = Port::new(Some(h1), 80).into();
        let p2: Entity = Port::new(Some(h2), 80).into();
        assert_ne!(IdentityKey::of(scope, &p1), IdentityKey::of(scope, &p2));
    }

    #[test]
    fn test_targets_have_no_key() {
        let t: Entity = Target::new("10.0.0.1").into();
        assert!(IdentityKey::of(EntityId::new(), &t).is_none());
    }
}
