//! Input type forest
//!
//! An input type is the role an argument consumes ("Port"), bound to the
//! entity kind tools produce and the user-declared kind used before any
//! tool has produced one. Parent links form a forest whose pre-order is the
//! order in which partitioning processes dimensions.

use crate::entity::EntityKind;
use crate::error::ModelError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Input type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputTypeName {
    /// OSINT data
    Osint,
    /// Hosts
    Host,
    /// Ports
    Port,
    /// Paths
    Path,
    /// Technologies
    Technology,
    /// Vulnerabilities
    Vulnerability,
    /// Credentials
    Credential,
    /// Exploits
    Exploit,
    /// Wordlists
    Wordlist,
}

impl fmt::Display for InputTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Osint => "osint",
            Self::Host => "host",
            Self::Port => "port",
            Self::Path => "path",
            Self::Technology => "technology",
            Self::Vulnerability => "vulnerability",
            Self::Credential => "credential",
            Self::Exploit => "exploit",
            Self::Wordlist => "wordlist",
        };
        f.write_str(name)
    }
}

/// One input type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputType {
    /// Name
    pub name: InputTypeName,
    /// Kind produced by tools
    pub primary: EntityKind,
    /// Kind declared by users, used when no primary entity is available
    pub fallback: Option<EntityKind>,
    /// Parent type
    pub parent: Option<InputTypeName>,
}

impl InputType {
    /// New input type without fallback or parent
    #[must_use]
    pub fn new(name: InputTypeName, primary: EntityKind) -> Self {
        Self {
            name,
            primary,
            fallback: None,
            parent: None,
        }
    }

    /// Set the fallback kind
    #[inline]
    #[must_use]
    pub fn with_fallback(mut self, fallback: EntityKind) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Set the parent type
    #[inline]
    #[must_use]
    pub fn with_parent(mut self, parent: InputTypeName) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Whether an entity kind can play this role
    #[must_use]
    pub fn admits(&self, kind: EntityKind) -> bool {
        self.primary == kind || self.fallback == Some(kind)
    }
}

/// Immutable input type forest
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: IndexMap<InputTypeName, InputType>,
    children: IndexMap<InputTypeName, Vec<InputTypeName>>,
    order: Vec<InputTypeName>,
}

impl TypeRegistry {
    /// Build a registry, rejecting anything that is not a forest
    pub fn new(types: Vec<InputType>) -> Result<Self, ModelError> {
        let mut declared = IndexMap::new();
        for ty in types {
            if declared.contains_key(&ty.name) {
                return Err(ModelError::DuplicateInputType(ty.name));
            }
            declared.insert(ty.name, ty);
        }
        for ty in declared.values() {
            if let Some(parent) = ty.parent {
                if !declared.contains_key(&parent) {
                    return Err(ModelError::UnknownParentType {
                        child: ty.name,
                        parent,
                    });
                }
            }
        }
        let registry = Self::assemble(declared);
        if let Some(unreached) = registry
            .types
            .keys()
            .find(|name| !registry.order.contains(name))
        {
            return Err(ModelError::CyclicTypeGraph(*unreached));
        }
        Ok(registry)
    }

    /// The built-in forest:
    ///
    /// ```text
    /// osint
    /// host -> port -> path
    ///              -> technology -> vulnerability -> exploit
    ///                            -> credential
    /// wordlist
    /// ```
    #[must_use]
    pub fn standard() -> Self {
        use EntityKind as K;
        use InputTypeName as N;
        let types = [
            InputType::new(N::Osint, K::Osint),
            InputType::new(N::Host, K::Host).with_fallback(K::Target),
            InputType::new(N::Port, K::Port)
                .with_fallback(K::TargetPort)
                .with_parent(N::Host),
            InputType::new(N::Path, K::Path)
                .with_fallback(K::TargetEndpoint)
                .with_parent(N::Port),
            InputType::new(N::Technology, K::Technology)
                .with_fallback(K::TargetTechnology)
                .with_parent(N::Port),
            InputType::new(N::Vulnerability, K::Vulnerability)
                .with_fallback(K::TargetVulnerability)
                .with_parent(N::Technology),
            InputType::new(N::Credential, K::Credential)
                .with_fallback(K::TargetAuthentication)
                .with_parent(N::Technology),
            InputType::new(N::Exploit, K::Exploit).with_parent(N::Vulnerability),
            InputType::new(N::Wordlist, K::Wordlist),
        ];
        Self::assemble(types.into_iter().map(|t| (t.name, t)).collect())
    }

    fn assemble(types: IndexMap<InputTypeName, InputType>) -> Self {
        let mut children: IndexMap<InputTypeName, Vec<InputTypeName>> =
            types.keys().map(|name| (*name, Vec::new())).collect();
        for ty in types.values() {
            if let Some(parent) = ty.parent {
                if let Some(siblings) = children.get_mut(&parent) {
                    siblings.push(ty.name);
                }
            }
        }

        // Pre-order walk from the roots; members of a cycle are never reached.
        let mut order = Vec::with_capacity(types.len());
        let mut stack: Vec<InputTypeName> = types
            .values()
            .filter(|t| t.parent.is_none())
            .map(|t| t.name)
            .rev()
            .collect();
        while let Some(name) = stack.pop() {
            if order.contains(&name) {
                continue;
            }
            order.push(name);
            if let Some(kids) = children.get(&name) {
                stack.extend(kids.iter().rev().copied());
            }
        }

        Self {
            types,
            children,
            order,
        }
    }

    /// Look up a type
    #[must_use]
    pub fn get(&self, name: InputTypeName) -> Option<&InputType> {
        self.types.get(&name)
    }

    /// Canonical processing order (parents before children)
    #[must_use]
    pub fn processing_order(&self) -> &[InputTypeName] {
        &self.order
    }

    /// Direct children of a type
    #[must_use]
    pub fn children(&self, name: InputTypeName) -> &[InputTypeName] {
        self.children.get(&name).map_or(&[][..], Vec::as_slice)
    }

    /// Types without a parent
    pub fn roots(&self) -> impl Iterator<Item = &InputType> {
        self.types.values().filter(|t| t.parent.is_none())
    }

    /// Type for which `kind` is the primary or fallback kind
    #[must_use]
    pub fn type_of(&self, kind: EntityKind) -> Option<InputTypeName> {
        self.types.values().find(|t| t.admits(kind)).map(|t| t.name)
    }

    /// Fallback kinds of the given types
    #[must_use]
    pub fn fallback_kinds(&self, names: &[InputTypeName]) -> Vec<EntityKind> {
        names
            .iter()
            .filter_map(|n| self.get(*n).and_then(|t| t.fallback))
            .collect()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InputTypeName as N;

    #[test]
    fn test_standard_processing_order() {
        let registry = TypeRegistry::standard();
        assert_eq!(
            registry.processing_order(),
            &[
                N::Osint,
                N::Host,
                N::Port,
                N::Path,
                N::Technology,
                N::Vulnerability,
                N::Exploit,
                N::Credential,
                N::Wordlist
            ]
        );
        assert_eq!(registry.children(N::Port), &[N::Path, N::Technology]);
        assert_eq!(registry.roots().count(), 3);
    }

    #[test]
    fn test_type_of_fallback_kind() {
        let registry = TypeRegistry::standard();
        assert_eq!(registry.type_of(EntityKind::TargetPort), Some(N::Port));
        assert_eq!(registry.type_of(EntityKind::Target), Some(N::Host));
        assert_eq!(registry.type_of(EntityKind::Wordlist), Some(N::Wordlist));
    }

    #[test]
    fn test_rejects_cycles() {
        let types = vec![
            InputType::new(N::Host, EntityKind::Host).with_parent(N::Port),
            InputType::new(N::Port, EntityKind::Port).with_parent(N::Host),
        ];
        assert!(matches!(TypeRegistry::new(types), Err(ModelError::CyclicTypeGraph(_))));
    }

    #[test]
    fn test_rejects_unknown_parent() {
        let types = vec![InputType::new(N::Port, EntityKind::Port).with_parent(N::Host)];
        assert_eq!(
            TypeRegistry::new(types).unwrap_err(),
            ModelError::UnknownParentType {
                child: N::Port,
                parent: N::Host
            }
        );
    }

    #[test]
    fn test_rejects_duplicates() {
        let types = vec![
            InputType::new(N::Host, EntityKind::Host),
            InputType::new(N::Host, EntityKind::Target),
        ];
        assert_eq!(
            TypeRegistry::new(types).unwrap_err(),
            ModelError::DuplicateInputType(N::Host)
        );
    }
}
