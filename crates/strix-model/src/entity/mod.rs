//! Entity sum type
//!
//! A closed union over the finding family (produced by tools) and the
//! target family (declared by users). Every kind provides:
//! - filter evaluation against an input's filter expression
//! - parsing into the argument accumulator
//! - identity key parts (findings only)
//! - parent references used by partitioning and relinking

pub mod findings;
pub mod kinds;
pub mod targets;

use crate::args::ParsedArgs;
use crate::filter::FilterExpr;
use crate::ids::EntityId;
use findings::{Credential, Exploit, Host, Osint, Path, Port, Technology, Vulnerability};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use targets::{
    Target, TargetAuthentication, TargetEndpoint, TargetPort, TargetTechnology,
    TargetVulnerability, Wordlist,
};

/// Entity kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// OSINT datum
    Osint,
    /// Host
    Host,
    /// Port
    Port,
    /// Path
    Path,
    /// Technology
    Technology,
    /// Credential
    Credential,
    /// Vulnerability
    Vulnerability,
    /// Exploit
    Exploit,
    /// Target
    Target,
    /// Target port
    TargetPort,
    /// Target endpoint
    TargetEndpoint,
    /// Declared technology
    TargetTechnology,
    /// Declared vulnerability
    TargetVulnerability,
    /// Declared authentication
    TargetAuthentication,
    /// Wordlist
    Wordlist,
}

impl EntityKind {
    /// Whether the kind belongs to the finding family
    #[must_use]
    pub fn is_finding(&self) -> bool {
        matches!(
            self,
            Self::Osint
                | Self::Host
                | Self::Port
                | Self::Path
                | Self::Technology
                | Self::Credential
                | Self::Vulnerability
                | Self::Exploit
        )
    }

    /// Whether the kind can be narrowed by a non-empty filter
    #[must_use]
    pub fn is_filterable(&self) -> bool {
        !matches!(self, Self::Credential | Self::Exploit)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Osint => "osint",
            Self::Host => "host",
            Self::Port => "port",
            Self::Path => "path",
            Self::Technology => "technology",
            Self::Credential => "credential",
            Self::Vulnerability => "vulnerability",
            Self::Exploit => "exploit",
            Self::Target => "target",
            Self::TargetPort => "target_port",
            Self::TargetEndpoint => "target_endpoint",
            Self::TargetTechnology => "target_technology",
            Self::TargetVulnerability => "target_vulnerability",
            Self::TargetAuthentication => "target_authentication",
            Self::Wordlist => "wordlist",
        };
        f.write_str(name)
    }
}

/// Any entity. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    /// OSINT datum
    Osint(Arc<Osint>),
    /// Host
    Host(Arc<Host>),
    /// Port
    Port(Arc<Port>),
    /// Path
    Path(Arc<Path>),
    /// Technology
    Technology(Arc<Technology>),
    /// Credential
    Credential(Arc<Credential>),
    /// Vulnerability
    Vulnerability(Arc<Vulnerability>),
    /// Exploit
    Exploit(Arc<Exploit>),
    /// Target
    Target(Arc<Target>),
    /// Target port
    TargetPort(Arc<TargetPort>),
    /// Target endpoint
    TargetEndpoint(Arc<TargetEndpoint>),
    /// Declared technology
    TargetTechnology(Arc<TargetTechnology>),
    /// Declared vulnerability
    TargetVulnerability(Arc<TargetVulnerability>),
    /// Declared authentication
    TargetAuthentication(Arc<TargetAuthentication>),
    /// Wordlist
    Wordlist(Arc<Wordlist>),
}

/// Filter evaluation context derived from the task's target
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterContext<'a> {
    target_ports: &'a [Arc<TargetPort>],
}

impl<'a> FilterContext<'a> {
    /// Context with the target's declared ports
    #[must_use]
    pub fn new(target_ports: &'a [Arc<TargetPort>]) -> Self {
        Self { target_ports }
    }

    /// Base path declared for a port number
    #[must_use]
    pub fn base_path(&self, port: u16) -> Option<&'a str> {
        self.target_ports
            .iter()
            .find(|tp| tp.port == port)
            .and_then(|tp| tp.path.as_deref())
            .filter(|p| !p.is_empty())
    }
}

/// Entity types that can be referenced as a parent
pub trait Identified: Sized {
    /// Identity
    fn id(&self) -> EntityId;
    /// Downcast an entity
    fn from_entity(entity: &Entity) -> Option<Arc<Self>>;
}

macro_rules! entity_variant {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl Identified for $variant {
                fn id(&self) -> EntityId {
                    self.id
                }

                fn from_entity(entity: &Entity) -> Option<Arc<Self>> {
                    match entity {
                        Entity::$variant(inner) => Some(Arc::clone(inner)),
                        _ => None,
                    }
                }
            }

            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(Arc::new(value))
                }
            }

            impl From<Arc<$variant>> for Entity {
                fn from(value: Arc<$variant>) -> Self {
                    Entity::$variant(value)
                }
            }
        )+

        impl Entity {
            /// Identity
            #[must_use]
            pub fn id(&self) -> EntityId {
                match self {
                    $(Entity::$variant(inner) => inner.id,)+
                }
            }

            /// Kind tag
            #[must_use]
            pub fn kind(&self) -> EntityKind {
                match self {
                    $(Entity::$variant(_) => EntityKind::$variant,)+
                }
            }
        }
    };
}

entity_variant!(
    Osint,
    Host,
    Port,
    Path,
    Technology,
    Credential,
    Vulnerability,
    Exploit,
    Target,
    TargetPort,
    TargetEndpoint,
    TargetTechnology,
    TargetVulnerability,
    TargetAuthentication,
    Wordlist,
);

impl Entity {
    /// Whether this entity belongs to the finding family
    #[inline]
    #[must_use]
    pub fn is_finding(&self) -> bool {
        self.kind().is_finding()
    }

    /// Direct parent references
    #[must_use]
    pub fn parents(&self) -> Vec<Entity> {
        fn opt<T>(parent: &Option<Arc<T>>) -> Option<Entity>
        where
            Entity: From<Arc<T>>,
        {
            parent.as_ref().map(|p| Entity::from(Arc::clone(p)))
        }

        match self {
            Self::Osint(_) | Self::Host(_) | Self::Target(_) | Self::Wordlist(_) => Vec::new(),
            Self::Port(p) => opt(&p.host).into_iter().collect(),
            Self::Path(p) => opt(&p.port).into_iter().collect(),
            Self::Technology(t) => opt(&t.port).into_iter().collect(),
            Self::Credential(c) => opt(&c.technology).into_iter().collect(),
            Self::Vulnerability(v) => opt(&v.technology).into_iter().chain(opt(&v.port)).collect(),
            Self::Exploit(e) => opt(&e.vulnerability).into_iter().chain(opt(&e.technology)).collect(),
            Self::TargetPort(tp) => vec![Entity::from(Arc::clone(&tp.target))],
            Self::TargetEndpoint(te) => vec![Entity::from(Arc::clone(&te.target_port))],
            Self::TargetTechnology(tt) => vec![Entity::from(Arc::clone(&tt.target))],
            Self::TargetVulnerability(tv) => vec![Entity::from(Arc::clone(&tv.target))],
            Self::TargetAuthentication(ta) => vec![Entity::from(Arc::clone(&ta.target_port))],
        }
    }

    /// Identities of every transitive parent, nearest first, without duplicates
    #[must_use]
    pub fn ancestor_ids(&self) -> Vec<EntityId> {
        let mut ids = Vec::new();
        let mut frontier = self.parents();
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for parent in frontier {
                if !ids.contains(&parent.id()) {
                    ids.push(parent.id());
                    next.extend(parent.parents());
                }
            }
            frontier = next;
        }
        ids
    }

    /// Evaluate an input filter against this entity
    #[must_use]
    pub fn accepts(&self, filter: &FilterExpr, ctx: &FilterContext<'_>) -> bool {
        if let Self::Path(path) = self {
            if !path.within_target_base(ctx) {
                return false;
            }
        }
        if filter.is_empty() {
            return true;
        }
        if !self.kind().is_filterable() {
            return false;
        }
        filter.accepts(|term| self.matches_term(term))
    }

    fn matches_term(&self, term: &str) -> bool {
        match self {
            Self::Osint(o) => o.matches(term),
            Self::Host(h) => h.matches(term),
            Self::Port(p) => p.matches(term),
            Self::Path(p) => p.matches(term),
            Self::Technology(t) => t.matches(term),
            Self::Vulnerability(v) => v.matches(term),
            Self::Target(t) => t.matches(term),
            Self::TargetPort(tp) => tp.matches(term),
            Self::TargetEndpoint(te) => te.matches(term),
            Self::TargetTechnology(tt) => tt.matches(term),
            Self::TargetVulnerability(tv) => tv.matches(term),
            Self::TargetAuthentication(ta) => ta.matches(term),
            Self::Wordlist(w) => w.matches(term),
            Self::Credential(_) | Self::Exploit(_) => false,
        }
    }

    /// Contribute this entity's values to an accumulator
    pub fn parse_into(&self, args: &mut ParsedArgs) {
        match self {
            Self::Osint(o) => o.parse_into(args),
            Self::Host(h) => h.parse_into(args),
            Self::Port(p) => p.parse_into(args),
            Self::Path(p) => p.parse_into(args),
            Self::Technology(t) => t.parse_into(args),
            Self::Credential(c) => c.parse_into(args),
            Self::Vulnerability(v) => v.parse_into(args),
            Self::Exploit(e) => e.parse_into(args),
            Self::Target(t) => t.parse_into(args),
            Self::TargetPort(tp) => tp.parse_into(args),
            Self::TargetEndpoint(te) => te.parse_into(args),
            Self::TargetTechnology(tt) => tt.parse_into(args),
            Self::TargetVulnerability(tv) => tv.parse_into(args),
            Self::TargetAuthentication(ta) => ta.parse_into(args),
            Self::Wordlist(w) => w.parse_into(args),
        }
    }

    /// Values of the kind's key fields; `None` for the target family
    #[must_use]
    pub fn key_parts(&self) -> Option<Vec<Option<String>>> {
        let parts = match self {
            Self::Osint(o) => o.key_parts(),
            Self::Host(h) => h.key_parts(),
            Self::Port(p) => p.key_parts(),
            Self::Path(p) => p.key_parts(),
            Self::Technology(t) => t.key_parts(),
            Self::Credential(c) => c.key_parts(),
            Self::Vulnerability(v) => v.key_parts(),
            Self::Exploit(e) => e.key_parts(),
            _ => return None,
        };
        Some(parts)
    }

    /// Merge a newer observation into this record, keeping this identity.
    ///
    /// Present values are never replaced by empty ones. Entities of
    /// different kinds are not merged.
    #[must_use]
    pub fn merged(&self, newer: &Entity) -> Entity {
        match (self, newer) {
            (Self::Osint(a), Self::Osint(b)) => a.merged(b).into(),
            (Self::Host(a), Self::Host(b)) => a.merged(b).into(),
            (Self::Port(a), Self::Port(b)) => a.merged(b).into(),
            (Self::Path(a), Self::Path(b)) => a.merged(b).into(),
            (Self::Technology(a), Self::Technology(b)) => a.merged(b).into(),
            (Self::Credential(a), Self::Credential(b)) => a.merged(b).into(),
            (Self::Vulnerability(a), Self::Vulnerability(b)) => a.merged(b).into(),
            (Self::Exploit(a), Self::Exploit(b)) => a.merged(b).into(),
            _ => self.clone(),
        }
    }

    /// Rewrite parent references through `links`
    #[must_use]
    pub fn relinked(&self, links: &Links<'_>) -> Entity {
        match self {
            Self::Port(p) => p.relinked(links).into(),
            Self::Path(p) => p.relinked(links).into(),
            Self::Technology(t) => t.relinked(links).into(),
            Self::Credential(c) => c.relinked(links).into(),
            Self::Vulnerability(v) => v.relinked(links).into(),
            Self::Exploit(e) => e.relinked(links).into(),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Osint(o) => write!(f, "osint {} ({})", o.data, o.data_type),
            Self::Host(h) => write!(f, "host {}", h.address),
            Self::Port(p) => match &p.host {
                Some(h) => write!(f, "port {}:{}", h.address, p.port),
                None => write!(f, "port {}", p.port),
            },
            Self::Path(p) => write!(f, "path {}", p.path),
            Self::Technology(t) => match &t.version {
                Some(v) => write!(f, "technology {} {}", t.name, v),
                None => write!(f, "technology {}", t.name),
            },
            Self::Credential(c) => write!(
                f,
                "credential {}",
                c.username.as_deref().or(c.email.as_deref()).unwrap_or("-")
            ),
            Self::Vulnerability(v) => match &v.cve {
                Some(cve) => write!(f, "vulnerability {} ({cve})", v.name),
                None => write!(f, "vulnerability {}", v.name),
            },
            Self::Exploit(e) => write!(f, "exploit {}", e.title),
            Self::Target(t) => write!(f, "target {}", t.address),
            Self::TargetPort(tp) => write!(f, "target port {}", tp.port),
            Self::TargetEndpoint(te) => write!(f, "target endpoint {}", te.endpoint),
            Self::TargetTechnology(tt) => write!(f, "target technology {}", tt.name),
            Self::TargetVulnerability(tv) => write!(f, "target vulnerability {}", tv.cve),
            Self::TargetAuthentication(ta) => {
                write!(f, "target authentication {} ({})", ta.name, ta.kind)
            }
            Self::Wordlist(w) => write!(f, "wordlist {}", w.name),
        }
    }
}

/// Parent resolution used when persisting drafts
pub struct Links<'a> {
    persisted: &'a dyn Fn(EntityId) -> Option<Entity>,
    used: &'a [Entity],
}

impl<'a> Links<'a> {
    /// `persisted` maps a draft or record id to the stored record; `used`
    /// are the entities the execution consumed, used to fill empty parents.
    #[must_use]
    pub fn new(persisted: &'a dyn Fn(EntityId) -> Option<Entity>, used: &'a [Entity]) -> Self {
        Self { persisted, used }
    }

    pub(crate) fn resolve<T: Identified>(&self, slot: &Option<Arc<T>>) -> Option<Arc<T>> {
        match slot {
            Some(parent) => (self.persisted)(parent.id())
                .and_then(|e| T::from_entity(&e))
                .or_else(|| Some(Arc::clone(parent))),
            None => self.used.iter().find_map(T::from_entity),
        }
    }
}

impl fmt::Debug for Links<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links").field("used", &self.used.len()).finish_non_exhaustive()
    }
}

/// Newer value unless it is absent or blank
pub(crate) fn pick(newer: &Option<String>, current: &Option<String>) -> Option<String> {
    match newer {
        Some(value) if !value.trim().is_empty() => Some(value.clone()),
        _ => current.clone(),
    }
}

pub(crate) fn pick_copy<T: Copy>(newer: Option<T>, current: Option<T>) -> Option<T> {
    newer.or(current)
}

pub(crate) mod ser {
    use super::Identified;
    use serde::{Serialize, Serializer};
    use std::sync::Arc;

    pub(crate) fn parent<S, T>(value: &Option<Arc<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Identified,
    {
        value.as_ref().map(|p| p.id()).serialize(serializer)
    }

    pub(crate) fn owner<S, T>(value: &Arc<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Identified,
    {
        value.id().serialize(serializer)
    }
}
