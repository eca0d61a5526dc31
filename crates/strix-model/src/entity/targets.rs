//! Target family: user-declared seed entities

use super::kinds::{AuthenticationKind, TargetKind, WordlistKind};
use super::ser;
use crate::args::{build_url, InputKeyword, ParsedArgs};
use crate::filter::{contains_ci, numeric_eq};
use crate::ids::EntityId;
use serde::Serialize;
use std::sync::Arc;

/// Scan target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// Identity
    pub id: EntityId,
    /// Address (IP, network, range or domain)
    pub address: String,
    /// Address classification
    pub kind: TargetKind,
}

impl Target {
    /// New target; the kind is derived from the address
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            id: EntityId::new(),
            kind: TargetKind::classify(&address),
            address,
        }
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        TargetKind::from_keyword(term) == Some(self.kind)
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        args.set_text(InputKeyword::Target, &self.address);
        args.set_text(InputKeyword::Host, &self.address);
        args.set_text(InputKeyword::Url, build_url(&self.address, None, None, None));
    }
}

/// Port declared on a target, optionally restricted to a base path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetPort {
    /// Identity
    pub id: EntityId,
    /// Owning target
    #[serde(serialize_with = "ser::owner")]
    pub target: Arc<Target>,
    /// Port number
    pub port: u16,
    /// Base path for web tools
    pub path: Option<String>,
}

impl TargetPort {
    /// New target port
    #[must_use]
    pub fn new(target: Arc<Target>, port: u16) -> Self {
        Self {
            id: EntityId::new(),
            target,
            port,
            path: None,
        }
    }

    /// Restrict web tools to a base path
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        numeric_eq(term, u64::from(self.port))
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        self.target.parse_into(args);
        args.push_port(self.port);
        args.set_text(
            InputKeyword::Target,
            format!("{}:{}", self.target.address, self.port),
        );
        args.set_text(
            InputKeyword::Url,
            build_url(&self.target.address, Some(self.port), None, self.path.as_deref()),
        );
        if let Some(path) = &self.path {
            args.set_text(InputKeyword::Endpoint, path);
        }
    }
}

/// Endpoint declared on a target port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetEndpoint {
    /// Identity
    pub id: EntityId,
    /// Owning target port
    #[serde(serialize_with = "ser::owner")]
    pub target_port: Arc<TargetPort>,
    /// Endpoint path
    pub endpoint: String,
}

impl TargetEndpoint {
    /// New endpoint
    #[must_use]
    pub fn new(target_port: Arc<TargetPort>, endpoint: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            target_port,
            endpoint: endpoint.into(),
        }
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        contains_ci(&self.endpoint, term)
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        self.target_port.parse_into(args);
        args.set_text(InputKeyword::Endpoint, &self.endpoint);
        args.set_text(
            InputKeyword::Url,
            build_url(
                &self.target_port.target.address,
                Some(self.target_port.port),
                None,
                Some(&self.endpoint),
            ),
        );
    }
}

/// Technology the user knows the target runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetTechnology {
    /// Identity
    pub id: EntityId,
    /// Owning target
    #[serde(serialize_with = "ser::owner")]
    pub target: Arc<Target>,
    /// Product name
    pub name: String,
    /// Product version
    pub version: Option<String>,
}

impl TargetTechnology {
    /// New declared technology
    #[must_use]
    pub fn new(target: Arc<Target>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            target,
            name: name.into(),
            version: None,
        }
    }

    /// Set the version
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        contains_ci(&self.name, term)
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        self.target.parse_into(args);
        args.set_text(InputKeyword::Technology, &self.name);
        if let Some(version) = &self.version {
            args.set_text(InputKeyword::Version, version);
        }
    }
}

/// Vulnerability the user knows the target has
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetVulnerability {
    /// Identity
    pub id: EntityId,
    /// Owning target
    #[serde(serialize_with = "ser::owner")]
    pub target: Arc<Target>,
    /// CVE identifier
    pub cve: String,
}

impl TargetVulnerability {
    /// New declared vulnerability
    #[must_use]
    pub fn new(target: Arc<Target>, cve: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            target,
            cve: cve.into(),
        }
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        term.eq_ignore_ascii_case("cve") || self.cve.eq_ignore_ascii_case(term)
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        self.target.parse_into(args);
        args.set_text(InputKeyword::Cve, &self.cve);
    }
}

/// Credentials the user supplies for a target port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetAuthentication {
    /// Identity
    pub id: EntityId,
    /// Owning target port
    #[serde(serialize_with = "ser::owner")]
    pub target_port: Arc<TargetPort>,
    /// Username, or cookie name for cookie authentication
    pub name: String,
    /// Password or token
    pub secret: String,
    /// Scheme
    pub kind: AuthenticationKind,
}

impl TargetAuthentication {
    /// New authentication
    #[must_use]
    pub fn new(
        target_port: Arc<TargetPort>,
        name: impl Into<String>,
        secret: impl Into<String>,
        kind: AuthenticationKind,
    ) -> Self {
        Self {
            id: EntityId::new(),
            target_port,
            name: name.into(),
            secret: secret.into(),
            kind,
        }
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        AuthenticationKind::from_keyword(term) == Some(self.kind)
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        self.target_port.parse_into(args);
        if !self.name.is_empty() {
            args.set_text(InputKeyword::Username, &self.name);
        }
        if !self.secret.is_empty() {
            args.set_text(InputKeyword::Secret, &self.secret);
        }
    }
}

/// Wordlist file available to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wordlist {
    /// Identity
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Purpose
    pub kind: WordlistKind,
    /// File path
    pub path: String,
}

impl Wordlist {
    /// New wordlist
    #[must_use]
    pub fn new(name: impl Into<String>, kind: WordlistKind, path: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            kind,
            path: path.into(),
        }
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        WordlistKind::from_keyword(term) == Some(self.kind)
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        args.set_text(InputKeyword::Wordlist, &self.path);
    }
}
