//! Finding family: entities produced by tools

use super::kinds::{HostOs, OsintDataType, PathKind, PortStatus, Protocol, Severity, TargetKind};
use super::{pick, pick_copy, ser, FilterContext, Links};
use crate::args::{build_url, InputKeyword, ParsedArgs};
use crate::filter::{contains_ci, numeric_eq};
use crate::ids::EntityId;
use serde::Serialize;
use std::sync::Arc;

/// Open-source intelligence datum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Osint {
    /// Identity
    pub id: EntityId,
    /// Datum
    pub data: String,
    /// Kind of datum
    pub data_type: OsintDataType,
    /// Where it was found
    pub source: Option<String>,
}

impl Osint {
    /// New OSINT datum
    #[must_use]
    pub fn new(data: impl Into<String>, data_type: OsintDataType) -> Self {
        Self {
            id: EntityId::new(),
            data: data.into(),
            data_type,
            source: None,
        }
    }

    /// Set the source
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        OsintDataType::from_keyword(term) == Some(self.data_type)
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        match self.data_type {
            OsintDataType::Ip | OsintDataType::Domain => {
                args.set_text(InputKeyword::Target, &self.data);
                args.set_text(InputKeyword::Host, &self.data);
                args.set_text(InputKeyword::Url, build_url(&self.data, None, None, None));
            }
            OsintDataType::Url => args.set_text(InputKeyword::Url, &self.data),
            OsintDataType::Email => args.set_text(InputKeyword::Email, &self.data),
            OsintDataType::User => args.set_text(InputKeyword::Username, &self.data),
            _ => {}
        }
    }

    pub(crate) fn key_parts(&self) -> Vec<Option<String>> {
        vec![Some(self.data.clone()), Some(self.data_type.to_string())]
    }

    pub(crate) fn merged(&self, newer: &Self) -> Self {
        Self {
            source: pick(&newer.source, &self.source),
            ..self.clone()
        }
    }
}

/// Network host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    /// Identity
    pub id: EntityId,
    /// IP address or name
    pub address: String,
    /// OS description
    pub os: Option<String>,
    /// OS family
    pub os_type: Option<HostOs>,
}

impl Host {
    /// New host
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            address: address.into(),
            os: None,
            os_type: None,
        }
    }

    /// Set the operating system
    #[inline]
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>, os_type: HostOs) -> Self {
        self.os = Some(os.into());
        self.os_type = Some(os_type);
        self
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        TargetKind::from_keyword(term) == Some(TargetKind::classify(&self.address))
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        args.set_text(InputKeyword::Target, &self.address);
        args.set_text(InputKeyword::Host, &self.address);
        args.set_text(InputKeyword::Url, build_url(&self.address, None, None, None));
    }

    pub(crate) fn key_parts(&self) -> Vec<Option<String>> {
        vec![Some(self.address.clone())]
    }

    pub(crate) fn merged(&self, newer: &Self) -> Self {
        Self {
            os: pick(&newer.os, &self.os),
            os_type: pick_copy(newer.os_type, self.os_type),
            ..self.clone()
        }
    }
}

/// Port of a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Port {
    /// Identity
    pub id: EntityId,
    /// Owning host
    #[serde(serialize_with = "ser::parent")]
    pub host: Option<Arc<Host>>,
    /// Port number
    pub port: u16,
    /// State
    pub status: PortStatus,
    /// Transport protocol
    pub protocol: Protocol,
    /// Service name
    pub service: Option<String>,
}

impl Port {
    /// New open TCP port
    #[must_use]
    pub fn new(host: Option<Arc<Host>>, port: u16) -> Self {
        Self {
            id: EntityId::new(),
            host,
            port,
            status: PortStatus::Open,
            protocol: Protocol::Tcp,
            service: None,
        }
    }

    /// Set the service name
    #[inline]
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the state
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: PortStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the protocol
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        numeric_eq(term, u64::from(self.port))
            || self.service.as_deref().is_some_and(|s| contains_ci(s, term))
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        args.push_port(self.port);
        if let Some(host) = &self.host {
            args.set_text(InputKeyword::Target, format!("{}:{}", host.address, self.port));
            args.set_text(InputKeyword::Host, &host.address);
            args.set_text(
                InputKeyword::Url,
                build_url(&host.address, Some(self.port), self.service.as_deref(), None),
            );
        }
    }

    pub(crate) fn key_parts(&self) -> Vec<Option<String>> {
        vec![
            self.host.as_ref().map(|h| h.id.to_string()),
            Some(self.port.to_string()),
            Some(self.protocol.to_string()),
        ]
    }

    pub(crate) fn merged(&self, newer: &Self) -> Self {
        Self {
            status: newer.status,
            service: pick(&newer.service, &self.service),
            ..self.clone()
        }
    }

    pub(crate) fn relinked(&self, links: &Links<'_>) -> Self {
        Self {
            host: links.resolve(&self.host),
            ..self.clone()
        }
    }
}

/// Path discovered on a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    /// Identity
    pub id: EntityId,
    /// Owning port
    #[serde(serialize_with = "ser::parent")]
    pub port: Option<Arc<Port>>,
    /// Path, always starting with `/` for endpoints
    pub path: String,
    /// Response status
    pub status: Option<u16>,
    /// Free-form details
    pub extra_info: Option<String>,
    /// Kind
    pub kind: PathKind,
}

impl Path {
    /// New endpoint path
    #[must_use]
    pub fn new(port: Option<Arc<Port>>, path: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            port,
            path: clean_path(&path.into()),
            status: None,
            extra_info: None,
            kind: PathKind::Endpoint,
        }
    }

    /// Set the response status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the kind
    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: PathKind) -> Self {
        self.kind = kind;
        self
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        PathKind::from_keyword(term) == Some(self.kind)
            || self.status.is_some_and(|s| numeric_eq(term, u64::from(s)))
            || contains_ci(&self.path, term)
    }

    /// The base-path restriction declared on the target for this port
    pub(crate) fn within_target_base(&self, ctx: &FilterContext<'_>) -> bool {
        let Some(port) = &self.port else {
            return true;
        };
        match ctx.base_path(port.port) {
            Some(base) => comparison_path(&self.path).starts_with(&comparison_path(base)),
            None => true,
        }
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        if let Some(port) = &self.port {
            port.parse_into(args);
            if let Some(host) = &port.host {
                args.set_text(
                    InputKeyword::Url,
                    build_url(&host.address, Some(port.port), port.service.as_deref(), Some(&self.path)),
                );
            }
        }
        args.set_text(InputKeyword::Endpoint, &self.path);
    }

    pub(crate) fn key_parts(&self) -> Vec<Option<String>> {
        vec![self.port.as_ref().map(|p| p.id.to_string()), Some(self.path.clone())]
    }

    pub(crate) fn merged(&self, newer: &Self) -> Self {
        Self {
            status: pick_copy(newer.status, self.status),
            extra_info: pick(&newer.extra_info, &self.extra_info),
            kind: newer.kind,
            ..self.clone()
        }
    }

    pub(crate) fn relinked(&self, links: &Links<'_>) -> Self {
        Self {
            port: links.resolve(&self.port),
            ..self.clone()
        }
    }
}

/// Technology (product) running on a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Technology {
    /// Identity
    pub id: EntityId,
    /// Port it runs on
    #[serde(serialize_with = "ser::parent")]
    pub port: Option<Arc<Port>>,
    /// Product name
    pub name: String,
    /// Product version
    pub version: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Reference URL
    pub reference: Option<String>,
}

impl Technology {
    /// New technology
    #[must_use]
    pub fn new(port: Option<Arc<Port>>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            port,
            name: name.into(),
            version: None,
            description: None,
            reference: None,
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
        if let Some(port) = &self.port {
            port.parse_into(args);
        }
        args.set_text(InputKeyword::Technology, &self.name);
        if let Some(version) = &self.version {
            args.set_text(InputKeyword::Version, version);
        }
    }

    pub(crate) fn key_parts(&self) -> Vec<Option<String>> {
        vec![
            self.port.as_ref().map(|p| p.id.to_string()),
            Some(self.name.clone()),
            self.version.clone(),
        ]
    }

    pub(crate) fn merged(&self, newer: &Self) -> Self {
        Self {
            description: pick(&newer.description, &self.description),
            reference: pick(&newer.reference, &self.reference),
            ..self.clone()
        }
    }

    pub(crate) fn relinked(&self, links: &Links<'_>) -> Self {
        Self {
            port: links.resolve(&self.port),
            ..self.clone()
        }
    }
}

/// Exposed credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    /// Identity
    pub id: EntityId,
    /// Technology it belongs to
    #[serde(serialize_with = "ser::parent")]
    pub technology: Option<Arc<Technology>>,
    /// Email
    pub email: Option<String>,
    /// Username
    pub username: Option<String>,
    /// Secret
    pub secret: Option<String>,
    /// Where it was found
    pub context: Option<String>,
}

impl Credential {
    /// New credential with no fields
    #[must_use]
    pub fn new(technology: Option<Arc<Technology>>) -> Self {
        Self {
            id: EntityId::new(),
            technology,
            email: None,
            username: None,
            secret: None,
            context: None,
        }
    }

    /// Set the username
    #[inline]
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the secret
    #[inline]
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set the email
    #[inline]
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        if let Some(technology) = &self.technology {
            technology.parse_into(args);
        }
        for (key, value) in [
            (InputKeyword::Email, &self.email),
            (InputKeyword::Username, &self.username),
            (InputKeyword::Secret, &self.secret),
        ] {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                args.set_text(key, value);
            }
        }
    }

    pub(crate) fn key_parts(&self) -> Vec<Option<String>> {
        vec![
            self.technology.as_ref().map(|t| t.id.to_string()),
            self.email.clone(),
            self.username.clone(),
            self.secret.clone(),
        ]
    }

    pub(crate) fn merged(&self, newer: &Self) -> Self {
        Self {
            context: pick(&newer.context, &self.context),
            ..self.clone()
        }
    }

    pub(crate) fn relinked(&self, links: &Links<'_>) -> Self {
        Self {
            technology: links.resolve(&self.technology),
            ..self.clone()
        }
    }
}

/// Vulnerability affecting a technology or a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vulnerability {
    /// Identity
    pub id: EntityId,
    /// Affected technology
    #[serde(serialize_with = "ser::parent")]
    pub technology: Option<Arc<Technology>>,
    /// Affected port
    #[serde(serialize_with = "ser::parent")]
    pub port: Option<Arc<Port>>,
    /// Title
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Severity
    pub severity: Severity,
    /// CVE identifier
    pub cve: Option<String>,
    /// CWE identifier
    pub cwe: Option<String>,
    /// Reference URL
    pub reference: Option<String>,
}

impl Vulnerability {
    /// New vulnerability with medium severity
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            technology: None,
            port: None,
            name: name.into(),
            description: None,
            severity: Severity::Medium,
            cve: None,
            cwe: None,
            reference: None,
        }
    }

    /// Attach to a technology
    #[inline]
    #[must_use]
    pub fn on_technology(mut self, technology: Arc<Technology>) -> Self {
        self.technology = Some(technology);
        self
    }

    /// Attach to a port
    #[inline]
    #[must_use]
    pub fn on_port(mut self, port: Arc<Port>) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the CVE
    #[inline]
    #[must_use]
    pub fn with_cve(mut self, cve: impl Into<String>) -> Self {
        self.cve = Some(cve.into());
        self
    }

    /// Set the CWE
    #[inline]
    #[must_use]
    pub fn with_cwe(mut self, cwe: impl Into<String>) -> Self {
        self.cwe = Some(cwe.into());
        self
    }

    /// Set the severity
    #[inline]
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub(crate) fn matches(&self, term: &str) -> bool {
        Severity::from_keyword(term) == Some(self.severity)
            || (term.eq_ignore_ascii_case("cve") && self.cve.is_some())
            || self.cve.as_deref().is_some_and(|c| contains_ci(c, term))
            || self.cwe.as_deref().is_some_and(|c| contains_ci(c, term))
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        if let Some(technology) = &self.technology {
            technology.parse_into(args);
        } else if let Some(port) = &self.port {
            port.parse_into(args);
        }
        if let Some(cve) = &self.cve {
            args.set_text(InputKeyword::Cve, cve);
        }
    }

    pub(crate) fn key_parts(&self) -> Vec<Option<String>> {
        vec![
            self.technology.as_ref().map(|t| t.id.to_string()),
            self.port.as_ref().map(|p| p.id.to_string()),
            Some(self.name.clone()),
            self.cve.clone(),
        ]
    }

    pub(crate) fn merged(&self, newer: &Self) -> Self {
        Self {
            description: pick(&newer.description, &self.description),
            severity: newer.severity,
            cwe: pick(&newer.cwe, &self.cwe),
            reference: pick(&newer.reference, &self.reference),
            ..self.clone()
        }
    }

    pub(crate) fn relinked(&self, links: &Links<'_>) -> Self {
        Self {
            technology: links.resolve(&self.technology),
            port: links.resolve(&self.port),
            ..self.clone()
        }
    }
}

/// Public exploit for a vulnerability or technology
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exploit {
    /// Identity
    pub id: EntityId,
    /// Exploited vulnerability
    #[serde(serialize_with = "ser::parent")]
    pub vulnerability: Option<Arc<Vulnerability>>,
    /// Exploited technology
    #[serde(serialize_with = "ser::parent")]
    pub technology: Option<Arc<Technology>>,
    /// Title
    pub title: String,
    /// Exploit-DB identifier
    pub edb_id: Option<u32>,
    /// Reference URL
    pub reference: Option<String>,
}

impl Exploit {
    /// New exploit
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            vulnerability: None,
            technology: None,
            title: title.into(),
            edb_id: None,
            reference: None,
        }
    }

    /// Attach to a vulnerability
    #[inline]
    #[must_use]
    pub fn for_vulnerability(mut self, vulnerability: Arc<Vulnerability>) -> Self {
        self.vulnerability = Some(vulnerability);
        self
    }

    /// Set the Exploit-DB identifier
    #[inline]
    #[must_use]
    pub fn with_edb_id(mut self, edb_id: u32) -> Self {
        self.edb_id = Some(edb_id);
        self
    }

    pub(crate) fn parse_into(&self, args: &mut ParsedArgs) {
        if let Some(vulnerability) = &self.vulnerability {
            vulnerability.parse_into(args);
        } else if let Some(technology) = &self.technology {
            technology.parse_into(args);
        }
        args.set_text(InputKeyword::Exploit, &self.title);
    }

    pub(crate) fn key_parts(&self) -> Vec<Option<String>> {
        vec![
            self.vulnerability.as_ref().map(|v| v.id.to_string()),
            self.technology.as_ref().map(|t| t.id.to_string()),
            self.edb_id.map(|id| id.to_string()),
            self.reference.clone(),
        ]
    }

    pub(crate) fn merged(&self, newer: &Self) -> Self {
        Self {
            title: if newer.title.is_empty() {
                self.title.clone()
            } else {
                newer.title.clone()
            },
            ..self.clone()
        }
    }

    pub(crate) fn relinked(&self, links: &Links<'_>) -> Self {
        Self {
            vulnerability: links.resolve(&self.vulnerability),
            technology: links.resolve(&self.technology),
            ..self.clone()
        }
    }
}

/// Normalize a discovered path: leading `/`, no trailing whitespace
fn clean_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Path form used for prefix comparison: normalized with a trailing `/`
fn comparison_path(path: &str) -> String {
    let mut path = clean_path(path);
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port80() -> Arc<Port> {
        let host = Arc::new(Host::new("10.10.10.1"));
        Arc::new(Port::new(Some(host), 80).with_service("http"))
    }

    #[test]
    fn test_path_parse_chains_to_port_and_host() {
        let path = Path::new(Some(port80()), "robots.txt");
        let mut args = ParsedArgs::new();
        path.parse_into(&mut args);
        assert_eq!(args.text(InputKeyword::Host).as_deref(), Some("10.10.10.1"));
        assert_eq!(args.text(InputKeyword::Endpoint).as_deref(), Some("/robots.txt"));
        assert_eq!(args.text(InputKeyword::Url).as_deref(), Some("http://10.10.10.1/robots.txt"));
        assert_eq!(args.text(InputKeyword::PortsCommas).as_deref(), Some("80"));
    }

    #[test]
    fn test_port_filters() {
        let port = port80();
        assert!(port.matches("80"));
        assert!(port.matches("HTTP"));
        assert!(!port.matches("ssh"));
    }

    #[test]
    fn test_vulnerability_filters() {
        let vuln = Vulnerability::new("RCE")
            .with_cve("CVE-2021-44228")
            .with_cwe("CWE-502")
            .with_severity(Severity::Critical);
        assert!(vuln.matches("critical"));
        assert!(vuln.matches("cve"));
        assert!(vuln.matches("cve-2021-44228"));
        assert!(vuln.matches("cwe-502"));
        assert!(!vuln.matches("low"));
        assert!(!Vulnerability::new("x").matches("cve"));
    }

    #[test]
    fn test_merge_keeps_present_values() {
        let old = Vulnerability::new("RCE").with_cwe("CWE-502");
        let mut newer = old.clone();
        newer.cwe = None;
        newer.description = Some("remote code execution".into());
        let merged = old.merged(&newer);
        assert_eq!(merged.cwe.as_deref(), Some("CWE-502"));
        assert_eq!(merged.description.as_deref(), Some("remote code execution"));
    }

    #[test]
    fn test_comparison_path() {
        assert_eq!(comparison_path("admin"), "/admin/");
        assert_eq!(comparison_path("/admin/"), "/admin/");
    }
}
