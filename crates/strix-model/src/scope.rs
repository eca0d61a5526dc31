//! Target scope: a target with everything the user declared for it

use crate::entity::kinds::{AuthenticationKind, WordlistKind};
use crate::entity::targets::{
    Target, TargetAuthentication, TargetEndpoint, TargetPort, TargetTechnology,
    TargetVulnerability, Wordlist,
};
use crate::entity::{Entity, EntityKind, FilterContext};
use std::sync::Arc;

/// Seed entities of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetScope {
    /// Target
    pub target: Arc<Target>,
    /// Declared ports
    pub ports: Vec<Arc<TargetPort>>,
    /// Declared endpoints
    pub endpoints: Vec<Arc<TargetEndpoint>>,
    /// Declared technologies
    pub technologies: Vec<Arc<TargetTechnology>>,
    /// Declared vulnerabilities
    pub vulnerabilities: Vec<Arc<TargetVulnerability>>,
    /// Declared authentications, at most one per port
    pub authentications: Vec<Arc<TargetAuthentication>>,
    /// Wordlists offered to the task
    pub wordlists: Vec<Arc<Wordlist>>,
}

impl TargetScope {
    /// Scope with only a target
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            target: Arc::new(Target::new(address)),
            ports: Vec::new(),
            endpoints: Vec::new(),
            technologies: Vec::new(),
            vulnerabilities: Vec::new(),
            authentications: Vec::new(),
            wordlists: Vec::new(),
        }
    }

    /// Declare a port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.ports.push(Arc::new(TargetPort::new(Arc::clone(&self.target), port)));
        self
    }

    /// Declare a port restricted to a base path
    #[must_use]
    pub fn with_port_path(mut self, port: u16, path: impl Into<String>) -> Self {
        self.ports
            .push(Arc::new(TargetPort::new(Arc::clone(&self.target), port).with_path(path)));
        self
    }

    /// Declare an endpoint on a declared port; the port is declared if missing
    #[must_use]
    pub fn with_endpoint(mut self, port: u16, endpoint: impl Into<String>) -> Self {
        let target_port = self.port_or_declare(port);
        self.endpoints.push(Arc::new(TargetEndpoint::new(target_port, endpoint)));
        self
    }

    /// Declare how to authenticate against a port; the port is declared if
    /// missing and an earlier authentication for it is replaced
    #[must_use]
    pub fn with_authentication(
        mut self,
        port: u16,
        name: impl Into<String>,
        secret: impl Into<String>,
        kind: AuthenticationKind,
    ) -> Self {
        let target_port = self.port_or_declare(port);
        self.authentications.retain(|a| a.target_port.port != port);
        self.authentications
            .push(Arc::new(TargetAuthentication::new(target_port, name, secret, kind)));
        self
    }

    fn port_or_declare(&mut self, port: u16) -> Arc<TargetPort> {
        if let Some(existing) = self.ports.iter().find(|p| p.port == port) {
            return Arc::clone(existing);
        }
        let created = Arc::new(TargetPort::new(Arc::clone(&self.target), port));
        self.ports.push(Arc::clone(&created));
        created
    }

    /// Declare a technology
    #[must_use]
    pub fn with_technology(mut self, name: impl Into<String>, version: Option<String>) -> Self {
        let mut technology = TargetTechnology::new(Arc::clone(&self.target), name);
        technology.version = version;
        self.technologies.push(Arc::new(technology));
        self
    }

    /// Declare a vulnerability
    #[must_use]
    pub fn with_vulnerability(mut self, cve: impl Into<String>) -> Self {
        self.vulnerabilities
            .push(Arc::new(TargetVulnerability::new(Arc::clone(&self.target), cve)));
        self
    }

    /// Offer a wordlist
    #[must_use]
    pub fn with_wordlist(
        mut self,
        name: impl Into<String>,
        kind: WordlistKind,
        path: impl Into<String>,
    ) -> Self {
        self.wordlists.push(Arc::new(Wordlist::new(name, kind, path)));
        self
    }

    /// Every seed entity, in declaration family order ending with wordlists
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        std::iter::once(Entity::from(Arc::clone(&self.target)))
            .chain(self.ports.iter().cloned().map(Entity::from))
            .chain(self.endpoints.iter().cloned().map(Entity::from))
            .chain(self.technologies.iter().cloned().map(Entity::from))
            .chain(self.vulnerabilities.iter().cloned().map(Entity::from))
            .chain(self.authentications.iter().cloned().map(Entity::from))
            .chain(self.wordlists.iter().cloned().map(Entity::from))
            .collect()
    }

    /// Seed entities minus the given kinds
    #[must_use]
    pub fn entities_excluding(&self, excluded: &[EntityKind]) -> Vec<Entity> {
        self.entities()
            .into_iter()
            .filter(|e| !excluded.contains(&e.kind()))
            .collect()
    }

    /// Filter context for this target
    #[must_use]
    pub fn filter_context(&self) -> FilterContext<'_> {
        FilterContext::new(&self.ports)
    }
}
