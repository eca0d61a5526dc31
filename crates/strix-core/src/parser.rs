//! Output parsers
//!
//! A parser turns the console output and report artifact of one run into
//! finding drafts. Drafts may reference each other; the finding store
//! relinks them when persisting.

use crate::error::ExecutionFault;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strix_model::prelude::*;

/// Raw output of one execution
#[derive(Debug, Clone, Copy)]
pub struct ParseInput<'a> {
    /// Tool name
    pub tool: &'a str,
    /// Console output
    pub stdout: &'a str,
    /// Report artifact contents, when the tool wrote one
    pub report: Option<&'a str>,
}

/// Per-tool output parser
pub trait OutputParser: Send + Sync + fmt::Debug {
    /// Extract finding drafts
    fn parse(&self, input: &ParseInput<'_>) -> Result<Vec<Entity>, ExecutionFault>;
}

/// Parsers by tool name
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn OutputParser>>,
}

impl ParserRegistry {
    /// Empty registry; every tool produces no findings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in parsers
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new().with_parser("nmap", Arc::new(GreppableNmapParser))
    }

    /// Register a parser for a tool
    #[must_use]
    pub fn with_parser(mut self, tool: impl Into<String>, parser: Arc<dyn OutputParser>) -> Self {
        self.parsers.insert(tool.into(), parser);
        self
    }

    /// Parser of a tool
    #[must_use]
    pub fn get(&self, tool: &str) -> Option<&Arc<dyn OutputParser>> {
        self.parsers.get(tool)
    }

    /// Parse with the tool's parser; tools without one produce nothing
    pub fn parse(&self, input: &ParseInput<'_>) -> Result<Vec<Entity>, ExecutionFault> {
        match self.get(input.tool) {
            Some(parser) => parser.parse(input),
            None => {
                tracing::debug!(tool = input.tool, "no output parser registered");
                Ok(Vec::new())
            }
        }
    }
}

/// Parser for nmap's greppable output (`-oG`)
///
/// ```text
/// Host: 10.0.0.1 (web.local)	Ports: 22/open/tcp//ssh//OpenSSH 8.9/, 80/open/tcp//http///
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct GreppableNmapParser;

impl GreppableNmapParser {
    fn port(host: &Arc<Host>, entry: &str) -> Option<Port> {
        let mut fields = entry.trim().split('/');
        let number: u16 = fields.next()?.trim().parse().ok()?;
        let status = fields.next().and_then(PortStatus::from_keyword).unwrap_or(PortStatus::Open);
        let protocol = fields.next().and_then(Protocol::from_keyword).unwrap_or(Protocol::Tcp);
        let service = fields.nth(1).filter(|s| !s.is_empty());

        let mut port = Port::new(Some(Arc::clone(host)), number)
            .with_status(status)
            .with_protocol(protocol);
        if let Some(service) = service {
            port = port.with_service(service);
        }
        Some(port)
    }
}

impl OutputParser for GreppableNmapParser {
    fn parse(&self, input: &ParseInput<'_>) -> Result<Vec<Entity>, ExecutionFault> {
        let text = input.report.unwrap_or(input.stdout);
        let mut hosts: HashMap<String, Arc<Host>> = HashMap::new();
        let mut drafts = Vec::new();

        for line in text.lines().filter(|l| l.starts_with("Host:")) {
            let mut sections = line.split('\t');
            let Some(address) = sections
                .next()
                .and_then(|s| s.trim_start_matches("Host:").split_whitespace().next())
            else {
                continue;
            };
            let host = match hosts.get(address) {
                Some(host) => Arc::clone(host),
                None => {
                    let host = Arc::new(Host::new(address));
                    hosts.insert(address.to_string(), Arc::clone(&host));
                    drafts.push(Entity::from(Arc::clone(&host)));
                    host
                }
            };

            for section in sections {
                let Some(ports) = section.strip_prefix("Ports:") else {
                    continue;
                };
                for entry in ports.split(',') {
                    match Self::port(&host, entry) {
                        Some(port) => drafts.push(port.into()),
                        None => {
                            return Err(ExecutionFault::Parse {
                                tool: input.tool.to_string(),
                                message: format!("malformed port entry '{}'", entry.trim()),
                            })
                        }
                    }
                }
            }
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPORT: &str = "# Nmap 7.94 scan initiated\n\
Host: 10.0.0.1 (web.local)\tStatus: Up\n\
Host: 10.0.0.1 (web.local)\tPorts: 22/open/tcp//ssh//OpenSSH 8.9/, 53/open|filtered/udp//domain///\tIgnored State: closed (998)\n\
# Nmap done\n";

    #[test]
    fn test_parses_hosts_and_ports() {
        let drafts = GreppableNmapParser
            .parse(&ParseInput {
                tool: "nmap",
                stdout: "",
                report: Some(REPORT),
            })
            .unwrap();
        let rendered: Vec<String> = drafts.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["host 10.0.0.1", "port 10.0.0.1:22", "port 10.0.0.1:53"]);

        let Entity::Port(dns) = &drafts[2] else { panic!("not a port") };
        assert_eq!(dns.status, PortStatus::OpenFiltered);
        assert_eq!(dns.protocol, Protocol::Udp);
        assert_eq!(dns.service.as_deref(), Some("domain"));
        assert_eq!(dns.host.as_ref().map(|h| h.id), Some(drafts[0].id()));
    }

    #[test]
    fn test_malformed_port_is_a_fault() {
        let err = GreppableNmapParser
            .parse(&ParseInput {
                tool: "nmap",
                stdout: "Host: 10.0.0.1 ()\tPorts: http/open/tcp",
                report: None,
            })
            .unwrap_err();
        assert!(!err.is_skip());
    }

    #[test]
    fn test_unregistered_tool_produces_nothing() {
        let registry = ParserRegistry::with_defaults();
        let drafts = registry
            .parse(&ParseInput {
                tool: "gobuster",
                stdout: "/admin (Status: 301)",
                report: None,
            })
            .unwrap();
        assert!(drafts.is_empty());
    }
}
