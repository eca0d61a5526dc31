//! Parse accumulator
//!
//! Entities contribute keyword/value pairs to a [`ParsedArgs`] which is then
//! used to render an argument's template fragment.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Keys entities may contribute when parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKeyword {
    /// Target address as declared
    Target,
    /// Host address
    Host,
    /// Last port number
    Port,
    /// Every port, space separated when rendered
    Ports,
    /// Every port, comma separated
    PortsCommas,
    /// Path on a web service
    Endpoint,
    /// Full URL
    Url,
    /// Technology name
    Technology,
    /// Technology version
    Version,
    /// Credential email
    Email,
    /// Credential username
    Username,
    /// Credential secret
    Secret,
    /// CVE identifier
    Cve,
    /// Exploit reference
    Exploit,
    /// Wordlist file path
    Wordlist,
}

impl InputKeyword {
    /// Every keyword
    pub const ALL: [InputKeyword; 15] = [
        Self::Target,
        Self::Host,
        Self::Port,
        Self::Ports,
        Self::PortsCommas,
        Self::Endpoint,
        Self::Url,
        Self::Technology,
        Self::Version,
        Self::Email,
        Self::Username,
        Self::Secret,
        Self::Cve,
        Self::Exploit,
        Self::Wordlist,
    ];

    /// Placeholder name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Host => "host",
            Self::Port => "port",
            Self::Ports => "ports",
            Self::PortsCommas => "ports_commas",
            Self::Endpoint => "endpoint",
            Self::Url => "url",
            Self::Technology => "technology",
            Self::Version => "version",
            Self::Email => "email",
            Self::Username => "username",
            Self::Secret => "secret",
            Self::Cve => "cve",
            Self::Exploit => "exploit",
            Self::Wordlist => "wordlist",
        }
    }

    /// Keyword for a placeholder name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for InputKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value contributed by an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Plain text
    Text(String),
    /// Number
    Number(u64),
    /// Ordered list
    List(Vec<String>),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => write!(f, "{n}"),
            Self::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

/// Ordered keyword/value accumulator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedArgs {
    values: IndexMap<InputKeyword, ArgValue>,
}

impl ParsedArgs {
    /// Empty accumulator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a text value
    pub fn set_text(&mut self, key: InputKeyword, value: impl Into<String>) {
        self.values.insert(key, ArgValue::Text(value.into()));
    }

    /// Set a numeric value
    pub fn set_number(&mut self, key: InputKeyword, value: u64) {
        self.values.insert(key, ArgValue::Number(value));
    }

    /// Append a port to `ports`/`ports_commas` and set `port`
    pub fn push_port(&mut self, port: u16) {
        let port = port.to_string();
        let mut ports = match self.values.shift_remove(&InputKeyword::Ports) {
            Some(ArgValue::List(items)) => items,
            _ => Vec::new(),
        };
        if !ports.contains(&port) {
            ports.push(port.clone());
        }
        self.values
            .insert(InputKeyword::PortsCommas, ArgValue::Text(ports.join(",")));
        self.values.insert(InputKeyword::Ports, ArgValue::List(ports));
        self.values.insert(InputKeyword::Port, ArgValue::Text(port));
    }

    /// Value for a keyword
    #[must_use]
    pub fn get(&self, key: InputKeyword) -> Option<&ArgValue> {
        self.values.get(&key)
    }

    /// Text rendering of a keyword's value
    #[must_use]
    pub fn text(&self, key: InputKeyword) -> Option<String> {
        self.values.get(&key).map(ToString::to_string)
    }

    /// Rendering of a placeholder name, if it is a known keyword with a value
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<String> {
        InputKeyword::from_name(name).and_then(|k| self.text(k))
    }

    /// Whether nothing has been accumulated
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&InputKeyword, &ArgValue)> {
        self.values.iter()
    }
}

/// Build a URL for a host, port and optional endpoint.
///
/// `https` is chosen for 443/8443 or when the service name mentions TLS;
/// default ports are omitted.
#[must_use]
pub fn build_url(host: &str, port: Option<u16>, service: Option<&str>, endpoint: Option<&str>) -> String {
    let tls_service = service.is_some_and(|s| {
        let s = s.to_lowercase();
        s.contains("https") || s.contains("ssl") || s.contains("tls")
    });
    let https = tls_service || matches!(port, Some(443 | 8443));
    let scheme = if https { "https" } else { "http" };
    let authority = match port {
        Some(80) if !https => host.to_string(),
        Some(443) if https => host.to_string(),
        Some(p) => format!("{host}:{p}"),
        None => host.to_string(),
    };
    let path = match endpoint {
        Some(e) if e.starts_with('/') => e.to_string(),
        Some(e) => format!("/{e}"),
        None => "/".to_string(),
    };
    format!("{scheme}://{authority}{path}")
}
