//! Enumerated attributes of entities
//!
//! Every enum exposes its filter keyword via `keyword()`; keywords are the
//! same strings used by serde.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $kw:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $kw)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Filter keyword
            #[must_use]
            pub fn keyword(&self) -> &'static str {
                match self {
                    $($name::$variant => $kw,)+
                }
            }

            /// Variant for a keyword, case-insensitive
            #[must_use]
            pub fn from_keyword(keyword: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.keyword().eq_ignore_ascii_case(keyword))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.keyword())
            }
        }
    };
}

keyword_enum!(
    /// Vulnerability severity
    Severity {
        /// Informational
        Info => "info",
        /// Low
        Low => "low",
        /// Medium
        Medium => "medium",
        /// High
        High => "high",
        /// Critical
        Critical => "critical",
    }
);

keyword_enum!(
    /// Port state as reported by a scanner
    PortStatus {
        /// Open
        Open => "open",
        /// Open or filtered
        OpenFiltered => "open|filtered",
        /// Filtered
        Filtered => "filtered",
        /// Closed
        Closed => "closed",
    }
);

keyword_enum!(
    /// Transport protocol
    Protocol {
        /// TCP
        Tcp => "tcp",
        /// UDP
        Udp => "udp",
    }
);

keyword_enum!(
    /// Kind of discovered path
    PathKind {
        /// Web endpoint
        Endpoint => "endpoint",
        /// Network share
        Share => "share",
    }
);

keyword_enum!(
    /// Kind of OSINT datum
    OsintDataType {
        /// IP address
        Ip => "ip",
        /// Domain name
        Domain => "domain",
        /// Virtual host
        Vhost => "vhost",
        /// URL
        Url => "url",
        /// Email address
        Email => "email",
        /// Link
        Link => "link",
        /// Autonomous system number
        Asn => "asn",
        /// User name
        User => "user",
        /// Password
        Password => "password",
    }
);

keyword_enum!(
    /// Operating system family of a host
    HostOs {
        /// Linux
        Linux => "linux",
        /// Windows
        Windows => "windows",
        /// macOS
        MacOs => "macos",
        /// iOS
        Ios => "ios",
        /// Android
        Android => "android",
        /// Solaris
        Solaris => "solaris",
        /// FreeBSD
        FreeBsd => "freebsd",
        /// Anything else
        Other => "other",
    }
);

keyword_enum!(
    /// Classification of a target or host address
    TargetKind {
        /// Private IP address
        PrivateIp => "private_ip",
        /// Public IP address
        PublicIp => "public_ip",
        /// CIDR network
        Network => "network",
        /// IP range `a-b`
        IpRange => "ip_range",
        /// Domain name
        Domain => "domain",
    }
);

keyword_enum!(
    /// Wordlist purpose
    WordlistKind {
        /// Web endpoints
        Endpoint => "endpoint",
        /// Subdomains
        Subdomain => "subdomain",
    }
);

keyword_enum!(
    /// HTTP authentication scheme declared for a target port
    AuthenticationKind {
        /// Basic
        Basic => "basic",
        /// Bearer token
        Bearer => "bearer",
        /// Session cookie
        Cookie => "cookie",
        /// Digest
        Digest => "digest",
        /// JSON web token
        Jwt => "jwt",
        /// NTLM
        Ntlm => "ntlm",
    }
);

impl TargetKind {
    /// Classify an address
    #[must_use]
    pub fn classify(address: &str) -> Self {
        let address = address.trim();
        if let Ok(ip) = address.parse::<IpAddr>() {
            return if is_private(&ip) {
                Self::PrivateIp
            } else {
                Self::PublicIp
            };
        }
        if let Some((ip, bits)) = address.split_once('/') {
            if ip.parse::<IpAddr>().is_ok() && bits.parse::<u8>().is_ok() {
                return Self::Network;
            }
        }
        if let Some((from, to)) = address.split_once('-') {
            let to_is_ip = to.parse::<IpAddr>().is_ok() || to.parse::<u8>().is_ok();
            if from.parse::<IpAddr>().is_ok() && to_is_ip {
                return Self::IpRange;
            }
        }
        Self::Domain
    }
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(Severity::from_keyword("HIGH"), Some(Severity::High));
        assert_eq!(Severity::Critical.to_string(), "critical");
        assert_eq!(PortStatus::from_keyword("open|filtered"), Some(PortStatus::OpenFiltered));
        assert_eq!(WordlistKind::from_keyword("dns"), None);
        assert_eq!(AuthenticationKind::from_keyword("NTLM"), Some(AuthenticationKind::Ntlm));
    }

    #[test]
    fn test_classify_addresses() {
        assert_eq!(TargetKind::classify("10.10.10.1"), TargetKind::PrivateIp);
        assert_eq!(TargetKind::classify("8.8.8.8"), TargetKind::PublicIp);
        assert_eq!(TargetKind::classify("10.0.0.0/24"), TargetKind::Network);
        assert_eq!(TargetKind::classify("10.0.0.1-20"), TargetKind::IpRange);
        assert_eq!(TargetKind::classify("scanme.example.org"), TargetKind::Domain);
    }

    #[test]
    fn test_serde_uses_keywords() {
        let json = serde_json::to_string(&TargetKind::PrivateIp).unwrap();
        assert_eq!(json, "\"private_ip\"");
    }
}
