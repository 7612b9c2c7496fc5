//! Target parsing.
//!
//! A target is written `[scheme://]host[:port]`. The scheme selects the
//! probe (`icmp`, `tcp`, `system`/`ping`) and may carry a `4` or `6` suffix
//! to pin the address family.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

use crate::config::ProbeConfig;
use crate::probe::ProbeKind;

/// Errors produced while parsing a target string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("empty target")]
    Empty,

    #[error("unknown probe scheme {0:?}")]
    UnknownScheme(String),

    #[error("malformed target {target:?}: {reason}")]
    Malformed { target: String, reason: String },

    #[error("target {0:?} has no host")]
    MissingHost(String),

    #[error("target {0:?}: a port is only valid for tcp probes")]
    PortNotAllowed(String),

    #[error("target {0:?}: port must be between 1 and 65535")]
    InvalidPort(String),

    #[error("target {target:?} is not an {family} address")]
    FamilyMismatch {
        target: String,
        family: AddressFamily,
    },
}

/// Address family hint for name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Any,
    V4,
    V6,
}

impl AddressFamily {
    /// Whether `addr` is acceptable under this hint.
    pub fn admits(&self, addr: &IpAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            AddressFamily::Any => "",
            AddressFamily::V4 => "4",
            AddressFamily::V6 => "6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Any => f.write_str("IP"),
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Values applied to targets that leave them unspecified.
#[derive(Debug, Clone, Copy)]
pub struct TargetDefaults {
    pub kind: ProbeKind,
    pub tcp_port: u16,
}

impl Default for TargetDefaults {
    fn default() -> Self {
        Self {
            kind: ProbeKind::Icmp,
            tcp_port: 80,
        }
    }
}

impl From<&ProbeConfig> for TargetDefaults {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            kind: config.kind,
            tcp_port: config.default_tcp_port,
        }
    }
}

/// One monitored endpoint. Immutable after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// Hostname or literal address, without brackets.
    pub host: String,
    /// Probe variant used for this target.
    pub kind: ProbeKind,
    /// Destination port (TCP only).
    pub port: Option<u16>,
    /// Address family hint.
    pub family: AddressFamily,
}

impl Target {
    /// Parse a target string, filling gaps from `defaults`.
    pub fn parse(raw: &str, defaults: &TargetDefaults) -> Result<Self, TargetError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }

        if let Some((scheme, _)) = trimmed.split_once("://") {
            let (kind, family) = parse_scheme(scheme)?;
            let (host, port) = split_url(trimmed)?;
            return Self::build(trimmed, host, kind, port, family, defaults);
        }

        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            return Self::build(trimmed, ip.to_string(), defaults.kind, None, AddressFamily::Any, defaults);
        }

        if let Ok(addr) = trimmed.parse::<SocketAddr>() {
            return Self::build(
                trimmed,
                addr.ip().to_string(),
                ProbeKind::Tcp,
                Some(addr.port()),
                AddressFamily::Any,
                defaults,
            );
        }

        if let Some((host, port)) = trimmed.rsplit_once(':') {
            let port: u16 = port
                .parse()
                .map_err(|_| TargetError::InvalidPort(trimmed.to_string()))?;
            check_hostname(trimmed, host)?;
            // A bare host:port always means a TCP check.
            return Self::build(trimmed, host.to_string(), ProbeKind::Tcp, Some(port), AddressFamily::Any, defaults);
        }

        check_hostname(trimmed, trimmed)?;
        Self::build(trimmed, trimmed.to_string(), defaults.kind, None, AddressFamily::Any, defaults)
    }

    fn build(
        raw: &str,
        host: String,
        kind: ProbeKind,
        port: Option<u16>,
        family: AddressFamily,
        defaults: &TargetDefaults,
    ) -> Result<Self, TargetError> {
        if host.is_empty() {
            return Err(TargetError::MissingHost(raw.to_string()));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            if !family.admits(&ip) {
                return Err(TargetError::FamilyMismatch {
                    target: raw.to_string(),
                    family,
                });
            }
        }

        let port = match (kind, port) {
            (ProbeKind::Tcp, Some(0)) => return Err(TargetError::InvalidPort(raw.to_string())),
            (ProbeKind::Tcp, Some(p)) => Some(p),
            (ProbeKind::Tcp, None) if defaults.tcp_port == 0 => {
                return Err(TargetError::InvalidPort(raw.to_string()))
            }
            (ProbeKind::Tcp, None) => Some(defaults.tcp_port),
            (_, Some(_)) => return Err(TargetError::PortNotAllowed(raw.to_string())),
            (_, None) => None,
        };

        Ok(Self {
            host,
            kind,
            port,
            family,
        })
    }

    /// Identifier used in snapshots and transition records.
    pub fn identifier(&self) -> &str {
        &self.host
    }

    /// The host as a literal address, if it is one.
    pub fn literal_ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}://", self.kind, self.family.suffix())?;
        match self.port {
            Some(port) if self.host.contains(':') => write!(f, "[{}]:{}", self.host, port),
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

fn parse_scheme(scheme: &str) -> Result<(ProbeKind, AddressFamily), TargetError> {
    let lower = scheme.to_ascii_lowercase();
    let (name, family) = if let Some(name) = lower.strip_suffix('4') {
        (name, AddressFamily::V4)
    } else if let Some(name) = lower.strip_suffix('6') {
        (name, AddressFamily::V6)
    } else {
        (lower.as_str(), AddressFamily::Any)
    };

    let kind = ProbeKind::from_str(name).map_err(|_| TargetError::UnknownScheme(scheme.to_string()))?;
    Ok((kind, family))
}

fn split_url(raw: &str) -> Result<(String, Option<u16>), TargetError> {
    let malformed = |reason: String| TargetError::Malformed {
        target: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| malformed(e.to_string()))?;

    if !url.username().is_empty() || url.password().is_some() {
        return Err(malformed("credentials are not supported".into()));
    }
    if !matches!(url.path(), "" | "/") || url.query().is_some() || url.fragment().is_some() {
        return Err(malformed("unexpected path or query".into()));
    }

    let host = match url.host() {
        Some(Host::Domain(domain)) => {
            // Hosts of non-special schemes are opaque to `url`.
            check_hostname(raw, domain)?;
            domain.to_string()
        }
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => return Err(TargetError::MissingHost(raw.to_string())),
    };

    Ok((host, url.port()))
}

fn check_hostname(raw: &str, host: &str) -> Result<(), TargetError> {
    let valid = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(TargetError::Malformed {
            target: raw.to_string(),
            reason: "invalid hostname".into(),
        })
    }
}
