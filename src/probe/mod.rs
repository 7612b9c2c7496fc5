//! Probe subsystem.
//!
//! # Data Flow
//! ```text
//! target string
//!     → target.rs (scheme → ProbeKind, host, port, family hint)
//!     → factory.rs (ProbeKind → Arc<dyn Probe>)
//!
//! Every cycle:
//!     Probe::run(target, timeout)
//!     → resolve.rs (DNS, bounded by the timeout)
//!     → icmp.rs | tcp.rs | system.rs
//!     → ProbeResult (success + rtt, or failure + reason)
//! ```
//!
//! # Design Decisions
//! - Probes never return errors to the caller: failures are data
//! - Setup failures (permissions, missing binaries) are a distinct variant
//! - Every backend cleans up sockets/processes on all paths

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod factory;
pub mod icmp;
pub mod resolve;
pub mod system;
pub mod target;
pub mod tcp;

pub use factory::ProbeFactory;
pub use target::{AddressFamily, Target, TargetDefaults, TargetError};

/// Probe variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// ICMP echo over a raw or datagram socket.
    #[default]
    Icmp,
    /// TCP connect handshake.
    Tcp,
    /// The operating system's `ping` executable.
    System,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Icmp => "icmp",
            ProbeKind::Tcp => "tcp",
            ProbeKind::System => "system",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeKind {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "icmp" => Ok(ProbeKind::Icmp),
            "tcp" => Ok(ProbeKind::Tcp),
            "system" | "ping" => Ok(ProbeKind::System),
            _ => Err(TargetError::UnknownScheme(s.to_string())),
        }
    }
}

/// Reasons a probe can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// No answer within the timeout.
    #[error("timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The target actively rejected the probe (refused, destination unreachable).
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Name resolution failed.
    #[error("dns lookup failed: {0}")]
    Resolve(String),

    /// The probe could not be performed at all (permissions, missing binary).
    #[error("probe unavailable: {0}")]
    Setup(String),
}

impl ProbeError {
    /// True when the failure says nothing about the target's reachability.
    pub fn is_setup_failure(&self) -> bool {
        matches!(self, ProbeError::Setup(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Unreachable(_) => "unreachable",
            ProbeError::Resolve(_) => "resolve",
            ProbeError::Setup(_) => "setup",
        }
    }
}

/// Outcome of a single reachability check.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub success: bool,
    /// Round-trip time. Zero for failures.
    pub rtt: Duration,
    pub error: Option<ProbeError>,
    /// Address that was probed, when resolution got that far.
    pub address: Option<IpAddr>,
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    pub fn success(rtt: Duration, address: IpAddr) -> Self {
        Self {
            success: true,
            rtt,
            error: None,
            address: Some(address),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(error: ProbeError, address: Option<IpAddr>) -> Self {
        Self {
            success: false,
            rtt: Duration::ZERO,
            error: Some(error),
            address,
            timestamp: Utc::now(),
        }
    }

    /// Human-readable failure reason, empty on success.
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(ToString::to_string).unwrap_or_default()
    }
}

/// A reachability check mechanism.
///
/// Implementations must return within `timeout` plus a small constant
/// overhead and release every socket or child process they open.
#[async_trait]
pub trait Probe: Send + Sync {
    fn kind(&self) -> ProbeKind;

    async fn run(&self, target: &Target, timeout: Duration) -> ProbeResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("ICMP".parse::<ProbeKind>().unwrap(), ProbeKind::Icmp);
        assert_eq!("ping".parse::<ProbeKind>().unwrap(), ProbeKind::System);
        assert!("udp".parse::<ProbeKind>().is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = ProbeError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "timeout after 1500ms");
        assert!(!err.is_setup_failure());

        let err = ProbeError::Setup("permission denied".into());
        assert!(err.is_setup_failure());
        assert_eq!(err.label(), "setup");
    }

    #[test]
    fn test_result_constructors() {
        let addr: IpAddr = "192.0.2.1".parse().unwrap();
        let ok = ProbeResult::success(Duration::from_millis(12), addr);
        assert!(ok.success);
        assert!(ok.error_message().is_empty());

        let failed = ProbeResult::failure(ProbeError::Unreachable("connection refused".into()), Some(addr));
        assert!(!failed.success);
        assert_eq!(failed.rtt, Duration::ZERO);
        assert_eq!(failed.error_message(), "unreachable: connection refused");
    }
}
