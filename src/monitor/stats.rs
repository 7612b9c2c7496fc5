//! Per-host statistics and lock-free snapshots.
//!
//! # Design Decisions
//! - The host monitor owns the only mutable copy of `HostStats`
//! - After every cycle it publishes an immutable `Arc<HostStats>` through
//!   `ArcSwap`, so readers always see a whole cycle's fields and never block
//!   the writer

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::monitor::state::Reachability;
use crate::probe::{ProbeKind, Target};

/// Statistics for one monitored host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostStats {
    /// Host identifier as configured.
    pub host: String,
    /// Full target description (`tcp://host:port`).
    pub target: String,
    pub kind: ProbeKind,
    /// Most recently resolved address.
    pub address: Option<IpAddr>,
    /// Current up/down state. Only the state tracker changes it.
    pub state: bool,
    pub reachability: Reachability,
    pub consecutive_loss_count: u64,
    pub consecutive_success_count: u64,
    #[serde(rename = "last_rtt_ms", serialize_with = "serialize_opt_millis")]
    pub last_rtt: Option<Duration>,
    /// Reason of the latest failure, empty after a success.
    pub last_error_message: String,
    /// The latest failure was a setup failure, not a reachability verdict.
    pub setup_failure: bool,
    pub last_transition_time: Option<DateTime<Utc>>,
    /// When the host was last declared down.
    pub last_loss_time: Option<DateTime<Utc>>,
    #[serde(rename = "last_loss_duration_ms", serialize_with = "serialize_millis")]
    pub last_loss_duration: Duration,
    pub sent_count: u64,
    pub received_count: u64,
}

impl HostStats {
    pub fn new(target: &Target) -> Self {
        Self {
            host: target.identifier().to_string(),
            target: target.to_string(),
            kind: target.kind,
            address: target.literal_ip(),
            state: false,
            reachability: Reachability::Unknown,
            consecutive_loss_count: 0,
            consecutive_success_count: 0,
            last_rtt: None,
            last_error_message: String::new(),
            setup_failure: false,
            last_transition_time: None,
            last_loss_time: None,
            last_loss_duration: Duration::ZERO,
            sent_count: 0,
            received_count: 0,
        }
    }

    /// Online means up with no outstanding error.
    pub fn is_online(&self) -> bool {
        self.state && self.last_error_message.is_empty()
    }

    /// Lifetime packet loss as a percentage of probes sent.
    pub fn loss_percent(&self) -> f64 {
        if self.sent_count == 0 {
            return 0.0;
        }
        let lost = self.sent_count.saturating_sub(self.received_count);
        lost as f64 * 100.0 / self.sent_count as f64
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_nanos() as f64 / 1_000_000.0)
}

fn serialize_opt_millis<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => serialize_millis(d, s),
        None => s.serialize_none(),
    }
}

/// Read side of a host's statistics.
///
/// Cloning is cheap; every clone observes the same host.
#[derive(Clone)]
pub struct StatsHandle {
    inner: Arc<ArcSwap<HostStats>>,
}

impl StatsHandle {
    pub fn new(stats: HostStats) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(stats)),
        }
    }

    /// Consistent copy of the latest published statistics.
    pub fn snapshot(&self) -> Arc<HostStats> {
        self.inner.load_full()
    }

    pub(crate) fn publish(&self, stats: HostStats) {
        self.inner.store(Arc::new(stats));
    }
}

impl std::fmt::Debug for StatsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StatsHandle").field(&self.snapshot().host).finish()
    }
}
