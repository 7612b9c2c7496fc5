//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the monitor.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::ProbeKind;

/// Root configuration for the reachability monitor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// Probe selection and per-probe parameters.
    pub probe: ProbeConfig,

    /// Continuous-mode cycle settings.
    pub monitor: MonitorLoopConfig,

    /// One-shot batch settings.
    pub batch: BatchConfig,

    /// Output filtering and presentation.
    pub output: OutputConfig,

    /// Transition journal settings.
    pub journal: JournalConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Targets to monitor (`[scheme://]host[:port]`).
    pub targets: Vec<String>,
}

/// Probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe used for targets without an explicit scheme.
    pub kind: ProbeKind,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Port used for TCP targets that do not name one.
    pub default_tcp_port: u16,

    /// ICMP echo payload size in bytes.
    pub payload_size: usize,

    /// Executable used by the system probe.
    pub ping_command: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            kind: ProbeKind::Icmp,
            timeout_ms: 1000,
            default_tcp_port: 80,
            payload_size: 56,
            ping_command: "ping".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Continuous monitoring loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorLoopConfig {
    /// Interval between probe cycles in milliseconds.
    pub interval_ms: u64,

    /// Silence after the last success before a host is declared down.
    pub down_threshold_ms: u64,

    /// Spread monitor start times across one interval.
    pub stagger_start: bool,
}

impl Default for MonitorLoopConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            down_threshold_ms: 2000,
            stagger_start: true,
        }
    }
}

/// Aggregate exit behavior for batch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExitPolicy {
    /// Always exit successfully.
    Never,
    /// Fail if any target is offline.
    #[default]
    AnyDown,
    /// Fail only if every target is offline.
    AllDown,
}

/// One-shot batch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Run every target once and exit.
    pub once: bool,

    /// Maximum number of probes in flight at once.
    pub max_concurrent: usize,

    /// Per-probe timeout in batch mode, in milliseconds.
    pub timeout_ms: u64,

    /// Overall batch deadline in seconds.
    pub deadline_secs: Option<u64>,

    /// How the aggregate outcome maps to the exit status.
    pub exit_policy: ExitPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            once: false,
            max_concurrent: 100,
            timeout_ms: 1000,
            deadline_secs: None,
            exit_policy: ExitPolicy::AnyDown,
        }
    }
}

/// Rendering format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Show only targets that are currently online.
    pub only_online: bool,

    /// Show only targets that are currently offline.
    pub only_offline: bool,

    /// Snapshot refresh cadence in milliseconds.
    pub refresh_ms: u64,

    /// Result format.
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            only_online: false,
            only_offline: false,
            refresh_ms: 100,
            format: OutputFormat::Table,
        }
    }
}

/// Transition journal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Append-only JSON lines file. Journal disabled when unset.
    pub path: Option<PathBuf>,

    /// Background flush interval in milliseconds.
    pub flush_interval_ms: u64,

    /// Bounded queue capacity between monitors and the writer.
    pub queue_capacity: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: None,
            flush_interval_ms: 500,
            queue_capacity: 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
