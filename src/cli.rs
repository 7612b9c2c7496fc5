//! Command-line interface.
//!
//! Flags override values from the configuration file; positional targets
//! are appended to the configured ones.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{ExitPolicy, MonitorConfig, OutputFormat};
use crate::probe::ProbeKind;

#[derive(Debug, Parser)]
#[command(name = "reachability-monitor")]
#[command(about = "Track host reachability over ICMP, TCP or the system ping", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Default probe for targets without a scheme (icmp, tcp, system)
    #[arg(short, long, value_name = "KIND")]
    pub probe: Option<ProbeKind>,

    /// Probe timeout, e.g. 800ms or 2s
    #[arg(short, long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Time between probes of the same host
    #[arg(short, long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Silence after which a host is declared down
    #[arg(long, value_parser = parse_duration)]
    pub threshold: Option<Duration>,

    /// Probe every target once and exit
    #[arg(long)]
    pub once: bool,

    /// Show only hosts that are online
    #[arg(long, conflicts_with = "only_offline")]
    pub only_online: bool,

    /// Show only hosts that are offline
    #[arg(long)]
    pub only_offline: bool,

    /// Append transition records to this file
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// How often queued transition records are written
    #[arg(long, value_parser = parse_duration)]
    pub flush_interval: Option<Duration>,

    /// Maximum probes in flight in batch mode
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Overall batch deadline in seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// When batch mode exits with a failure status
    #[arg(long, value_enum)]
    pub exit_policy: Option<ExitPolicy>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Hosts to monitor: host, host:port, icmp://host, tcp6://[::1]:22, ...
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,
}

impl Cli {
    /// Apply command-line overrides on top of `config`.
    pub fn apply(&self, mut config: MonitorConfig) -> MonitorConfig {
        if let Some(kind) = self.probe {
            config.probe.kind = kind;
        }
        if let Some(timeout) = self.timeout {
            config.probe.timeout_ms = millis(timeout);
            config.batch.timeout_ms = millis(timeout);
        }
        if let Some(interval) = self.interval {
            config.monitor.interval_ms = millis(interval);
        }
        if let Some(threshold) = self.threshold {
            config.monitor.down_threshold_ms = millis(threshold);
        }
        if self.once {
            config.batch.once = true;
        }
        if self.only_online {
            config.output.only_online = true;
        }
        if self.only_offline {
            config.output.only_offline = true;
        }
        if let Some(path) = &self.log {
            config.journal.path = Some(path.clone());
        }
        if let Some(flush) = self.flush_interval {
            config.journal.flush_interval_ms = millis(flush);
        }
        if let Some(max) = self.max_concurrent {
            config.batch.max_concurrent = max;
        }
        if let Some(deadline) = self.deadline {
            config.batch.deadline_secs = Some(deadline);
        }
        if let Some(policy) = self.exit_policy {
            config.batch.exit_policy = policy;
        }
        if self.json {
            config.output.format = OutputFormat::Json;
        }
        config.targets.extend(self.targets.iter().cloned());
        config
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}

/// Parse `500ms`, `2s`, `1m` or a bare number of milliseconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration {raw:?}"))?;
    let secs = match unit.trim() {
        "" | "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        other => return Err(format!("unknown duration unit {other:?} (use ms, s or m)")),
    };
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration {raw:?}: {e}"))
}
