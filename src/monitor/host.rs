//! Per-host monitor loop.
//!
//! # Responsibilities
//! - Probe one target on a fixed interval
//! - Feed outcomes through the state tracker and keep `HostStats` current
//! - Queue a transition record whenever the state changes
//! - Stop promptly on shutdown

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::MonitorConfig;
use crate::journal::{TransitionRecord, TransitionSender};
use crate::lifecycle::ShutdownListener;
use crate::monitor::state::{StateTracker, Transition};
use crate::monitor::stats::{HostStats, StatsHandle};
use crate::observability::metrics;
use crate::probe::{Probe, ProbeError, ProbeResult, Target};

/// Slack allowed on top of the probe timeout before the monitor gives up on it.
const PROBE_GUARD: Duration = Duration::from_millis(250);

/// Timing of a host monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub down_threshold: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.monitor.interval_ms),
            timeout: config.probe.timeout(),
            down_threshold: Duration::from_millis(config.monitor.down_threshold_ms),
        }
    }
}

pub struct HostMonitor {
    target: Target,
    probe: Arc<dyn Probe>,
    settings: MonitorSettings,
    tracker: StateTracker,
    stats: HostStats,
    handle: StatsHandle,
    journal: Option<TransitionSender>,
    last_unix_nano: i64,
}

impl HostMonitor {
    pub fn new(target: Target, probe: Arc<dyn Probe>, settings: MonitorSettings) -> Self {
        let stats = HostStats::new(&target);
        let handle = StatsHandle::new(stats.clone());
        Self {
            target,
            probe,
            settings,
            tracker: StateTracker::new(settings.down_threshold),
            stats,
            handle,
            journal: None,
            last_unix_nano: 0,
        }
    }

    /// Send transition records to `journal`.
    pub fn with_journal(mut self, journal: TransitionSender) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Read handle for this host's statistics.
    pub fn stats(&self) -> StatsHandle {
        self.handle.clone()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Probe on the configured interval until shutdown.
    ///
    /// The first probe runs after `start_delay`. An in-flight probe is allowed
    /// to finish (bounded by its timeout) before the loop exits.
    pub async fn run(mut self, mut shutdown: ShutdownListener, start_delay: Duration) -> Arc<HostStats> {
        tracing::info!(
            host = %self.target,
            interval_ms = self.settings.interval.as_millis() as u64,
            threshold_ms = self.settings.down_threshold.as_millis() as u64,
            "Host monitor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + start_delay, self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Shutdown wins over a tick that came due during a slow probe.
                biased;
                _ = shutdown.recv() => {
                    tracing::debug!(host = %self.target, "Host monitor received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
            }
        }

        self.handle.snapshot()
    }

    /// Run one probe cycle, returning the transition record it produced.
    pub async fn probe_once(&mut self) -> Option<TransitionRecord> {
        let limit = self.settings.timeout;
        let result = match time::timeout(limit + PROBE_GUARD, self.probe.run(&self.target, limit)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(host = %self.target, "Probe overran its timeout");
                ProbeResult::failure(ProbeError::Timeout(limit), self.stats.address)
            }
        };
        self.apply(result, Instant::now())
    }

    fn apply(&mut self, result: ProbeResult, now: Instant) -> Option<TransitionRecord> {
        let kind = self.probe.kind();
        self.stats.sent_count += 1;
        if let Some(address) = result.address {
            self.stats.address = Some(address);
        }

        match &result.error {
            None if result.success => {
                self.stats.received_count += 1;
                self.stats.last_rtt = Some(result.rtt);
                self.stats.last_error_message.clear();
                self.stats.setup_failure = false;
                metrics::record_probe(kind, "success", Some(result.rtt));
            }
            error => {
                let setup = error.as_ref().is_some_and(ProbeError::is_setup_failure);
                if setup && !self.stats.setup_failure {
                    tracing::warn!(
                        host = %self.target,
                        error = %result.error_message(),
                        "Probe cannot run on this system"
                    );
                }
                self.stats.last_error_message = result.error_message();
                self.stats.setup_failure = setup;
                metrics::record_probe(kind, error.as_ref().map_or("failure", ProbeError::label), None);
                tracing::trace!(host = %self.target, error = %self.stats.last_error_message, "Probe failed");
            }
        }

        let transition = self.tracker.observe(result.success, now);

        self.stats.reachability = self.tracker.reachability();
        self.stats.state = self.tracker.is_up();
        self.stats.consecutive_loss_count = self.tracker.consecutive_losses();
        self.stats.consecutive_success_count = self.tracker.consecutive_successes();
        self.stats.last_loss_duration = self.tracker.loss_duration();

        let record = transition.map(|transition| self.on_transition(transition, result.timestamp));
        self.handle.publish(self.stats.clone());
        record
    }

    fn on_transition(&mut self, transition: Transition, at: DateTime<Utc>) -> TransitionRecord {
        self.stats.last_transition_time = Some(at);
        if transition == Transition::UpToDown {
            self.stats.last_loss_time = Some(at);
        }

        let ip = self.stats.address.map(|a| a.to_string()).unwrap_or_default();
        match transition {
            Transition::UpToDown => tracing::warn!(
                host = %self.target,
                ip = %ip,
                silence_ms = self.stats.last_loss_duration.as_millis() as u64,
                error = %self.stats.last_error_message,
                "Host went down"
            ),
            Transition::DownToUp => tracing::info!(
                host = %self.target,
                ip = %ip,
                downtime_ms = self.stats.last_loss_duration.as_millis() as u64,
                "Host came back up"
            ),
        }
        metrics::record_transition(transition);

        let unix_nano = self.next_unix_nano(at);
        let record = TransitionRecord::new(at, unix_nano, self.target.identifier(), ip, transition);
        if let Some(journal) = &self.journal {
            journal.record(record.clone());
        }
        record
    }

    /// Wall-clock nanoseconds, forced strictly increasing for this host.
    fn next_unix_nano(&mut self, at: DateTime<Utc>) -> i64 {
        let wall = at.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let next = wall.max(self.last_unix_nano.saturating_add(1));
        self.last_unix_nano = next;
        next
    }
}
