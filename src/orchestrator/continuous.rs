//! Continuous monitoring of every target until shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use rand::Rng;
use tokio::task::JoinHandle;

use crate::config::MonitorConfig;
use crate::journal::TransitionSender;
use crate::lifecycle::{Shutdown, ShutdownListener};
use crate::monitor::{HostMonitor, HostStats, MonitorSettings, StatsHandle};
use crate::probe::{Probe, ProbeFactory, Target};

/// Builds one host monitor per target and starts them together.
pub struct Orchestrator {
    settings: MonitorSettings,
    stagger_start: bool,
    monitors: Vec<HostMonitor>,
}

impl Orchestrator {
    pub fn new(settings: MonitorSettings, stagger_start: bool) -> Self {
        Self {
            settings,
            stagger_start,
            monitors: Vec::new(),
        }
    }

    /// Orchestrator for `targets`, with probes from `factory`.
    pub fn from_config(config: &MonitorConfig, targets: Vec<Target>, factory: &ProbeFactory) -> Self {
        let mut orchestrator = Self::new(MonitorSettings::from(config), config.monitor.stagger_start);
        for target in targets {
            let probe = factory.build(&target);
            orchestrator.add(target, probe);
        }
        orchestrator
    }

    pub fn add(&mut self, target: Target, probe: Arc<dyn Probe>) {
        self.monitors.push(HostMonitor::new(target, probe, self.settings));
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Spawn every monitor on its own schedule.
    ///
    /// With staggering enabled each monitor's first probe is delayed by a
    /// random fraction of the interval so probes do not all fire at once.
    pub fn start(self, journal: Option<TransitionSender>) -> ContinuousRun {
        let shutdown = Shutdown::new();
        let interval_ms = self.settings.interval.as_millis() as u64;
        let mut rng = rand::thread_rng();

        let mut handles = Vec::with_capacity(self.monitors.len());
        let mut tasks = Vec::with_capacity(self.monitors.len());
        for monitor in self.monitors {
            let monitor = match &journal {
                Some(sender) => monitor.with_journal(sender.clone()),
                None => monitor,
            };
            let delay = if self.stagger_start && interval_ms > 0 {
                Duration::from_millis(rng.gen_range(0..interval_ms))
            } else {
                Duration::ZERO
            };

            handles.push(monitor.stats());
            tasks.push(tokio::spawn(monitor.run(shutdown.subscribe(), delay)));
        }

        tracing::info!(
            hosts = handles.len(),
            interval_ms,
            threshold_ms = self.settings.down_threshold.as_millis() as u64,
            journal = journal.is_some(),
            "Continuous monitoring started"
        );

        ContinuousRun {
            handles,
            tasks,
            shutdown,
        }
    }
}

/// Handle on running monitors.
pub struct ContinuousRun {
    handles: Vec<StatsHandle>,
    tasks: Vec<JoinHandle<Arc<HostStats>>>,
    shutdown: Shutdown,
}

impl ContinuousRun {
    /// Per-host read handles, in target order.
    pub fn handles(&self) -> &[StatsHandle] {
        &self.handles
    }

    /// Latest snapshot of every host, in target order.
    pub fn snapshots(&self) -> Vec<Arc<HostStats>> {
        self.handles.iter().map(StatsHandle::snapshot).collect()
    }

    /// Listener for tasks that should stop together with the monitors.
    pub fn subscribe(&self) -> ShutdownListener {
        self.shutdown.subscribe()
    }

    /// Stop every monitor and wait for them. Each finishes at most one probe.
    pub async fn shutdown(self) -> Vec<Arc<HostStats>> {
        tracing::info!(hosts = self.tasks.len(), "Stopping host monitors");
        self.shutdown.trigger();

        let results = join_all(self.tasks).await;
        results
            .into_iter()
            .zip(&self.handles)
            .map(|(result, handle)| match result {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::error!(host = %handle.snapshot().host, error = %e, "Host monitor task failed");
                    handle.snapshot()
                }
            })
            .collect()
    }
}
