//! One-shot probing with bounded concurrency.
//!
//! # Responsibilities
//! - Probe every target exactly once
//! - Never run more than `max_concurrent` probes at the same time
//! - Abandon stragglers when the overall deadline passes
//!
//! # Design Decisions
//! - Fixed worker pool pulling from a shared queue, so the number of open
//!   sockets or child processes is bounded by the pool size, not the target list
//! - Results are collected by index and reported in input order

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{ExitPolicy, MonitorConfig};
use crate::monitor::{HostMonitor, HostStats, MonitorSettings, StatsHandle};
use crate::observability::metrics;
use crate::orchestrator::filter::OutputFilter;
use crate::probe::{Probe, Target};

/// Error message of targets abandoned at the deadline.
pub const DEADLINE_EXCEEDED: &str = "batch deadline exceeded";

/// Error message of targets whose worker died before reporting.
pub const WORKER_FAILED: &str = "batch worker failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub max_concurrent: usize,
    /// Per-probe timeout.
    pub timeout: Duration,
    /// Overall limit for the whole batch.
    pub deadline: Option<Duration>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for BatchSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            max_concurrent: config.batch.max_concurrent,
            timeout: Duration::from_millis(config.batch.timeout_ms),
            deadline: config.batch.deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Aggregated outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One entry per target, in input order.
    pub hosts: Vec<Arc<HostStats>>,
    /// Targets abandoned because the deadline passed.
    pub timed_out: usize,
}

impl BatchReport {
    pub fn online(&self) -> usize {
        self.hosts.iter().filter(|h| h.is_online()).count()
    }

    pub fn offline(&self) -> usize {
        self.hosts.len() - self.online()
    }

    pub fn filtered(&self, filter: OutputFilter) -> Vec<Arc<HostStats>> {
        filter.apply(&self.hosts)
    }

    /// Process exit status for `policy`: 0 on success, 1 otherwise.
    pub fn exit_code(&self, policy: ExitPolicy) -> u8 {
        let failed = match policy {
            ExitPolicy::Never => false,
            ExitPolicy::AnyDown => self.offline() > 0,
            ExitPolicy::AllDown => !self.hosts.is_empty() && self.online() == 0,
        };
        u8::from(failed)
    }
}

/// Probe every target once through a bounded worker pool.
pub async fn run_batch(jobs: Vec<(Target, Arc<dyn Probe>)>, settings: BatchSettings) -> BatchReport {
    if jobs.is_empty() {
        return BatchReport::default();
    }

    let total = jobs.len();
    let workers = settings.max_concurrent.clamp(1, total);
    let monitor_settings = MonitorSettings {
        interval: settings.timeout,
        timeout: settings.timeout,
        down_threshold: settings.timeout,
    };

    tracing::info!(
        targets = total,
        workers,
        timeout_ms = settings.timeout.as_millis() as u64,
        "Batch run starting"
    );

    let (job_tx, job_rx) = mpsc::unbounded_channel();
    let mut handles: Vec<StatsHandle> = Vec::with_capacity(total);
    for (index, (target, probe)) in jobs.into_iter().enumerate() {
        let monitor = HostMonitor::new(target, probe, monitor_settings);
        handles.push(monitor.stats());
        // The receiver is alive until the workers are spawned below.
        let _ = job_tx.send((index, monitor));
    }
    drop(job_tx);

    let queue = Arc::new(Mutex::new(job_rx));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();

    let tasks: Vec<JoinHandle<()>> = (0..workers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let in_flight = Arc::clone(&in_flight);
            let results = result_tx.clone();
            tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.recv().await;
                    let Some((index, mut monitor)) = next else { break };

                    metrics::set_batch_in_flight(in_flight.fetch_add(1, Ordering::SeqCst) + 1);
                    monitor.probe_once().await;
                    metrics::set_batch_in_flight(in_flight.fetch_sub(1, Ordering::SeqCst) - 1);

                    if results.send((index, monitor.stats().snapshot())).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(result_tx);

    let mut slots: Vec<Option<Arc<HostStats>>> = vec![None; total];
    let collect = async {
        while let Some((index, stats)) = result_rx.recv().await {
            slots[index] = Some(stats);
        }
    };

    let expired = match settings.deadline {
        Some(deadline) => time::timeout(deadline, collect).await.is_err(),
        None => {
            collect.await;
            false
        }
    };

    if expired {
        for task in &tasks {
            task.abort();
        }
        while let Ok((index, stats)) = result_rx.try_recv() {
            slots[index] = Some(stats);
        }
    } else {
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Batch worker failed");
            }
        }
    }
    metrics::set_batch_in_flight(0);

    let reason = if expired { DEADLINE_EXCEEDED } else { WORKER_FAILED };
    let mut missing = 0;
    let hosts: Vec<Arc<HostStats>> = slots
        .into_iter()
        .zip(&handles)
        .map(|(slot, handle)| {
            slot.unwrap_or_else(|| {
                missing += 1;
                abandoned(&handle.snapshot(), reason)
            })
        })
        .collect();

    let timed_out = if expired { missing } else { 0 };
    let report = BatchReport { hosts, timed_out };
    if expired && missing > 0 {
        tracing::warn!(abandoned = missing, "Batch deadline exceeded");
    } else if missing > 0 {
        tracing::error!(abandoned = missing, "Batch targets lost to failed workers");
    }
    tracing::info!(
        online = report.online(),
        offline = report.offline(),
        "Batch run finished"
    );
    report
}

fn abandoned(stats: &HostStats, reason: &str) -> Arc<HostStats> {
    let mut stats = stats.clone();
    stats.state = false;
    stats.last_error_message = reason.to_string();
    Arc::new(stats)
}
