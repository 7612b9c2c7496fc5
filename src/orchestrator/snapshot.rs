//! Periodic snapshot delivery to a consumer.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::lifecycle::ShutdownListener;
use crate::monitor::{HostStats, StatsHandle};
use crate::orchestrator::filter::OutputFilter;

/// Consumer of periodic host snapshots (display, collectors).
pub trait SnapshotSink: Send {
    fn consume(&mut self, hosts: &[Arc<HostStats>]);
}

/// Feed filtered snapshots to `sink` every `refresh` until shutdown.
///
/// A final round is delivered after shutdown so the sink sees the last state.
pub async fn run_snapshot_loop<S: SnapshotSink>(
    handles: Vec<StatsHandle>,
    mut sink: S,
    refresh: Duration,
    filter: OutputFilter,
    mut shutdown: ShutdownListener,
) -> S {
    let mut ticker = time::interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let deliver = |sink: &mut S| {
        let hosts: Vec<Arc<HostStats>> = handles.iter().map(StatsHandle::snapshot).collect();
        sink.consume(&filter.apply(&hosts));
    };

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = ticker.tick() => deliver(&mut sink),
        }
    }

    deliver(&mut sink);
    sink
}
