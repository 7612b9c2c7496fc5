//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define monitor metrics (probes, round-trip times, transitions, journal health)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `reachability_probes_total` (counter): probes by kind and outcome
//! - `reachability_probe_rtt_seconds` (histogram): successful round-trip times
//! - `reachability_transitions_total` (counter): state changes by direction
//! - `reachability_journal_dropped_total` (counter): records lost to a full queue
//! - `reachability_journal_write_failures_total` (counter): failed journal flushes
//! - `reachability_batch_in_flight` (gauge): probes currently running in batch mode
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels are static strings only

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::monitor::state::Transition;
use crate::probe::ProbeKind;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    ::metrics::describe_counter!("reachability_probes_total", "Probes sent, by kind and outcome");
    ::metrics::describe_histogram!(
        "reachability_probe_rtt_seconds",
        ::metrics::Unit::Seconds,
        "Round-trip time of successful probes"
    );
    ::metrics::describe_counter!(
        "reachability_transitions_total",
        "Host state changes, by direction"
    );
    ::metrics::describe_counter!(
        "reachability_journal_dropped_total",
        "Transition records dropped before reaching the journal"
    );
    ::metrics::describe_counter!(
        "reachability_journal_write_failures_total",
        "Journal flushes that failed"
    );
    ::metrics::describe_gauge!(
        "reachability_batch_in_flight",
        "Probes currently running in batch mode"
    );
}

/// Record one probe outcome. `outcome` is `"success"` or an error label.
pub fn record_probe(kind: ProbeKind, outcome: &'static str, rtt: Option<Duration>) {
    ::metrics::counter!(
        "reachability_probes_total",
        "kind" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);

    if let Some(rtt) = rtt {
        ::metrics::histogram!("reachability_probe_rtt_seconds", "kind" => kind.as_str())
            .record(rtt.as_secs_f64());
    }
}

pub fn record_transition(transition: Transition) {
    let direction = match transition {
        Transition::UpToDown => "down",
        Transition::DownToUp => "up",
    };
    ::metrics::counter!("reachability_transitions_total", "direction" => direction).increment(1);
}

pub fn record_journal_dropped() {
    ::metrics::counter!("reachability_journal_dropped_total").increment(1);
}

pub fn record_journal_write_failure() {
    ::metrics::counter!("reachability_journal_write_failures_total").increment(1);
}

pub fn set_batch_in_flight(in_flight: usize) {
    ::metrics::gauge!("reachability_batch_in_flight").set(in_flight as f64);
}
