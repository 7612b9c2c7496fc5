//! Human and machine readable reports.

use std::io::{self, Write};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::monitor::{HostStats, Reachability};
use crate::orchestrator::batch::BatchReport;
use crate::orchestrator::filter::OutputFilter;
use crate::orchestrator::snapshot::SnapshotSink;

const HEADER: [&str; 7] = ["HOST", "ADDRESS", "STATE", "RTT", "LOSS", "SENT/RECV", "LAST ERROR"];

/// Render hosts as an aligned plain-text table.
pub fn render_table(hosts: &[Arc<HostStats>]) -> String {
    let rows: Vec<[String; 7]> = hosts.iter().map(|h| row(h)).collect();

    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADER, &widths);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        push_line(&mut out, &cells, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[&str], widths: &[usize; 7]) {
    let mut line = String::new();
    for (cell, &width) in cells.iter().zip(widths) {
        line.push_str(&format!("{cell:<width$}  "));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

fn row(h: &HostStats) -> [String; 7] {
    let state = if h.setup_failure {
        "unavailable".to_string()
    } else {
        h.reachability.to_string()
    };
    [
        h.target.clone(),
        h.address.map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
        state,
        h.last_rtt
            .map(|rtt| format!("{:.1}ms", rtt.as_secs_f64() * 1000.0))
            .unwrap_or_else(|| "-".into()),
        format!("{:.0}%", h.loss_percent()),
        format!("{}/{}", h.sent_count, h.received_count),
        h.last_error_message.clone(),
    ]
}

#[derive(Serialize)]
struct BatchJson<'a> {
    online: usize,
    offline: usize,
    timed_out: usize,
    hosts: Vec<&'a HostStats>,
}

/// Render a batch report as pretty JSON, listing only hosts passing `filter`.
pub fn render_batch_json(report: &BatchReport, filter: OutputFilter) -> serde_json::Result<String> {
    let shown = report.filtered(filter);
    let body = BatchJson {
        online: report.online(),
        offline: report.offline(),
        timed_out: report.timed_out,
        hosts: shown.iter().map(|h| &**h).collect(),
    };
    serde_json::to_string_pretty(&body)
}

/// Snapshot sink that reprints the table whenever a host changes state or error.
pub struct ConsoleSink<W> {
    out: W,
    last: Vec<(String, Reachability, String)>,
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> SnapshotSink for ConsoleSink<W> {
    fn consume(&mut self, hosts: &[Arc<HostStats>]) {
        let current: Vec<_> = hosts
            .iter()
            .map(|h| (h.host.clone(), h.reachability, h.last_error_message.clone()))
            .collect();
        if current == self.last {
            return;
        }
        self.last = current;

        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let text = format!("\n{stamp}\n{}", render_table(hosts));
        if let Err(e) = write_blocking(&mut self.out, text.as_bytes()) {
            tracing::warn!(error = %e, "Failed to write status table");
        }
    }
}

/// Write and flush `bytes`, through `block_in_place` on a multi-thread runtime.
fn write_blocking<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    let mut write = || {
        out.write_all(bytes)?;
        out.flush()
    };
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => tokio::task::block_in_place(write),
        _ => write(),
    }
}
