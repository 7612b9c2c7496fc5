//! Host Reachability Monitor
//!
//! Probes a list of hosts over ICMP, TCP or the system `ping`, tracks whether
//! each one is up or down, and journals every change of state.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                      REACHABILITY MONITOR                        │
//!   │                                                                  │
//!   │  config + cli ──▶ targets ──▶ probe factory                      │
//!   │                                   │                              │
//!   │             ┌─────────────────────┴──────────────────┐           │
//!   │             ▼                                        ▼           │
//!   │   continuous: HostMonitor × N              batch: worker pool    │
//!   │   probe → state tracker → stats            probe once per host   │
//!   │        │                  │                        │             │
//!   │        ▼                  ▼                        ▼             │
//!   │   transition journal   snapshot loop          BatchReport        │
//!   │   (JSON lines)         (table on stdout)      (table / JSON)     │
//!   │                                                                  │
//!   │  Cross-cutting: observability (tracing, metrics), lifecycle      │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use reachability_monitor::cli::Cli;
use reachability_monitor::config::{self, MonitorConfig, OutputFormat};
use reachability_monitor::journal::{JournalSettings, TransitionLogger};
use reachability_monitor::lifecycle::wait_for_signal;
use reachability_monitor::observability::{logging, metrics};
use reachability_monitor::orchestrator::{
    render_batch_json, render_table, run_batch, run_snapshot_loop, BatchSettings, ConsoleSink,
    Orchestrator, OutputFilter,
};
use reachability_monitor::probe::ProbeFactory;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => config::read_config(path)?,
        None => MonitorConfig::default(),
    };
    let config = cli.apply(file_config);

    if let Err(errors) = config::validate_config(&config) {
        for error in &errors {
            eprintln!("config error: {error}");
        }
        return Ok(ExitCode::from(2));
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "reachability-monitor starting");

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(error = %e, "Failed to start metrics endpoint");
        }
    }

    let targets = config::parse_targets(&config)?;
    let factory = ProbeFactory::new(config.probe.clone());
    let filter = OutputFilter::from(&config.output);

    tracing::info!(
        targets = targets.len(),
        probe = %config.probe.kind,
        once = config.batch.once,
        "Configuration loaded"
    );

    if config.batch.once {
        let jobs = targets
            .into_iter()
            .map(|target| {
                let probe = factory.build(&target);
                (target, probe)
            })
            .collect();
        let report = run_batch(jobs, BatchSettings::from(&config)).await;

        match config.output.format {
            OutputFormat::Json => println!("{}", render_batch_json(&report, filter)?),
            OutputFormat::Table => print!("{}", render_table(&report.filtered(filter))),
        }
        return Ok(ExitCode::from(report.exit_code(config.batch.exit_policy)));
    }

    let journal = match &config.journal.path {
        Some(path) => Some(TransitionLogger::open(path, JournalSettings::from(&config.journal)).await?),
        None => None,
    };

    let run = Orchestrator::from_config(&config, targets, &factory).start(journal.as_ref().map(|j| j.sender()));
    let display = tokio::spawn(run_snapshot_loop(
        run.handles().to_vec(),
        ConsoleSink::new(std::io::stdout()),
        Duration::from_millis(config.output.refresh_ms),
        filter,
        run.subscribe(),
    ));

    wait_for_signal().await;

    let last = run.shutdown().await;
    if let Err(e) = display.await {
        tracing::error!(error = %e, "Status display task failed");
    }
    if let Some(journal) = journal {
        journal.close().await?;
    }

    tracing::info!(
        hosts = last.len(),
        online = last.iter().filter(|h| h.is_online()).count(),
        "Shutdown complete"
    );
    Ok(ExitCode::SUCCESS)
}
