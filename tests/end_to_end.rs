//! Continuous-mode scenarios driven by scripted probes on a paused clock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reachability_monitor::journal::{JournalSettings, TransitionLogger, TransitionRecord};
use reachability_monitor::monitor::{MonitorSettings, Reachability, Transition};
use reachability_monitor::Orchestrator;
use tokio::time::Instant;

mod common;
use common::{target, ScriptedProbe, FALLBACK_IP};

fn settings() -> MonitorSettings {
    MonitorSettings {
        interval: Duration::from_secs(1),
        timeout: Duration::from_secs(1),
        down_threshold: Duration::from_secs(2),
    }
}

fn journal_settings() -> JournalSettings {
    JournalSettings {
        flush_interval: Duration::from_millis(500),
        queue_capacity: 64,
    }
}

fn read_journal(path: &Path) -> Vec<TransitionRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_three_host_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transitions.jsonl");
    let logger = TransitionLogger::open(&path, journal_settings()).await.unwrap();

    let mut orchestrator = Orchestrator::new(settings(), false);
    orchestrator.add(target("steady.example:443"), Arc::new(ScriptedProbe::always_up()));
    orchestrator.add(target("dead.example:443"), Arc::new(ScriptedProbe::always_down()));
    orchestrator.add(target("flaky.example:443"), Arc::new(ScriptedProbe::alternating(4)));

    // Probes at t = 0, 1, ..., 17 seconds.
    let run = orchestrator.start(Some(logger.sender()));
    tokio::time::sleep(Duration::from_millis(17_500)).await;
    let last = run.shutdown().await;
    let summary = logger.close().await.unwrap();

    let steady = &last[0];
    assert_eq!(steady.reachability, Reachability::Up);
    assert!(steady.is_online());
    assert_eq!(steady.sent_count, 18);
    assert_eq!(steady.received_count, 18);

    let dead = &last[1];
    assert_eq!(dead.reachability, Reachability::Down);
    assert!(!dead.state);
    assert_eq!(dead.consecutive_loss_count, 18);
    // Down since the first probe at t = 0.
    assert_eq!(dead.last_loss_duration, Duration::from_secs(17));

    let flaky = &last[2];
    assert_eq!(flaky.reachability, Reachability::Up);
    assert!(flaky.last_transition_time.is_some());

    assert_eq!(summary.written, 5);
    assert_eq!(summary.dropped, 0);
    assert_eq!(summary.write_failures, 0);

    let records = read_journal(&path);
    let mut by_host: HashMap<&str, Vec<&TransitionRecord>> = HashMap::new();
    for record in &records {
        by_host.entry(record.host.as_str()).or_default().push(record);
    }

    assert!(!by_host.contains_key("steady.example"));

    let dead_records = &by_host["dead.example"];
    assert_eq!(dead_records.len(), 1);
    assert_eq!(dead_records[0].transition, Transition::UpToDown);
    assert!(!dead_records[0].state);
    assert_eq!(dead_records[0].ip, FALLBACK_IP.to_string());

    let flaky_records = &by_host["flaky.example"];
    let transitions: Vec<Transition> = flaky_records.iter().map(|r| r.transition).collect();
    assert_eq!(
        transitions,
        [
            Transition::UpToDown,
            Transition::DownToUp,
            Transition::UpToDown,
            Transition::DownToUp,
        ]
    );
    let states: Vec<bool> = flaky_records.iter().map(|r| r.state).collect();
    assert_eq!(states, [false, true, false, true]);
    assert!(flaky_records.windows(2).all(|w| w[0].unix_nano < w[1].unix_nano));
}

#[tokio::test(start_paused = true)]
async fn test_slow_start_emits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transitions.jsonl");
    let logger = TransitionLogger::open(&path, journal_settings()).await.unwrap();

    // Fails at t = 0 and 1, answers from t = 2 on: never silent past the threshold.
    let mut orchestrator = Orchestrator::new(settings(), false);
    orchestrator.add(target("booting.example:22"), Arc::new(ScriptedProbe::new(|n| n >= 2)));

    let run = orchestrator.start(Some(logger.sender()));
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    let last = run.shutdown().await;
    let summary = logger.close().await.unwrap();

    assert_eq!(last[0].reachability, Reachability::Up);
    assert_eq!(summary.written, 0);
    assert!(read_journal(&path).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_single_success_ends_long_downtime() {
    let mut orchestrator = Orchestrator::new(settings(), false);
    orchestrator.add(target("recovering.example:80"), Arc::new(ScriptedProbe::new(|n| n == 0 || n >= 30)));

    let run = orchestrator.start(None);
    tokio::time::sleep(Duration::from_millis(29_500)).await;
    let down = run.snapshots();
    assert_eq!(down[0].reachability, Reachability::Down);
    assert_eq!(down[0].consecutive_loss_count, 29);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let up = run.snapshots();
    assert_eq!(up[0].reachability, Reachability::Up);
    assert_eq!(up[0].consecutive_loss_count, 0);
    assert!(up[0].is_online());

    run.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_at_most_one_probe() {
    let mut orchestrator = Orchestrator::new(settings(), false);
    orchestrator.add(
        target("stuck.example:80"),
        Arc::new(ScriptedProbe::always_up().with_delay(Duration::from_secs(60))),
    );

    let run = orchestrator.start(None);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stopping = Instant::now();
    let last = run.shutdown().await;

    // The hung probe is cut off at timeout plus the monitor's guard.
    assert!(stopping.elapsed() <= Duration::from_millis(1_250));
    assert_eq!(last[0].sent_count, 1);
    assert_eq!(last[0].last_error_message, "timeout after 1000ms");
}
