//! Asynchronous transition logger.
//!
//! # Responsibilities
//! - Accept records from any number of host monitors without blocking them
//! - Flush queued records to the destination on a fixed interval
//! - Drain and flush everything still queued on close
//!
//! # Design Decisions
//! - Bounded queue; when it is full the record is dropped with a warning and
//!   counted, so a slow disk can never stall a probe cycle
//! - Records queued but not yet flushed are lost if the process dies abruptly
//! - Write failures are logged and counted; the writer keeps running
//! - Records count as written only once their whole line reached the sink;
//!   a line torn by a failed write is terminated before anything else is
//!   appended, so every later record stays on a line of its own

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::JournalConfig;
use crate::journal::record::TransitionRecord;
use crate::observability::metrics;

/// Errors raised by the transition journal.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("cannot open transition log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write transition records: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to encode transition record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("transition journal task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Journal tuning.
#[derive(Debug, Clone, Copy)]
pub struct JournalSettings {
    pub flush_interval: Duration,
    pub queue_capacity: usize,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self::from(&JournalConfig::default())
    }
}

impl From<&JournalConfig> for JournalSettings {
    fn from(config: &JournalConfig) -> Self {
        Self {
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            queue_capacity: config.queue_capacity.max(1),
        }
    }
}

/// Totals reported when the journal closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalSummary {
    pub written: u64,
    pub dropped: u64,
    pub write_failures: u64,
}

/// Producer side of the journal. Cheap to clone, one per monitor.
#[derive(Clone, Debug)]
pub struct TransitionSender {
    tx: mpsc::Sender<TransitionRecord>,
    dropped: Arc<AtomicU64>,
}

impl TransitionSender {
    /// Queue a record without waiting.
    ///
    /// Returns `false` if the record was dropped because the queue was full
    /// or the journal already closed.
    pub fn record(&self, record: TransitionRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_journal_dropped();
                tracing::warn!(
                    host = %record.host,
                    transition = %record.transition,
                    "Transition journal queue full, dropping record"
                );
                false
            }
            Err(TrySendError::Closed(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_journal_dropped();
                tracing::warn!(
                    host = %record.host,
                    transition = %record.transition,
                    "Transition journal closed, dropping record"
                );
                false
            }
        }
    }

    /// Number of records dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Owner of the background writer task.
pub struct TransitionLogger {
    sender: TransitionSender,
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<(u64, u64)>,
}

impl TransitionLogger {
    /// Open `path` for appending and start the writer.
    pub async fn open(path: &Path, settings: JournalSettings) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| JournalError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(
            path = %path.display(),
            flush_interval_ms = settings.flush_interval.as_millis() as u64,
            queue_capacity = settings.queue_capacity,
            "Transition journal opened"
        );
        Ok(Self::spawn(file, settings))
    }

    /// Start a writer over any async sink.
    pub fn spawn<W>(writer: W, settings: JournalSettings) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let (close_tx, close_rx) = oneshot::channel();

        let worker = JournalWriter {
            rx,
            out: writer,
            written: 0,
            write_failures: 0,
            torn: false,
        };
        let task = tokio::spawn(worker.run(settings.flush_interval, close_rx));

        Self {
            sender: TransitionSender {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            close_tx,
            task,
        }
    }

    /// A producer handle for a monitor.
    pub fn sender(&self) -> TransitionSender {
        self.sender.clone()
    }

    /// Stop accepting records, flush everything queued and wait for the writer.
    pub async fn close(self) -> Result<JournalSummary, JournalError> {
        let _ = self.close_tx.send(());
        let (written, write_failures) = self.task.await?;

        let summary = JournalSummary {
            written,
            dropped: self.sender.dropped(),
            write_failures,
        };
        tracing::info!(
            written = summary.written,
            dropped = summary.dropped,
            write_failures = summary.write_failures,
            "Transition journal closed"
        );
        Ok(summary)
    }
}

struct JournalWriter<W> {
    rx: mpsc::Receiver<TransitionRecord>,
    out: W,
    written: u64,
    write_failures: u64,
    /// The sink ends in a partial line left by a failed write.
    torn: bool,
}

impl<W: AsyncWrite + Unpin> JournalWriter<W> {
    async fn run(mut self, flush_interval: Duration, mut close_rx: oneshot::Receiver<()>) -> (u64, u64) {
        let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.flush_pending().await,
                // Fires on close() and when the logger is dropped.
                _ = &mut close_rx => break,
            }
        }

        self.rx.close();
        self.flush_pending().await;
        self.finish().await;
        (self.written, self.write_failures)
    }

    async fn flush_pending(&mut self) {
        let mut batch = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            batch.push(record);
        }
        if batch.is_empty() {
            return;
        }

        let lead = usize::from(self.torn);
        let mut buf = Vec::new();
        if self.torn {
            buf.push(b'\n');
        }
        // Offset just past each encoded line.
        let mut ends = Vec::with_capacity(batch.len());
        for record in &batch {
            match record.to_json_line() {
                Ok(line) => {
                    buf.extend_from_slice(&line);
                    ends.push(buf.len());
                }
                Err(e) => {
                    let e = JournalError::from(e);
                    tracing::error!(host = %record.host, error = %e, "Transition record dropped");
                }
            }
        }
        if ends.is_empty() {
            return;
        }

        let (accepted, result) = self.write_counted(&buf).await;
        let complete = ends.iter().filter(|&&end| end <= accepted).count();
        self.written += complete as u64;

        match result {
            Ok(()) => {
                self.torn = false;
                tracing::debug!(records = complete, "Transition records flushed");
            }
            Err(e) => {
                if accepted > 0 {
                    self.torn = accepted != lead && !ends.contains(&accepted);
                }
                self.write_failures += 1;
                metrics::record_journal_write_failure();
                tracing::error!(
                    error = %JournalError::Write(e),
                    written = complete,
                    lost = ends.len() - complete,
                    "Transition journal write failed"
                );
            }
        }
    }

    /// Write `buf`, reporting how many bytes the sink took before any error.
    async fn write_counted(&mut self, buf: &[u8]) -> (usize, io::Result<()>) {
        let mut accepted = 0;
        while accepted < buf.len() {
            match self.out.write(&buf[accepted..]).await {
                Ok(0) => return (accepted, Err(io::ErrorKind::WriteZero.into())),
                Ok(n) => accepted += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return (accepted, Err(e)),
            }
        }
        (accepted, self.out.flush().await)
    }

    /// Terminate a torn line and flush the sink before the writer exits.
    async fn finish(&mut self) {
        if self.torn {
            match self.write_counted(b"\n").await {
                (1, _) => self.torn = false,
                (_, Err(e)) => {
                    tracing::error!(error = %JournalError::Write(e), "Could not terminate torn transition line");
                }
                _ => {}
            }
        }
        if let Err(e) = self.out.flush().await {
            tracing::error!(error = %JournalError::Write(e), "Final transition journal flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::state::Transition;
    use chrono::Utc;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    fn record(host: &str, nanos: i64) -> TransitionRecord {
        TransitionRecord::new(Utc::now(), nanos, host, "192.0.2.1", Transition::UpToDown)
    }

    fn read_records(path: &Path) -> Vec<TransitionRecord> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_close_flushes_in_enqueue_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transitions.jsonl");
        let settings = JournalSettings {
            flush_interval: Duration::from_secs(3600),
            queue_capacity: 16,
        };

        let logger = TransitionLogger::open(&path, settings).await.unwrap();
        let sender = logger.sender();
        for i in 0..5 {
            assert!(sender.record(record(&format!("host-{i}"), i)));
        }

        let summary = logger.close().await.unwrap();
        assert_eq!(summary, JournalSummary { written: 5, dropped: 0, write_failures: 0 });

        let hosts: Vec<String> = read_records(&path).into_iter().map(|r| r.host).collect();
        assert_eq!(hosts, ["host-0", "host-1", "host-2", "host-3", "host-4"]);
    }

    #[tokio::test]
    async fn test_periodic_flush_without_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transitions.jsonl");
        let settings = JournalSettings {
            flush_interval: Duration::from_millis(20),
            queue_capacity: 16,
        };

        let logger = TransitionLogger::open(&path, settings).await.unwrap();
        logger.sender().record(record("a", 1));

        let mut flushed = Vec::new();
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flushed = read_records(&path);
            if !flushed.is_empty() {
                break;
            }
        }
        assert_eq!(flushed.len(), 1);
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_drops_with_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transitions.jsonl");
        let settings = JournalSettings {
            flush_interval: Duration::from_secs(3600),
            queue_capacity: 2,
        };

        let logger = TransitionLogger::open(&path, settings).await.unwrap();
        let sender = logger.sender();
        assert!(sender.record(record("a", 1)));
        assert!(sender.record(record("b", 2)));
        assert!(!sender.record(record("c", 3)));
        assert_eq!(sender.dropped(), 1);

        let summary = logger.close().await.unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.dropped, 1);
        assert_eq!(read_records(&path).len(), 2);
    }

    #[tokio::test]
    async fn test_records_after_close_are_dropped() {
        let logger = TransitionLogger::spawn(tokio::io::sink(), JournalSettings::default());
        let sender = logger.sender();
        logger.close().await.unwrap();

        assert!(!sender.record(record("late", 1)));
        assert_eq!(sender.dropped(), 1);
    }

    struct BrokenDisk;

    impl AsyncWrite for BrokenDisk {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "disk on fire")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "disk on fire")))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_failures_are_recovered() {
        let settings = JournalSettings {
            flush_interval: Duration::from_millis(10),
            queue_capacity: 16,
        };
        let logger = TransitionLogger::spawn(BrokenDisk, settings);
        let sender = logger.sender();

        sender.record(record("a", 1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        // The writer survived the first failure and still accepts records.
        assert!(sender.record(record("b", 2)));

        let summary = logger.close().await.unwrap();
        assert_eq!(summary.written, 0);
        assert!(summary.write_failures >= 1);
    }

    /// Takes ten bytes of its first write, fails the next call, then works.
    #[derive(Clone, Default)]
    struct StutteringDisk {
        data: Arc<std::sync::Mutex<Vec<u8>>>,
        calls: Arc<AtomicU64>,
    }

    impl StutteringDisk {
        fn contents(&self) -> String {
            String::from_utf8(self.data.lock().unwrap().clone()).unwrap()
        }
    }

    impl AsyncWrite for StutteringDisk {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            let taken = match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => buf.len().min(10),
                1 => return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "disk hiccup"))),
                _ => buf.len(),
            };
            self.data.lock().unwrap().extend_from_slice(&buf[..taken]);
            Poll::Ready(Ok(taken))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn quick_flush() -> JournalSettings {
        JournalSettings {
            flush_interval: Duration::from_millis(10),
            queue_capacity: 16,
        }
    }

    #[tokio::test]
    async fn test_torn_line_is_terminated_on_close() {
        let disk = StutteringDisk::default();
        let logger = TransitionLogger::spawn(disk.clone(), quick_flush());
        logger.sender().record(record("a", 1));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let summary = logger.close().await.unwrap();
        assert_eq!(summary, JournalSummary { written: 0, dropped: 0, write_failures: 1 });

        let contents = disk.contents();
        assert!(contents.ends_with('\n'));
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_records_after_torn_line_stay_intact() {
        let disk = StutteringDisk::default();
        let logger = TransitionLogger::spawn(disk.clone(), quick_flush());
        let sender = logger.sender();

        sender.record(record("a", 1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        sender.record(record("b", 2));

        let summary = logger.close().await.unwrap();
        assert_eq!(summary.written, 1);
        assert_eq!(summary.write_failures, 1);

        let contents = disk.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(serde_json::from_str::<TransitionRecord>(lines[0]).is_err());
        let parsed: TransitionRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.host, "b");
        let intact = lines
            .iter()
            .filter(|line| serde_json::from_str::<TransitionRecord>(line).is_ok())
            .count();
        assert_eq!(intact as u64, summary.written);
    }

    #[tokio::test]
    async fn test_open_reports_bad_path() {
        let err = TransitionLogger::open(Path::new("/nonexistent/dir/log.jsonl"), JournalSettings::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, JournalError::Open { .. }));
    }
}
