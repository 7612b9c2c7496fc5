//! Orchestration subsystem: the two operating modes.
//!
//! # Data Flow
//! ```text
//! Continuous (continuous.rs):
//!     targets → one HostMonitor task each → run until shutdown
//!     snapshot loop (snapshot.rs) → OutputFilter → SnapshotSink
//!
//! Batch (batch.rs):
//!     targets → queue → fixed worker pool → result collector
//!     → BatchReport (input order) → OutputFilter → report.rs
//! ```
//!
//! # Design Decisions
//! - Both modes share HostMonitor and the Probe trait
//! - The output filter is applied only where results are consumed
//! - Batch concurrency is bounded by the worker count

pub mod batch;
pub mod continuous;
pub mod filter;
pub mod report;
pub mod snapshot;

pub use batch::{run_batch, BatchReport, BatchSettings};
pub use continuous::{ContinuousRun, Orchestrator};
pub use filter::OutputFilter;
pub use report::{render_batch_json, render_table, ConsoleSink};
pub use snapshot::{run_snapshot_loop, SnapshotSink};
