//! Host monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! HostMonitor (host.rs), one task per target:
//!     tick → Probe::run (bounded by timeout)
//!     → StateTracker::observe (state.rs)
//!     → HostStats updated, snapshot published (stats.rs)
//!     → on transition: TransitionRecord → journal
//!
//! Readers (snapshot loop, batch report):
//!     StatsHandle::snapshot → Arc<HostStats>
//! ```
//!
//! # Design Decisions
//! - Each monitor is the single writer of its host's statistics
//! - Readers get immutable snapshots and never block the writer
//! - Transitions for one host are strictly ordered; no ordering across hosts

pub mod host;
pub mod state;
pub mod stats;

pub use host::{HostMonitor, MonitorSettings};
pub use state::{Reachability, StateTracker, Transition};
pub use stats::{HostStats, StatsHandle};
