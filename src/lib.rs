//! Host reachability monitor library.

pub mod cli;
pub mod config;
pub mod journal;
pub mod lifecycle;
pub mod monitor;
pub mod observability;
pub mod orchestrator;
pub mod probe;

pub use config::MonitorConfig;
pub use lifecycle::Shutdown;
pub use monitor::{HostMonitor, HostStats, StateTracker};
pub use orchestrator::{run_batch, Orchestrator};
