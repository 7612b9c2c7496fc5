//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main begins shutdown
//!
//! Shutdown (shutdown.rs):
//!     trigger → every host monitor and the snapshot loop exit
//!     → orchestrator awaits them → journal drains and closes
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop probing, wait for monitors, then close the journal
//! - Trigger is sticky so tasks started late still stop

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::wait_for_signal;
