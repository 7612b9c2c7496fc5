//! Transition journal subsystem.
//!
//! # Data Flow
//! ```text
//! Host monitors (many producers):
//!     transition detected
//!     → TransitionRecord (record.rs)
//!     → TransitionSender::record (non-blocking try_send)
//!
//! Writer task (one consumer, logger.rs):
//!     flush timer / close
//!     → drain queue
//!     → one JSON object per line
//!     → flush destination
//! ```
//!
//! # Design Decisions
//! - Producers and the writer share only the bounded queue
//! - Enqueue order is preserved within a flush batch
//! - Cross-host ordering is only what the embedded timestamps give

pub mod logger;
pub mod record;

pub use logger::{JournalError, JournalSettings, JournalSummary, TransitionLogger, TransitionSender};
pub use record::TransitionRecord;
