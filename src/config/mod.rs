//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (cli.rs)
//!     → validation.rs (semantic checks, target parsing)
//!     → MonitorConfig (validated, immutable)
//!     → handed to the orchestrator at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any validation error is fatal before a monitor starts

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    BatchConfig, ExitPolicy, JournalConfig, LogFormat, MonitorConfig, MonitorLoopConfig,
    ObservabilityConfig, OutputConfig, OutputFormat, ProbeConfig,
};
pub use validation::{parse_targets, validate_config, ValidationError};
