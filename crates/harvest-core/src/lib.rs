//! Harvest Core - Foundation crate for the contact harvester.
//!
//! This crate provides shared types, error handling, configuration management,
//! and recent-log capture that all other Harvest crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Configuration error types using thiserror
//! - [`config`] - TOML/JSON configuration with validated ranges and XDG paths
//! - [`types`] - Shared domain types (`ContactRecord`, `Query`, `EngineState`)
//! - [`logging`] - Bounded ring buffer of recent log lines, exposed as a tracing layer
//!
//! # Example
//!
//! ```rust
//! use harvest_core::{HarvestConfig, Query};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = HarvestConfig::default();
//! config.search_term = "Bakery".to_string();
//! config.locations = vec!["Springfield".to_string()];
//! config.validate()?;
//!
//! let query = Query::new("Bakery", "Springfield");
//! assert_eq!(query.text(), "Bakery Springfield");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::HarvestConfig;
pub use error::{ConfigError, ConfigResult};
pub use logging::RecentLogs;
pub use types::{ContactRecord, EngineState, Query};
