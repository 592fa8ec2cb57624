//! Harvest Scanner - crawl orchestration for the contact harvester.
//!
//! Turns configured search terms and locations into directory searches,
//! follows each listing to its website, and records the contacts found.
//!
//! # Pipeline
//!
//! - [`QueryPlanner`] expands terms × locations into ordered queries
//! - [`ListingDiscoverer`] scrolls a directory search and collects listings
//! - [`ListingResolver`] visits each listing and finds its website
//! - [`ConcurrencyLimiter`] fans websites out to [`SiteExtractor`] workers,
//!   flushing the store after every batch
//! - [`Engine`] runs all of the above with start/stop/clear/status control
//!
//! Discovery and resolution for a query share one browser session and run
//! serially; website visits run in parallel, one isolated session each.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_scanner::Engine;
//! use std::sync::Arc;
//!
//! let engine = Engine::new(config, Arc::new(store), Arc::new(browser), logs);
//! if let Some(run) = engine.start() {
//!     let summary = run.await??;
//!     println!("{} records", summary.records);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod directory;
#[allow(missing_docs)]
pub mod discoverer;
#[allow(missing_docs)]
pub mod engine;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod limiter;
#[allow(missing_docs)]
pub mod patterns;
#[allow(missing_docs)]
pub mod planner;
#[allow(missing_docs)]
pub mod resolver;
#[allow(missing_docs)]
pub mod site;

// Re-export commonly used types
pub use directory::DirectoryProfile;
pub use discoverer::ListingDiscoverer;
pub use engine::{Engine, EngineStatus, RunSummary};
pub use error::{Result, ScanError};
pub use limiter::{BatchReport, ConcurrencyLimiter, BATCH_SIZE};
pub use patterns::{extract_emails, extract_phone, format_phone, is_valid_email, PhoneRules};
pub use planner::QueryPlanner;
pub use resolver::ListingResolver;
pub use site::{SiteExtractor, SiteOutcome, SiteTarget};
