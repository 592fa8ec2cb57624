//! Harvest Store
//!
//! Keeps the deduplicated contact records and the set of visited URLs for a
//! run, and persists them to a CSV file that doubles as the resume input.
//!
//! # Design Principles
//!
//! - One record per case-insensitive email; the first source to report an
//!   email owns the record
//! - Visited URLs only ever grow until an explicit clear
//! - Every flush writes a temporary file and renames it over the
//!   destination, so a polling reader never sees a torn file
//!
//! # Example
//!
//! ```no_run
//! use harvest_store::DedupStore;
//!
//! # fn main() -> Result<(), harvest_store::StoreError> {
//! let store = DedupStore::open("recipients.csv")?;
//! store.record("https://example-co.com", &["info@example-co.com".to_string()], None);
//! store.flush()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod company;
pub mod error;
pub mod store;

pub use company::company_name_for;
pub use error::{Result, StoreError};
pub use store::{DedupStore, HEADER};
