//! Browser automation capability for directory and website visits.
//!
//! Scanning code talks to [`BrowserDriver`] and [`BrowserSession`] only.
//! [`BrowserEngine`] implements them on a local Chromium over the DevTools
//! protocol; each session gets its own browser context so cookies and cache
//! never leak between visits.

pub mod domain;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod session;

pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use fingerprint::{FingerprintConfig, BLOCKED_RESOURCES, USER_AGENTS};
pub use session::{BrowserDriver, BrowserSession, ElementHandle, WaitCondition};
