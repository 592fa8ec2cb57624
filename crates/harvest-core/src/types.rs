//! Shared types used across the harvester.
//!
//! This module defines the contact record, search query, and engine state
//! types that the store, scanner, and binary exchange.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One deduplicated contact, keyed by its case-insensitive email.
///
/// `email`, `company` and `source_url` never change once the record exists.
/// `phone` is resolved from the phone recorded for `source_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Company name derived from the source domain
    pub company: String,
    /// Email in the form it was first seen
    pub email: String,
    /// Phone number in display form, if one was found for the source URL
    pub phone: Option<String>,
    /// Page the email was found on
    pub source_url: String,
    /// Directory listing that led to the source page, when known
    pub listing_url: Option<String>,
}

impl ContactRecord {
    /// Lowercased, trimmed email used for identity comparisons.
    #[must_use]
    pub fn key(&self) -> String {
        canonical_email(&self.email)
    }
}

/// Canonical comparison form of an email address.
#[must_use]
pub fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A single directory search: one term in one location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Business category or keyword
    pub term: String,
    /// Location the search is scoped to (may be empty)
    pub location: String,
}

impl Query {
    /// Create a new query.
    #[must_use]
    pub fn new(term: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            location: location.into(),
        }
    }

    /// The search string sent to the directory: `"{term} {location}"`.
    #[must_use]
    pub fn text(&self) -> String {
        if self.location.is_empty() {
            self.term.clone()
        } else {
            format!("{} {}", self.term, self.location)
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Run state of the engine.
///
/// `Idle -> Running` on start, `Running -> Stopping` on stop, and back to
/// `Idle` whenever the run task ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No run in progress
    #[default]
    Idle,
    /// A run is in progress
    Running,
    /// Stop requested; the run exits at its next loop boundary
    Stopping,
}

impl EngineState {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
