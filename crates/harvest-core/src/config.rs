//! Configuration management for the harvester.
//!
//! Provides a fixed configuration structure with explicit defaults, TOML or
//! JSON loading, XDG-compliant paths, environment variable overrides, and
//! range validation at load time.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on digits in any phone number (E.164).
pub const MAX_PHONE_DIGITS: usize = 15;

/// Harvester configuration.
///
/// Loaded from `~/.config/harvest/config.toml` (or platform equivalent) or an
/// explicit path. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Single search term; commas separate several terms
    pub search_term: String,
    /// Search terms, as a list or a comma-separated string
    #[serde(deserialize_with = "string_or_list")]
    pub search_terms: Vec<String>,
    /// Locations, as a list or a comma-separated string
    #[serde(deserialize_with = "string_or_list")]
    pub locations: Vec<String>,
    /// Persisted store file (CSV)
    pub output_filename: PathBuf,
    /// Maximum listings per query (0 = unbounded)
    pub max_results_per_query: usize,
    /// Maximum concurrent website extractions
    pub max_concurrent_pages: usize,
    /// Minimum digits for a phone number to be accepted
    pub phone_min_digits: usize,
    /// Maximum digits for a phone number to be accepted
    pub phone_max_digits: usize,
    /// Run the browser without a window
    pub headless: bool,
    /// Pause after each results-panel scroll, in seconds
    pub scroll_pause_time: f64,
    /// Maximum scroll iterations per query
    pub max_scroll_attempts: u32,
    /// Lower bound of the randomized pause between queries, in seconds
    #[serde(alias = "delay_between_queries_seconds_min")]
    pub delay_between_queries_min: f64,
    /// Upper bound of the randomized pause between queries, in seconds
    #[serde(alias = "delay_between_queries_seconds_max")]
    pub delay_between_queries_max: f64,
    /// Timeout for directory and website navigations, in seconds
    pub navigation_timeout_secs: u64,
    /// Timeout for contact-page fallback navigations, in seconds
    pub fallback_timeout_secs: u64,
    /// Pause after the search view loads, before reading results, in seconds
    pub results_settle_time: f64,
    /// Pause after a listing or website loads, before reading it, in seconds
    pub page_settle_time: f64,
    /// Fixed pause between website retries, in seconds
    pub retry_pause_time: f64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            search_terms: Vec::new(),
            locations: Vec::new(),
            output_filename: PathBuf::from("recipients.csv"),
            max_results_per_query: 0,
            max_concurrent_pages: 5,
            phone_min_digits: 10,
            phone_max_digits: MAX_PHONE_DIGITS,
            headless: true,
            scroll_pause_time: 2.0,
            max_scroll_attempts: 20,
            delay_between_queries_min: 3.0,
            delay_between_queries_max: 5.0,
            navigation_timeout_secs: 30,
            fallback_timeout_secs: 20,
            results_settle_time: 3.0,
            page_settle_time: 1.0,
            retry_pause_time: 2.0,
        }
    }
}

impl HarvestConfig {
    /// Load configuration from the XDG config path, falling back to defaults if not found.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, falling back to defaults if not found.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    /// The result is validated before it is returned.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let config: Self = if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            if is_json(path) {
                serde_json::from_str(&contents)?
            } else {
                toml::from_str(&contents)?
            }
        } else {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path` with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `HARVEST_HEADLESS`: Override browser headless mode (true/false)
    /// - `HARVEST_MAX_CONCURRENT_PAGES`: Override the site concurrency cap
    /// - `HARVEST_OUTPUT`: Override the persisted store path
    pub fn load_with_env(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(headless) = lookup("HARVEST_HEADLESS").and_then(|v| v.parse().ok()) {
            self.headless = headless;
            tracing::debug!("Override headless from env: {}", headless);
        }

        if let Some(max) = lookup("HARVEST_MAX_CONCURRENT_PAGES").and_then(|v| v.parse().ok()) {
            self.max_concurrent_pages = max;
            tracing::debug!("Override max_concurrent_pages from env: {}", max);
        }

        if let Some(output) = lookup("HARVEST_OUTPUT").filter(|v| !v.trim().is_empty()) {
            tracing::debug!("Override output_filename from env: {}", output);
            self.output_filename = PathBuf::from(output);
        }
    }

    /// Save configuration to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        tracing::debug!("Saving config to {}", path.display());

        let contents = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.output_filename.as_os_str().is_empty() {
            return Err(ConfigError::invalid("output_filename", "must not be empty"));
        }
        if !(1..=50).contains(&self.max_concurrent_pages) {
            return Err(ConfigError::invalid(
                "max_concurrent_pages",
                format!("must be between 1 and 50, got {}", self.max_concurrent_pages),
            ));
        }
        if !(7..=MAX_PHONE_DIGITS).contains(&self.phone_min_digits) {
            return Err(ConfigError::invalid(
                "phone_min_digits",
                format!(
                    "must be between 7 and {MAX_PHONE_DIGITS}, got {}",
                    self.phone_min_digits
                ),
            ));
        }
        if !(self.phone_min_digits..=MAX_PHONE_DIGITS).contains(&self.phone_max_digits) {
            return Err(ConfigError::invalid(
                "phone_max_digits",
                format!(
                    "must be between phone_min_digits ({}) and {MAX_PHONE_DIGITS}, got {}",
                    self.phone_min_digits, self.phone_max_digits
                ),
            ));
        }
        if !(1..=500).contains(&self.max_scroll_attempts) {
            return Err(ConfigError::invalid(
                "max_scroll_attempts",
                format!("must be between 1 and 500, got {}", self.max_scroll_attempts),
            ));
        }
        if !(1..=300).contains(&self.navigation_timeout_secs) {
            return Err(ConfigError::invalid(
                "navigation_timeout_secs",
                "must be between 1 and 300",
            ));
        }
        if !(1..=300).contains(&self.fallback_timeout_secs) {
            return Err(ConfigError::invalid(
                "fallback_timeout_secs",
                "must be between 1 and 300",
            ));
        }

        check_seconds("scroll_pause_time", self.scroll_pause_time, 60.0)?;
        check_seconds("results_settle_time", self.results_settle_time, 60.0)?;
        check_seconds("page_settle_time", self.page_settle_time, 60.0)?;
        check_seconds("retry_pause_time", self.retry_pause_time, 60.0)?;
        check_seconds(
            "delay_between_queries_min",
            self.delay_between_queries_min,
            600.0,
        )?;
        check_seconds(
            "delay_between_queries_max",
            self.delay_between_queries_max,
            600.0,
        )?;
        if self.delay_between_queries_min > self.delay_between_queries_max {
            return Err(ConfigError::invalid(
                "delay_between_queries_min",
                "must not exceed delay_between_queries_max",
            ));
        }

        Ok(())
    }

    /// Check that at least one search term is configured.
    ///
    /// Kept apart from [`validate`](Self::validate) so an empty default
    /// config can still be loaded, inspected and saved.
    pub fn require_terms(&self) -> ConfigResult<()> {
        if self.terms().is_empty() {
            return Err(ConfigError::invalid(
                "search_terms",
                "at least one search term is required",
            ));
        }
        Ok(())
    }

    /// All configured search terms, in order.
    ///
    /// `search_terms` comes first, then the comma-separated `search_term`.
    /// Entries are trimmed, empties dropped, and repeats removed.
    #[must_use]
    pub fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        let listed = self.search_terms.iter().map(String::as_str);
        for term in listed.chain(self.search_term.split(',')) {
            let term = term.trim();
            if !term.is_empty() && !terms.iter().any(|t| t == term) {
                terms.push(term.to_string());
            }
        }
        terms
    }

    /// Configured locations, trimmed and without empties.
    #[must_use]
    pub fn location_list(&self) -> Vec<String> {
        self.locations
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Navigation timeout as a `Duration`.
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Fallback-page navigation timeout as a `Duration`.
    #[must_use]
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/harvest/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "harvest", "harvest").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Convert a seconds value from config into a `Duration`.
///
/// Negative or non-finite values become zero; `validate` rejects them anyway.
#[must_use]
pub fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

fn check_seconds(field: &str, value: f64, max: f64) -> ConfigResult<()> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be between 0 and {max} seconds, got {value}"),
        ))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        StringOrList::Many(items) => items,
    })
}
