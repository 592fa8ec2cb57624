//! Listing discovery: search, dismiss consent, scroll and collect.

use crate::directory::DirectoryProfile;
use harvest_browser::domain::resolve_http_link;
use harvest_browser::{BrowserSession, WaitCondition};
use harvest_core::config::seconds;
use harvest_core::{HarvestConfig, Query};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// Consecutive scrolls without new listings before giving up.
pub const MAX_STALLED_SCROLLS: u32 = 3;

/// Scrolls the results panel (or the window) to the bottom.
const SCROLL_SCRIPT: &str = "(selector) => { \
    const panel = document.querySelector(selector); \
    if (panel) { panel.scrollTop = panel.scrollHeight; return true; } \
    window.scrollTo(0, document.body.scrollHeight); return false; }";

/// Produces listing URLs for one query.
pub struct ListingDiscoverer {
    config: Arc<HarvestConfig>,
    profile: Arc<DirectoryProfile>,
}

impl ListingDiscoverer {
    pub fn new(config: Arc<HarvestConfig>, profile: Arc<DirectoryProfile>) -> Self {
        Self { config, profile }
    }

    /// Collect up to `limit` listing URLs for `query` (0 = unbounded).
    ///
    /// Only a failure to load or query the search view is an error;
    /// everything after that ends discovery with whatever was collected.
    pub async fn discover(
        &self,
        session: &dyn BrowserSession,
        query: &Query,
        limit: usize,
    ) -> harvest_browser::Result<Vec<String>> {
        let search_url = self.profile.search_url(query);
        tracing::info!(query = %query, "Searching directory");

        session
            .navigate(
                &search_url,
                WaitCondition::DomContentLoaded,
                self.config.navigation_timeout(),
            )
            .await?;

        self.dismiss_consent(session).await;
        tokio::time::sleep(seconds(self.config.results_settle_time)).await;

        let landed = session.current_url().await.unwrap_or_default();
        if self.profile.is_listing_url(&landed) {
            tracing::info!(query = %query, "Search landed on a single listing");
            return Ok(vec![landed]);
        }

        let Some(selector) = self.find_result_selector(session).await? else {
            tracing::info!(query = %query, "No results found");
            return Ok(Vec::new());
        };

        let mut listings: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut stalled = 0;

        for _ in 0..self.config.max_scroll_attempts {
            if limit > 0 && listings.len() >= limit {
                break;
            }

            let before = listings.len();
            for href in self.listing_hrefs(session, selector, &landed).await {
                if seen.insert(href.clone()) {
                    listings.push(href);
                }
            }

            if listings.len() > before {
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= MAX_STALLED_SCROLLS {
                    tracing::debug!(query = %query, "No new listings after {} scrolls", stalled);
                    break;
                }
            }

            self.scroll_results(session).await;
            tokio::time::sleep(seconds(self.config.scroll_pause_time)).await;
        }

        if limit > 0 {
            listings.truncate(limit);
        }
        tracing::info!(query = %query, "Found {} listings", listings.len());
        Ok(listings)
    }

    /// Click the first consent button found, in the page and then in frames.
    async fn dismiss_consent(&self, session: &dyn BrowserSession) -> bool {
        for selector in &self.profile.consent_selectors {
            if let Ok(found) = session.query_all(selector).await {
                if let Some(button) = found.first() {
                    if session.click(*button).await.is_ok() {
                        tracing::debug!("Dismissed consent dialog via {}", selector);
                        return true;
                    }
                }
            }
        }

        let frames = session.frame_count().await.unwrap_or(0);
        for frame in 0..frames {
            for selector in &self.profile.consent_selectors {
                let Ok(found) = session.query_all_in_frame(frame, selector).await else {
                    continue;
                };
                if let Some(button) = found.first() {
                    if session.click(*button).await.is_ok() {
                        tracing::debug!("Dismissed consent dialog in frame {}", frame);
                        return true;
                    }
                }
            }
        }
        false
    }

    /// First result selector with any match. A failing query means the page
    /// is unusable, which is not the same as an empty result list.
    async fn find_result_selector(
        &self,
        session: &dyn BrowserSession,
    ) -> harvest_browser::Result<Option<&str>> {
        for selector in &self.profile.result_selectors {
            if !session.query_all(selector).await?.is_empty() {
                return Ok(Some(selector.as_str()));
            }
        }
        Ok(None)
    }

    async fn listing_hrefs(
        &self,
        session: &dyn BrowserSession,
        selector: &str,
        base: &str,
    ) -> Vec<String> {
        let Ok(elements) = session.query_all(selector).await else {
            return Vec::new();
        };

        let mut hrefs = Vec::new();
        for element in elements {
            let Ok(Some(href)) = session.attribute(element, "href").await else {
                continue;
            };
            if let Some(url) = resolve_http_link(base, &href) {
                if self.profile.is_listing_url(&url) {
                    hrefs.push(url);
                }
            }
        }
        hrefs
    }

    async fn scroll_results(&self, session: &dyn BrowserSession) {
        let panel = json!(self.profile.results_panel_selector);
        if let Err(e) = session.evaluate(SCROLL_SCRIPT, vec![panel]).await {
            tracing::debug!("Scroll failed: {}", e);
        }
    }
}
