//! Listing resolution: capture contacts on the listing page and find its website.

use crate::directory::DirectoryProfile;
use crate::patterns::{extract_emails, extract_phone, PhoneRules};
use harvest_browser::domain::{resolve_http_link, strip_query_and_fragment};
use harvest_browser::{BrowserSession, WaitCondition};
use harvest_core::config::seconds;
use harvest_core::HarvestConfig;
use harvest_store::DedupStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'<>()\\]+"#).expect("valid url regex"));

/// Visits listings and extracts their outbound website.
pub struct ListingResolver {
    config: Arc<HarvestConfig>,
    profile: Arc<DirectoryProfile>,
    store: Arc<DedupStore>,
    rules: PhoneRules,
}

impl ListingResolver {
    pub fn new(
        config: Arc<HarvestConfig>,
        profile: Arc<DirectoryProfile>,
        store: Arc<DedupStore>,
    ) -> Self {
        let rules = PhoneRules::from_config(&config);
        Self {
            config,
            profile,
            store,
            rules,
        }
    }

    /// Resolve `listing_url` to its business website, if it has one.
    ///
    /// Listings already visited are skipped. Contacts shown on the listing
    /// page itself are recorded on the way.
    pub async fn resolve(&self, session: &dyn BrowserSession, listing_url: &str) -> Option<String> {
        if self.store.is_visited(listing_url) {
            tracing::debug!(url = listing_url, "Listing already visited");
            return None;
        }

        if let Err(e) = session
            .navigate(
                listing_url,
                WaitCondition::DomContentLoaded,
                self.config.navigation_timeout(),
            )
            .await
        {
            tracing::warn!(url = listing_url, "Failed to open listing: {}", e);
            return None;
        }
        tokio::time::sleep(seconds(self.config.page_settle_time)).await;
        self.store.mark_visited(listing_url);

        let content = match session.rendered_text().await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(url = listing_url, "Failed to read listing: {}", e);
                return None;
            }
        };

        let emails = extract_emails(&content);
        if !emails.is_empty() {
            let phone = extract_phone(&content, &self.rules);
            self.store
                .record_with_listing(listing_url, Some(listing_url), &emails, phone.as_deref());
        }

        let website = match self.declared_website(session, listing_url).await {
            Some(website) => Some(website),
            None => self.website_in_text(&content),
        };

        let website = website
            .map(|w| self.profile.unwrap_redirect(&w))
            .filter(|w| !self.profile.is_excluded(w))
            .map(|w| strip_query_and_fragment(&w));

        match &website {
            Some(w) => tracing::debug!(url = listing_url, website = %w, "Resolved website"),
            None => tracing::debug!(url = listing_url, "Listing has no website"),
        }
        website
    }

    async fn declared_website(&self, session: &dyn BrowserSession, base: &str) -> Option<String> {
        let found = session.query_all(&self.profile.website_selector).await.ok()?;
        let element = found.first()?;
        let href = session.attribute(*element, "href").await.ok()??;
        resolve_http_link(base, &href)
    }

    /// First URL in the page text that is not the directory's own.
    fn website_in_text(&self, content: &str) -> Option<String> {
        URL_RE
            .find_iter(content)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ';']))
            .find(|url| !self.profile.is_platform_domain(url) && !self.profile.is_excluded(url))
            .map(str::to_string)
    }
}
