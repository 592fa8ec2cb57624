//! Website extraction with a contact-page fallback and retries.

use crate::patterns::{extract_emails, extract_phone, PhoneRules};
use harvest_browser::domain::resolve_http_link;
use harvest_browser::{
    BrowserDriver, BrowserSession, FingerprintConfig, WaitCondition, BLOCKED_RESOURCES,
};
use harvest_core::config::seconds;
use harvest_core::HarvestConfig;
use harvest_store::DedupStore;
use std::sync::Arc;

/// Extra attempts after the first failed visit.
const MAX_RETRIES: u32 = 2;

/// Anchor text that marks a contact-style page, in priority order.
pub const CONTACT_KEYWORDS: &[&str] = &[
    "contact",
    "kontakt",
    "contacto",
    "contatto",
    "contactez",
    "impressum",
    "about",
];

/// A website to visit and the listing that led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteTarget {
    pub website: String,
    pub listing: Option<String>,
}

impl SiteTarget {
    pub fn new(website: impl Into<String>, listing: Option<String>) -> Self {
        Self {
            website: website.into(),
            listing,
        }
    }
}

/// What a single website visit produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteOutcome {
    /// Already visited in this or an earlier run
    Skipped,
    /// Emails found; the count is how many were new to the store
    Found(usize),
    /// Loaded fine but nothing was found, fallback included
    Empty,
    /// Could not be loaded
    Abandoned,
}

/// Visits websites and records the contacts they show.
pub struct SiteExtractor {
    config: Arc<HarvestConfig>,
    driver: Arc<dyn BrowserDriver>,
    store: Arc<DedupStore>,
    rules: PhoneRules,
}

impl SiteExtractor {
    pub fn new(
        config: Arc<HarvestConfig>,
        driver: Arc<dyn BrowserDriver>,
        store: Arc<DedupStore>,
    ) -> Self {
        let rules = PhoneRules::from_config(&config);
        Self {
            config,
            driver,
            store,
            rules,
        }
    }

    /// Visit `target`, claiming it first so no other worker repeats it.
    pub async fn extract(&self, target: &SiteTarget) -> SiteOutcome {
        let url = target.website.as_str();
        if !self.store.mark_visited(url) {
            tracing::debug!(url, "Website already visited");
            return SiteOutcome::Skipped;
        }

        for attempt in 0..=MAX_RETRIES {
            match self.visit(target).await {
                Ok(outcome) => return outcome,
                Err(e) if e.is_dns_failure() => {
                    tracing::warn!(url, "Host does not resolve, skipping: {}", e);
                    return SiteOutcome::Abandoned;
                }
                Err(e) if attempt < MAX_RETRIES => {
                    let pause = seconds(self.config.retry_pause_time);
                    tracing::warn!(
                        url,
                        "Visit failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        MAX_RETRIES + 1,
                        pause,
                        e
                    );
                    tokio::time::sleep(pause).await;
                }
                Err(e) => {
                    tracing::warn!(url, "Giving up after {} attempts: {}", attempt + 1, e);
                }
            }
        }
        SiteOutcome::Abandoned
    }

    /// One attempt in a fresh session, which is always closed afterwards.
    async fn visit(&self, target: &SiteTarget) -> harvest_browser::Result<SiteOutcome> {
        let fingerprint = FingerprintConfig::randomized();
        let session = self
            .driver
            .new_isolated_session(&fingerprint.user_agent)
            .await?;

        let result = self.visit_in(session.as_ref(), target).await;

        if let Err(e) = session.close().await {
            tracing::debug!(url = %target.website, "Failed to close session: {}", e);
        }
        result
    }

    async fn visit_in(
        &self,
        session: &dyn BrowserSession,
        target: &SiteTarget,
    ) -> harvest_browser::Result<SiteOutcome> {
        let url = target.website.as_str();
        session.block_resource_types(BLOCKED_RESOURCES).await?;

        tracing::info!(url, "Visiting website");
        session
            .navigate(
                url,
                WaitCondition::DomContentLoaded,
                self.config.navigation_timeout(),
            )
            .await?;
        tokio::time::sleep(seconds(self.config.page_settle_time)).await;

        let content = session.rendered_text().await?;
        let emails = extract_emails(&content);
        if !emails.is_empty() {
            let phone = extract_phone(&content, &self.rules);
            let added = self.store.record_with_listing(
                url,
                target.listing.as_deref(),
                &emails,
                phone.as_deref(),
            );
            return Ok(SiteOutcome::Found(added));
        }

        match self.try_contact_page(session, target).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::info!(url, "Contact page fallback missed: {}", e);
                Ok(SiteOutcome::Empty)
            }
        }
    }

    /// Follow the first contact-style link and extract emails there.
    async fn try_contact_page(
        &self,
        session: &dyn BrowserSession,
        target: &SiteTarget,
    ) -> harvest_browser::Result<SiteOutcome> {
        let base = session
            .current_url()
            .await
            .unwrap_or_else(|_| target.website.clone());

        let mut anchors = Vec::new();
        for anchor in session.query_all("a").await? {
            let Ok(Some(href)) = session.attribute(anchor, "href").await else {
                continue;
            };
            let text = session.text(anchor).await.unwrap_or_default().to_lowercase();
            anchors.push((text, href));
        }

        let Some(link) = self.pick_contact_link(&base, &anchors) else {
            tracing::debug!(url = %target.website, "No contact page link");
            return Ok(SiteOutcome::Empty);
        };

        tracing::info!(url = %link, "Trying contact page");
        session
            .navigate(
                &link,
                WaitCondition::DomContentLoaded,
                self.config.fallback_timeout(),
            )
            .await?;

        let emails = extract_emails(&session.rendered_text().await?);
        if emails.is_empty() {
            return Ok(SiteOutcome::Empty);
        }
        let added = self
            .store
            .record_with_listing(&link, target.listing.as_deref(), &emails, None);
        Ok(SiteOutcome::Found(added))
    }

    /// Keyword priority wins over document order. The chosen link is claimed.
    fn pick_contact_link(&self, base: &str, anchors: &[(String, String)]) -> Option<String> {
        for keyword in CONTACT_KEYWORDS {
            for (text, href) in anchors {
                if !text.contains(keyword) {
                    continue;
                }
                let Some(link) = resolve_http_link(base, href) else {
                    continue;
                };
                if self.store.mark_visited(&link) {
                    return Some(link);
                }
            }
        }
        None
    }
}
