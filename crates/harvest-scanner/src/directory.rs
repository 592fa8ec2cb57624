//! Site-specific knowledge about the listing directory.

use harvest_browser::domain::registrable_host;
use harvest_core::Query;
use url::Url;

/// Selectors, URL shapes and domain lists for one listing directory.
///
/// The defaults describe a maps-style directory. Everything the scanner
/// knows about the directory's markup lives here.
#[derive(Debug, Clone)]
pub struct DirectoryProfile {
    /// Search URL with a `{query}` placeholder
    pub search_url_template: String,
    /// Path fragment present in every listing URL
    pub listing_path_marker: String,
    /// Candidate selectors for result links, tried in order
    pub result_selectors: Vec<String>,
    /// Scrollable results panel
    pub results_panel_selector: String,
    /// Cookie/consent dismissal buttons, tried in order
    pub consent_selectors: Vec<String>,
    /// Anchor carrying a listing's outbound website
    pub website_selector: String,
    /// Host fragments that belong to the directory itself
    pub own_domains: Vec<String>,
    /// Asset and schema hosts that show up in listing markup
    pub platform_domains: Vec<String>,
    /// Host fragments never accepted as a business website
    pub excluded_domains: Vec<String>,
}

impl Default for DirectoryProfile {
    fn default() -> Self {
        Self {
            search_url_template: "https://www.google.com/maps/search/{query}".to_string(),
            listing_path_marker: "/maps/place/".to_string(),
            result_selectors: strings(&[
                "a[href*='/maps/place/']",
                "div.Nv2PK a",
                "a.hfpxzc",
                "div[role='article'] a",
            ]),
            results_panel_selector: "div[role='feed']".to_string(),
            consent_selectors: strings(&[
                "button[aria-label='Accept all']",
                "button[jsname='b3VHJd']",
                "button[aria-label*='Accept']",
                "button[aria-label*='agree']",
            ]),
            website_selector: "a[data-item-id='authority']".to_string(),
            own_domains: strings(&["google.", "gstatic.", "googleapis."]),
            platform_domains: strings(&["w3.org", "ggpht.com", "googleusercontent.com"]),
            excluded_domains: strings(&[
                "google",
                "facebook",
                "instagram",
                "youtube",
                "linkedin",
                "twitter",
                "gstatic",
                "googleapis",
                "schema.org",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl DirectoryProfile {
    /// Search view URL for `query`, form-encoded (`+` for spaces).
    pub fn search_url(&self, query: &Query) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.text().as_bytes()).collect();
        self.search_url_template.replace("{query}", &encoded)
    }

    /// Whether `url` points at a single listing.
    pub fn is_listing_url(&self, url: &str) -> bool {
        url.contains(&self.listing_path_marker)
    }

    /// Whether `url` is hosted by the directory itself.
    pub fn is_own_domain(&self, url: &str) -> bool {
        host_matches(url, &self.own_domains)
    }

    /// Whether `url` is hosted by the directory or one of its asset hosts.
    pub fn is_platform_domain(&self, url: &str) -> bool {
        self.is_own_domain(url) || host_matches(url, &self.platform_domains)
    }

    /// Whether `url` must not be treated as a business website.
    pub fn is_excluded(&self, url: &str) -> bool {
        host_matches(url, &self.excluded_domains)
    }

    /// Follow the directory's own redirect wrapper (`/url?q=...`), if any.
    pub fn unwrap_redirect(&self, url: &str) -> String {
        if !self.is_own_domain(url) {
            return url.to_string();
        }
        Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "q" || key == "url")
                    .map(|(_, target)| target.into_owned())
            })
            .filter(|target| target.starts_with("http://") || target.starts_with("https://"))
            .unwrap_or_else(|| url.to_string())
    }
}

/// Hosts without a host component never match.
fn host_matches(url: &str, fragments: &[String]) -> bool {
    registrable_host(url).is_some_and(|host| fragments.iter().any(|f| host.contains(f.as_str())))
}
