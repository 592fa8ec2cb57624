use crate::error::{BrowserError, Result};
use url::Url;

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(|s| s.to_lowercase())
}

/// Host of `url` without a leading `www.`, lowercased.
pub fn registrable_host(url: &str) -> Option<String> {
    let host = extract_domain(url).ok()?;
    let host = host.strip_prefix("www.").unwrap_or(&host);
    (!host.is_empty()).then(|| host.to_string())
}

/// Drop the query string and fragment from a URL.
pub fn strip_query_and_fragment(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}

/// Resolve `href` against `base` and keep it only if it is http(s).
pub fn resolve_http_link(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(href).ok()?,
        Err(_) => return None,
    };

    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}
