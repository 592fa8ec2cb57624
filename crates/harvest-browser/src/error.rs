use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("script evaluation failed: {0}")]
    ScriptError(String),

    #[error("session error: {0}")]
    SessionError(String),

    #[error("stale element handle: {0}")]
    StaleElement(usize),
}

impl BrowserError {
    /// Whether the failure means the host name does not resolve.
    ///
    /// Such URLs are abandoned without retrying.
    pub fn is_dns_failure(&self) -> bool {
        matches!(self, Self::DnsResolution(_))
    }

    /// Classify a navigation error text reported by the browser.
    pub fn from_navigation_text(url: &str, text: &str) -> Self {
        if text.contains("ERR_NAME_NOT_RESOLVED") || text.contains("ERR_NAME_RESOLUTION_FAILED") {
            Self::DnsResolution(format!("{url}: {text}"))
        } else if text.contains("ERR_TIMED_OUT") {
            Self::Timeout(format!("{url}: {text}"))
        } else {
            Self::NavigationError(format!("{url}: {text}"))
        }
    }
}
