use crate::error::Result;
use serde_json::Value;
use std::time::Duration;

/// Point in the page lifecycle a navigation waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitCondition {
    /// `DOMContentLoaded` fired (document is interactive)
    #[default]
    DomContentLoaded,
    /// The `load` event fired (document is complete)
    Load,
}

impl WaitCondition {
    /// Whether a `document.readyState` value satisfies this condition.
    pub fn is_satisfied_by(self, ready_state: &str) -> bool {
        match self {
            Self::DomContentLoaded => matches!(ready_state, "interactive" | "complete"),
            Self::Load => ready_state == "complete",
        }
    }
}

/// Opaque reference to an element returned by a query.
///
/// Valid until the next navigation of the session that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(usize);

impl ElementHandle {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn id(self) -> usize {
        self.0
    }
}

/// One isolated browsing session (own cookies, cache and user agent).
///
/// Sessions are used by a single logical owner at a time; the methods take
/// `&self` so a session can sit behind a `Box<dyn BrowserSession>`.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a URL, waiting for `wait` at most `timeout`.
    async fn navigate(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()>;

    /// URL of the current document (after redirects).
    async fn current_url(&self) -> Result<String>;

    /// All elements in the main document matching a CSS selector.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// Number of embedded frames in the current document.
    async fn frame_count(&self) -> Result<usize>;

    /// All elements matching a CSS selector inside embedded frame `frame`.
    async fn query_all_in_frame(&self, frame: usize, selector: &str)
        -> Result<Vec<ElementHandle>>;

    /// Value of an attribute on an element, if present.
    async fn attribute(&self, element: ElementHandle, name: &str) -> Result<Option<String>>;

    /// Visible text of an element.
    async fn text(&self, element: ElementHandle) -> Result<String>;

    /// Click an element.
    async fn click(&self, element: ElementHandle) -> Result<()>;

    /// Serialized DOM of the current document.
    async fn rendered_text(&self) -> Result<String>;

    /// Call a JavaScript function expression with JSON arguments.
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value>;

    /// Abort requests whose URL matches any of the glob patterns.
    async fn block_resource_types(&self, patterns: &[&str]) -> Result<()>;

    /// Release the session and everything it holds.
    async fn close(&self) -> Result<()>;
}

/// Factory for isolated browser sessions.
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open a new isolated session presenting `user_agent`.
    async fn new_isolated_session(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>>;
}
