use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::session::{BrowserDriver, BrowserSession, ElementHandle, WaitCondition};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Chromium flags applied to every launch.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
    "--disable-notifications",
    "--disable-popup-blocking",
];

/// Poll interval while waiting for `document.readyState`.
const READY_POLL: Duration = Duration::from_millis(100);

/// Browser automation engine backed by a local Chromium.
pub struct BrowserEngine {
    browser: Arc<Mutex<Browser>>,
    fingerprint: FingerprintConfig,
    handler: JoinHandle<()>,
}

impl BrowserEngine {
    /// Launch Chromium with a randomized fingerprint.
    pub async fn launch(headless: bool) -> Result<Self> {
        Self::with_fingerprint(headless, FingerprintConfig::randomized()).await
    }

    /// Launch Chromium with a specific fingerprint.
    pub async fn with_fingerprint(headless: bool, fingerprint: FingerprintConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height);

        // with_head means NOT headless
        if !headless {
            builder = builder.with_head();
        }
        for arg in launch_args(&fingerprint) {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!(headless, "Chromium launched");

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            fingerprint,
            handler,
        })
    }

    /// User agent chosen at launch.
    pub fn default_user_agent(&self) -> &str {
        &self.fingerprint.user_agent
    }

    /// Close the browser process.
    pub async fn shutdown(self) -> Result<()> {
        let result = self
            .browser
            .lock()
            .await
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::ChromiumError(e.to_string()));
        self.handler.abort();
        result
    }
}

#[async_trait::async_trait]
impl BrowserDriver for BrowserEngine {
    async fn new_isolated_session(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>> {
        let (page, context_id) = {
            let mut browser = self.browser.lock().await;
            let context_id = browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await
                .map_err(|e| BrowserError::SessionError(e.to_string()))?;

            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context_id.clone())
                .build()
                .map_err(BrowserError::SessionError)?;

            let page = browser
                .new_page(target)
                .await
                .map_err(|e| BrowserError::SessionError(e.to_string()))?;
            (page, context_id)
        };

        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(|e| BrowserError::SessionError(e.to_string()))?;

        Ok(Box::new(ChromiumSession {
            page,
            context_id,
            browser: Arc::clone(&self.browser),
            elements: std::sync::Mutex::new(Vec::new()),
        }))
    }
}

/// An element resolved by a query, kept until the next navigation.
enum Tracked {
    Dom(Element),
    /// Same-origin frame element, re-resolved through script on each use
    Framed {
        frame: usize,
        selector: String,
        index: usize,
    },
}

struct ChromiumSession {
    page: Page,
    context_id: BrowserContextId,
    browser: Arc<Mutex<Browser>>,
    elements: std::sync::Mutex<Vec<Arc<Tracked>>>,
}

impl ChromiumSession {
    fn track(&self, items: impl IntoIterator<Item = Tracked>) -> Vec<ElementHandle> {
        let mut elements = self.elements.lock().unwrap_or_else(PoisonError::into_inner);
        items
            .into_iter()
            .map(|item| {
                elements.push(Arc::new(item));
                ElementHandle::new(elements.len() - 1)
            })
            .collect()
    }

    fn resolve(&self, handle: ElementHandle) -> Result<Arc<Tracked>> {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle.id())
            .cloned()
            .ok_or(BrowserError::StaleElement(handle.id()))
    }

    async fn eval_expression(&self, expression: String) -> Result<Value> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Run `body` against a frame element bound to `el`.
    async fn eval_in_frame(
        &self,
        frame: usize,
        selector: &str,
        index: usize,
        body: &str,
    ) -> Result<Value> {
        let script = format!(
            "(() => {{ const f = window.frames[{frame}]; \
             const el = f && f.document.querySelectorAll({sel})[{index}]; \
             if (!el) return null; {body} }})()",
            sel = js_string(selector),
        );
        self.eval_expression(script).await
    }

    async fn wait_until_ready(&self, wait: WaitCondition) -> Result<()> {
        loop {
            let state = self
                .eval_expression("document.readyState".to_string())
                .await
                .unwrap_or(Value::Null);
            if state.as_str().is_some_and(|s| wait.is_satisfied_by(s)) {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

#[async_trait::async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()> {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| BrowserError::NavigationError(format!("Invalid URL {url}: {e}")))?;

        let navigation = async {
            let response = self
                .page
                .execute(params)
                .await
                .map_err(|e| BrowserError::from_navigation_text(url, &e.to_string()))?;

            if let Some(text) = response.result.error_text.as_deref() {
                return Err(BrowserError::from_navigation_text(url, text));
            }

            self.wait_until_ready(wait).await
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| BrowserError::Timeout(format!("{url} after {timeout:?}")))?
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?
            .ok_or_else(|| BrowserError::NavigationError("page has no URL".to_string()))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        // No match is an empty list; errors mean the page itself is gone
        let found = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| BrowserError::ChromiumError(format!("query {selector}: {e}")))?;
        Ok(self.track(found.into_iter().map(Tracked::Dom)))
    }

    async fn frame_count(&self) -> Result<usize> {
        let count = self
            .eval_expression("window.frames.length".to_string())
            .await?;
        Ok(count
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0))
    }

    async fn query_all_in_frame(
        &self,
        frame: usize,
        selector: &str,
    ) -> Result<Vec<ElementHandle>> {
        let script = format!(
            "(() => {{ const f = window.frames[{frame}]; \
             return f ? f.document.querySelectorAll({sel}).length : 0; }})()",
            sel = js_string(selector),
        );
        let count = self.eval_expression(script).await?.as_u64().unwrap_or(0);
        let count = usize::try_from(count).unwrap_or(0);

        Ok(self.track((0..count).map(|index| Tracked::Framed {
            frame,
            selector: selector.to_string(),
            index,
        })))
    }

    async fn attribute(&self, element: ElementHandle, name: &str) -> Result<Option<String>> {
        match self.resolve(element)?.as_ref() {
            Tracked::Dom(el) => el
                .attribute(name)
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string())),
            Tracked::Framed {
                frame,
                selector,
                index,
            } => {
                let body = format!("return el.getAttribute({});", js_string(name));
                let value = self.eval_in_frame(*frame, selector, *index, &body).await?;
                Ok(value.as_str().map(str::to_string))
            }
        }
    }

    async fn text(&self, element: ElementHandle) -> Result<String> {
        match self.resolve(element)?.as_ref() {
            Tracked::Dom(el) => Ok(el
                .inner_text()
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))?
                .unwrap_or_default()),
            Tracked::Framed {
                frame,
                selector,
                index,
            } => {
                let value = self
                    .eval_in_frame(*frame, selector, *index, "return el.innerText;")
                    .await?;
                Ok(value.as_str().unwrap_or_default().to_string())
            }
        }
    }

    async fn click(&self, element: ElementHandle) -> Result<()> {
        match self.resolve(element)?.as_ref() {
            Tracked::Dom(el) => el
                .click()
                .await
                .map(|_| ())
                .map_err(|e| BrowserError::ChromiumError(e.to_string())),
            Tracked::Framed {
                frame,
                selector,
                index,
            } => self
                .eval_in_frame(*frame, selector, *index, "el.click(); return true;")
                .await
                .map(|_| ()),
        }
    }

    async fn rendered_text(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        let args = Value::Array(args).to_string();
        self.eval_expression(format!("({script})(...{args})")).await
    }

    async fn block_resource_types(&self, patterns: &[&str]) -> Result<()> {
        self.page
            .execute(EnableParams::default())
            .await
            .map_err(|e| BrowserError::SessionError(e.to_string()))?;
        self.page
            .execute(SetBlockedUrLsParams::new(
                patterns.iter().map(|p| (*p).to_string()).collect::<Vec<_>>(),
            ))
            .await
            .map_err(|e| BrowserError::SessionError(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let closed = self
            .page
            .clone()
            .close()
            .await
            .map_err(|e| BrowserError::SessionError(e.to_string()));

        let disposed = self
            .browser
            .lock()
            .await
            .dispose_browser_context(self.context_id.clone())
            .await
            .map_err(|e| BrowserError::SessionError(e.to_string()));

        closed.and(disposed)
    }
}

/// Hardening flags plus the launch fingerprint's user agent.
///
/// Sessions override the agent per context; this one covers the default
/// context and any target opened outside a session.
fn launch_args(fingerprint: &FingerprintConfig) -> Vec<String> {
    LAUNCH_ARGS
        .iter()
        .map(|arg| (*arg).to_string())
        .chain(std::iter::once(format!(
            "--user-agent={}",
            fingerprint.user_agent
        )))
        .collect()
}

/// Encode a Rust string as a JavaScript string literal.
fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}
