//! In-memory browser for pipeline tests.
//!
//! Pages are fixture HTML keyed by URL; CSS queries run through `scraper`.
//! The fake counts navigations and tracks how many sessions are open at once.

#![allow(dead_code)]

use async_trait::async_trait;
use harvest_browser::{
    BrowserDriver, BrowserError, BrowserSession, ElementHandle, Result, WaitCondition,
};
use harvest_core::{HarvestConfig, Query};
use harvest_scanner::DirectoryProfile;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a URL behaves when navigated to.
#[derive(Debug, Clone)]
pub enum FakePage {
    Html(String),
    /// Each scroll of the results panel reveals the next stage
    Stages(Vec<String>),
    /// The navigation ends up on another URL (e.g. a single listing)
    Redirect(String),
    Dns,
    Fail,
}

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct FakeWeb {
    pages: Mutex<HashMap<String, FakePage>>,
    hooks: Mutex<Vec<(String, Hook)>>,
    navigations: Mutex<Vec<String>>,
    clicks: Mutex<Vec<String>>,
    open_sessions: AtomicUsize,
    peak_sessions: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeWeb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delay: Mutex::new(Duration::from_millis(20)),
            ..Self::default()
        })
    }

    pub fn page(&self, url: &str, page: FakePage) {
        self.pages.lock().unwrap().insert(normalize(url), page);
    }

    pub fn html(&self, url: &str, html: impl Into<String>) {
        self.page(url, FakePage::Html(html.into()));
    }

    /// Run `hook` whenever `url` is navigated to, before the navigation returns.
    pub fn on_navigate(&self, url: &str, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .push((normalize(url), Box::new(hook)));
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn navigation_count(&self, url: &str) -> usize {
        let url = normalize(url);
        self.navigations().iter().filter(|u| **u == url).count()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn peak_sessions(&self) -> usize {
        self.peak_sessions.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn driver(self: &Arc<Self>) -> Arc<dyn BrowserDriver> {
        Arc::new(FakeDriver {
            web: Arc::clone(self),
        })
    }
}

pub fn normalize(url: &str) -> String {
    url::Url::parse(url).map_or_else(|_| url.to_string(), |u| u.to_string())
}

struct FakeDriver {
    web: Arc<FakeWeb>,
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn new_isolated_session(&self, _user_agent: &str) -> Result<Box<dyn BrowserSession>> {
        let open = self.web.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.web.peak_sessions.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            web: Arc::clone(&self.web),
            current: Mutex::new(None),
            elements: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
        }))
    }
}

struct Loaded {
    url: String,
    stages: Vec<String>,
    stage: usize,
}

impl Loaded {
    fn html(&self) -> &str {
        &self.stages[self.stage.min(self.stages.len() - 1)]
    }
}

struct FakeSession {
    web: Arc<FakeWeb>,
    current: Mutex<Option<Loaded>>,
    /// (selector, index) per handle
    elements: Mutex<Vec<(String, usize)>>,
    closed: Mutex<bool>,
}

impl FakeSession {
    fn with_element<T>(&self, handle: ElementHandle, f: impl FnOnce(scraper::ElementRef<'_>) -> T) -> Result<T> {
        let (selector, index) = self
            .elements
            .lock()
            .unwrap()
            .get(handle.id())
            .cloned()
            .ok_or(BrowserError::StaleElement(handle.id()))?;

        let current = self.current.lock().unwrap();
        let loaded = current
            .as_ref()
            .ok_or_else(|| BrowserError::SessionError("no page".to_string()))?;
        let document = Html::parse_document(loaded.html());
        let selector = Selector::parse(&selector)
            .map_err(|e| BrowserError::ScriptError(format!("bad selector: {e:?}")))?;
        let element = document
            .select(&selector)
            .nth(index)
            .ok_or(BrowserError::StaleElement(handle.id()))?;
        Ok(f(element))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str, _wait: WaitCondition, _timeout: Duration) -> Result<()> {
        let url = normalize(url);
        self.elements.lock().unwrap().clear();
        self.web.navigations.lock().unwrap().push(url.clone());

        let delay = *self.web.delay.lock().unwrap();
        tokio::time::sleep(delay).await;

        for (target, hook) in self.web.hooks.lock().unwrap().iter() {
            if *target == url {
                hook();
            }
        }

        let page = self.web.pages.lock().unwrap().get(&url).cloned();
        let (final_url, stages) = match page {
            Some(FakePage::Html(html)) => (url, vec![html]),
            Some(FakePage::Stages(stages)) => (url, stages),
            Some(FakePage::Redirect(to)) => {
                let to = normalize(&to);
                match self.web.pages.lock().unwrap().get(&to).cloned() {
                    Some(FakePage::Html(html)) => (to, vec![html]),
                    _ => return Err(BrowserError::NavigationError(format!("{to}: broken redirect"))),
                }
            }
            Some(FakePage::Dns) => {
                return Err(BrowserError::from_navigation_text(
                    &url,
                    "net::ERR_NAME_NOT_RESOLVED",
                ))
            }
            Some(FakePage::Fail) => {
                return Err(BrowserError::from_navigation_text(&url, "net::ERR_CONNECTION_REFUSED"))
            }
            None => return Err(BrowserError::NavigationError(format!("{url}: 404"))),
        };

        *self.current.lock().unwrap() = Some(Loaded {
            url: final_url,
            stages,
            stage: 0,
        });
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|l| l.url.clone())
            .ok_or_else(|| BrowserError::SessionError("no page".to_string()))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let count = {
            let current = self.current.lock().unwrap();
            let Some(loaded) = current.as_ref() else {
                return Ok(Vec::new());
            };
            let parsed = Selector::parse(selector)
                .map_err(|e| BrowserError::ScriptError(format!("bad selector: {e:?}")))?;
            Html::parse_document(loaded.html()).select(&parsed).count()
        };

        let mut elements = self.elements.lock().unwrap();
        Ok((0..count)
            .map(|index| {
                elements.push((selector.to_string(), index));
                ElementHandle::new(elements.len() - 1)
            })
            .collect())
    }

    async fn frame_count(&self) -> Result<usize> {
        Ok(0)
    }

    async fn query_all_in_frame(&self, _frame: usize, _selector: &str) -> Result<Vec<ElementHandle>> {
        Ok(Vec::new())
    }

    async fn attribute(&self, element: ElementHandle, name: &str) -> Result<Option<String>> {
        self.with_element(element, |el| el.value().attr(name).map(str::to_string))
    }

    async fn text(&self, element: ElementHandle) -> Result<String> {
        self.with_element(element, |el| el.text().collect::<String>())
    }

    async fn click(&self, element: ElementHandle) -> Result<()> {
        let label = self.with_element(element, |el| el.html())?;
        self.web.clicks.lock().unwrap().push(label);
        Ok(())
    }

    async fn rendered_text(&self) -> Result<String> {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|l| l.html().to_string())
            .ok_or_else(|| BrowserError::SessionError("no page".to_string()))
    }

    async fn evaluate(&self, _script: &str, _args: Vec<Value>) -> Result<Value> {
        // Any script is treated as a scroll of the results panel
        if let Some(loaded) = self.current.lock().unwrap().as_mut() {
            loaded.stage += 1;
        }
        Ok(Value::Bool(true))
    }

    async fn block_resource_types(&self, _patterns: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut closed = self.closed.lock().unwrap();
        if !*closed {
            *closed = true;
            self.web.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Config with every pause set to zero.
pub fn fast_config(term: &str, locations: &[&str], output: &std::path::Path) -> HarvestConfig {
    HarvestConfig {
        search_term: term.to_string(),
        locations: locations.iter().map(|l| (*l).to_string()).collect(),
        output_filename: output.to_path_buf(),
        max_scroll_attempts: 10,
        scroll_pause_time: 0.0,
        results_settle_time: 0.0,
        page_settle_time: 0.0,
        retry_pause_time: 0.0,
        delay_between_queries_min: 0.0,
        delay_between_queries_max: 0.0,
        ..HarvestConfig::default()
    }
}

pub fn search_url(term: &str, location: &str) -> String {
    DirectoryProfile::default().search_url(&Query::new(term, location))
}

pub fn listing_url(name: &str) -> String {
    format!("https://www.google.com/maps/place/{name}/@39.78,-89.65,17z")
}

/// Results view with one anchor per listing.
pub fn results_page(listings: &[String]) -> String {
    let anchors: String = listings
        .iter()
        .map(|l| format!(r#"<div class="Nv2PK"><a class="hfpxzc" href="{l}">{l}</a></div>"#))
        .collect();
    format!(r#"<html><body><div role="feed">{anchors}</div></body></html>"#)
}

/// Listing detail view, optionally linking a website.
pub fn listing_page(website: Option<&str>, extra: &str) -> String {
    let link = website
        .map(|w| format!(r#"<a data-item-id="authority" href="{w}">Website</a>"#))
        .unwrap_or_default();
    format!("<html><body><h1>Listing</h1>{link}{extra}</body></html>")
}

pub fn site_page(body: &str) -> String {
    format!("<html><head><title>Site</title></head><body>{body}</body></html>")
}
