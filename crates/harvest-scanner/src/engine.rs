//! Run controller: the start/stop/clear/status surface over one pipeline.
//!
//! An [`Engine`] owns all run state. It is a cheap handle; clones share the
//! same store, state and log buffer, so one clone can drive a run while
//! another serves status requests.

use crate::directory::DirectoryProfile;
use crate::discoverer::ListingDiscoverer;
use crate::error::{Result, ScanError};
use crate::limiter::{BatchReport, ConcurrencyLimiter};
use crate::planner::QueryPlanner;
use crate::resolver::ListingResolver;
use crate::site::{SiteExtractor, SiteTarget};
use harvest_browser::{BrowserDriver, FingerprintConfig, BLOCKED_RESOURCES};
use harvest_core::{ContactRecord, EngineState, HarvestConfig, Query, RecentLogs};
use harvest_store::DedupStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Read-only snapshot for a status view.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub running: bool,
    pub record_count: usize,
    pub records: Vec<ContactRecord>,
    pub recent_logs: Vec<String>,
}

/// What one run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Queries planned
    pub queries: usize,
    /// Queries actually searched
    pub queries_run: usize,
    /// Listings discovered across all queries
    pub listings: usize,
    /// Distinct websites collected for extraction
    pub websites: usize,
    pub sites: BatchReport,
    /// Records in the store when the run ended
    pub records: usize,
    /// Whether the run ended early on a stop request
    pub stopped: bool,
}

struct Inner {
    config: Arc<HarvestConfig>,
    profile: Arc<DirectoryProfile>,
    store: Arc<DedupStore>,
    driver: Arc<dyn BrowserDriver>,
    state: Mutex<EngineState>,
    stop_signal: Notify,
    logs: RecentLogs,
}

/// The harvester's run controller.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// Create an engine for the default directory.
    pub fn new(
        config: HarvestConfig,
        store: Arc<DedupStore>,
        driver: Arc<dyn BrowserDriver>,
        logs: RecentLogs,
    ) -> Self {
        Self::with_directory(config, DirectoryProfile::default(), store, driver, logs)
    }

    /// Create an engine for a specific directory profile.
    pub fn with_directory(
        config: HarvestConfig,
        profile: DirectoryProfile,
        store: Arc<DedupStore>,
        driver: Arc<dyn BrowserDriver>,
        logs: RecentLogs,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: Arc::new(config),
                profile: Arc::new(profile),
                store,
                driver,
                state: Mutex::new(EngineState::Idle),
                stop_signal: Notify::new(),
                logs,
            }),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.inner.lock_state()
    }

    pub fn store(&self) -> &Arc<DedupStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.inner.config
    }

    /// Launch a run on the current tokio runtime.
    ///
    /// Returns `None` without doing anything unless the engine is idle and
    /// called from within a runtime.
    pub fn start(&self) -> Option<JoinHandle<Result<RunSummary>>> {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("Start ignored, no tokio runtime");
            return None;
        };

        {
            let mut state = self.inner.lock_state();
            if *state != EngineState::Idle {
                tracing::info!("Start ignored, engine is {}", *state);
                return None;
            }
            *state = EngineState::Running;
        }

        // Owned by the task future, so Idle is restored even if it never runs
        let guard = RunGuard(Arc::clone(&self.inner));
        let inner = Arc::clone(&self.inner);
        Some(runtime.spawn(async move {
            let _guard = guard;
            let result = inner.run().await;
            if let Err(e) = &result {
                tracing::error!("Run failed: {}", e);
            }
            result
        }))
    }

    /// Ask a running engine to stop at its next loop boundary.
    ///
    /// Returns whether a stop was requested.
    pub fn stop(&self) -> bool {
        let mut state = self.inner.lock_state();
        if *state != EngineState::Running {
            return false;
        }
        *state = EngineState::Stopping;
        drop(state);

        self.inner.stop_signal.notify_waiters();
        tracing::info!("Stop requested");
        true
    }

    /// Drop every record and visited URL and delete the persisted file.
    pub fn clear(&self) -> Result<()> {
        let state = self.inner.lock_state();
        if *state != EngineState::Idle {
            return Err(ScanError::EngineBusy(*state));
        }
        self.inner.store.clear()?;
        tracing::info!("Results cleared");
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.state();
        let records = self.inner.store.snapshot();
        EngineStatus {
            state,
            running: state != EngineState::Idle,
            record_count: records.len(),
            records,
            recent_logs: self.inner.logs.snapshot(),
        }
    }
}

/// Puts the engine back to Idle when the run task ends, however it ends.
struct RunGuard(Arc<Inner>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        *self.0.lock_state() = EngineState::Idle;
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stopping(&self) -> bool {
        *self.lock_state() == EngineState::Stopping
    }

    async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, "Starting run");

        let outcome = self.run_pipeline(run_id).await;
        let flushed = self.store.flush();

        let mut summary = outcome?;
        flushed?;
        summary.records = self.store.len();

        tracing::info!(
            %run_id,
            records = summary.records,
            stopped = summary.stopped,
            "Run finished"
        );
        Ok(summary)
    }

    async fn run_pipeline(&self, run_id: Uuid) -> Result<RunSummary> {
        self.config.require_terms()?;

        let planner = QueryPlanner::from_config(&self.config);
        let queries = planner.plan();
        tracing::info!("Running {} queries", queries.len());

        let discoverer = ListingDiscoverer::new(Arc::clone(&self.config), Arc::clone(&self.profile));
        let resolver = ListingResolver::new(
            Arc::clone(&self.config),
            Arc::clone(&self.profile),
            Arc::clone(&self.store),
        );

        let mut summary = RunSummary {
            run_id,
            queries: queries.len(),
            queries_run: 0,
            listings: 0,
            websites: 0,
            sites: BatchReport::default(),
            records: 0,
            stopped: false,
        };
        let mut targets: Vec<SiteTarget> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (index, query) in queries.iter().enumerate() {
            if self.is_stopping() {
                summary.stopped = true;
                break;
            }

            tracing::info!("Query {}/{}: {}", index + 1, queries.len(), query);
            summary.queries_run += 1;
            summary.listings += self
                .harvest_query(&discoverer, &resolver, query, &mut targets, &mut seen)
                .await;

            if index + 1 < queries.len() {
                // Registered before the state check so a stop in between still wakes us
                let stop = self.stop_signal.notified();
                tokio::pin!(stop);
                stop.as_mut().enable();

                if !self.is_stopping() {
                    let pause = planner.next_pause();
                    tracing::debug!("Pausing {:?} before next query", pause);
                    tokio::select! {
                        () = tokio::time::sleep(pause) => {}
                        () = stop => {}
                    }
                }
            }
        }

        summary.websites = targets.len();
        if self.is_stopping() {
            summary.stopped = true;
            return Ok(summary);
        }

        tracing::info!("Scanning {} websites", targets.len());
        let extractor = SiteExtractor::new(
            Arc::clone(&self.config),
            Arc::clone(&self.driver),
            Arc::clone(&self.store),
        );
        let limiter = ConcurrencyLimiter::new(self.config.max_concurrent_pages);
        summary.sites = limiter
            .run(&targets, &extractor, &self.store, || self.is_stopping())
            .await?;
        summary.stopped |= summary.sites.stopped;

        Ok(summary)
    }

    /// Discover and resolve one query in a single session.
    ///
    /// Returns the number of listings discovered. Browser failures are
    /// logged and end the query early.
    async fn harvest_query(
        &self,
        discoverer: &ListingDiscoverer,
        resolver: &ListingResolver,
        query: &Query,
        targets: &mut Vec<SiteTarget>,
        seen: &mut HashSet<String>,
    ) -> usize {
        let fingerprint = FingerprintConfig::randomized();
        let session = match self.driver.new_isolated_session(&fingerprint.user_agent).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(query = %query, "Failed to open browser session: {}", e);
                return 0;
            }
        };
        if let Err(e) = session.block_resource_types(BLOCKED_RESOURCES).await {
            tracing::debug!("Resource blocking unavailable: {}", e);
        }

        let listings = match discoverer
            .discover(session.as_ref(), query, self.config.max_results_per_query)
            .await
        {
            Ok(listings) => listings,
            Err(e) => {
                tracing::warn!(query = %query, "Directory search failed: {}", e);
                Vec::new()
            }
        };

        for listing in &listings {
            if self.is_stopping() {
                break;
            }
            if let Some(website) = resolver.resolve(session.as_ref(), listing).await {
                if seen.insert(website.clone()) {
                    targets.push(SiteTarget::new(website, Some(listing.clone())));
                }
            }
        }

        if let Err(e) = session.close().await {
            tracing::debug!("Failed to close session: {}", e);
        }
        listings.len()
    }
}
