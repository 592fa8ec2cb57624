//! Bounded-concurrency website extraction in checkpointed batches.

use crate::error::Result;
use crate::site::{SiteExtractor, SiteOutcome, SiteTarget};
use futures::future::join_all;
use harvest_store::DedupStore;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Websites per checkpoint; at most one batch is lost on a crash.
pub const BATCH_SIZE: usize = 10;

/// Totals for one pass over the website list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Batches completed (each followed by a flush)
    pub batches: usize,
    /// Websites actually visited (not skipped)
    pub visited: usize,
    /// New records added
    pub found: usize,
    /// Websites that could not be loaded
    pub abandoned: usize,
    /// Whether a stop request cut the pass short
    pub stopped: bool,
}

impl BatchReport {
    fn absorb(&mut self, outcome: SiteOutcome) {
        match outcome {
            SiteOutcome::Skipped => {}
            SiteOutcome::Found(added) => {
                self.visited += 1;
                self.found += added;
            }
            SiteOutcome::Empty => self.visited += 1,
            SiteOutcome::Abandoned => {
                self.visited += 1;
                self.abandoned += 1;
            }
        }
    }
}

/// Caps in-flight website extractions and flushes after every batch.
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Extract every target, `BATCH_SIZE` at a time.
    ///
    /// `should_stop` is checked before each batch. A flush failure ends the
    /// pass with an error.
    pub async fn run(
        &self,
        targets: &[SiteTarget],
        extractor: &SiteExtractor,
        store: &DedupStore,
        should_stop: impl Fn() -> bool,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let total = targets.len().div_ceil(BATCH_SIZE);

        for (index, batch) in targets.chunks(BATCH_SIZE).enumerate() {
            if should_stop() {
                tracing::info!("Stop requested, skipping {} remaining batches", total - index);
                report.stopped = true;
                break;
            }

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|target| self.extract_bounded(extractor, target)),
            )
            .await;
            for outcome in outcomes {
                report.absorb(outcome);
            }

            store.flush()?;
            report.batches += 1;
            tracing::info!(
                "Batch {}/{} done, {} records saved",
                index + 1,
                total,
                store.len()
            );
        }

        Ok(report)
    }

    async fn extract_bounded(
        &self,
        extractor: &SiteExtractor,
        target: &SiteTarget,
    ) -> SiteOutcome {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return SiteOutcome::Abandoned;
        };
        extractor.extract(target).await
    }
}
