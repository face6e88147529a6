//! Run-level control flow.
//!
//! A run iterates the configured search terms; each term navigates to its
//! search URL, expands the feed, collects item references, and pushes every
//! item through extraction and reconciliation. Failures are contained at the
//! smallest scope that can absorb them: a field miss stores null, an item
//! failure skips the item, a scan failure skips the term, and only `Fatal`
//! stops the run. A summary is produced no matter how the run ends.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::ScrapeConfig;
use crate::engine::collector::ItemCollector;
use crate::engine::errors::{ScrapeError, ScrapeResult};
use crate::engine::executor::ActionExecutor;
use crate::engine::scanner::{PaginationScanner, ScanConfig, feed_present_script};
use crate::engine::types::{
    CONSENT_BUTTON_SELECTOR, ITEM_CARD_SELECTOR, ItemReference, RunSummary, SEARCH_URL_BASE,
    StopReason,
};
use crate::extract::FieldExtractor;
use crate::session::handle::{ElementRef, NavigationSession};
use crate::store::RecordStore;
use crate::store::reconciler::{ReconcileOutcome, Reconciler};

/// Interval between feed presence probes after navigating to a search
const FEED_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One configured crawl-and-reconcile run
pub struct ScrapeRun<S, R, X, C>
where
    S: NavigationSession,
    R: RecordStore,
    X: FieldExtractor<S> + 'static,
    C: Clock,
{
    executor: Arc<ActionExecutor<S, C>>,
    scanner: PaginationScanner<S, C>,
    extractor: Arc<X>,
    reconciler: Reconciler<R>,
    clock: Arc<C>,
    config: ScrapeConfig,
}

impl<S, R, X, C> ScrapeRun<S, R, X, C>
where
    S: NavigationSession,
    R: RecordStore,
    // The extractor handle moves into boxed attempt futures, so it must own
    // its lifetime
    X: FieldExtractor<S> + 'static,
    C: Clock,
{
    pub fn new(
        executor: Arc<ActionExecutor<S, C>>,
        scanner: PaginationScanner<S, C>,
        extractor: X,
        reconciler: Reconciler<R>,
        clock: Arc<C>,
        config: ScrapeConfig,
    ) -> Self {
        Self {
            executor,
            scanner,
            extractor: Arc::new(extractor),
            reconciler,
            clock,
            config,
        }
    }

    /// Process every configured search term sequentially.
    ///
    /// Term failures are logged and skipped; a `Fatal` error stops the run
    /// and is recorded in the summary.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        for term in self.config.search_terms() {
            summary.terms_attempted += 1;
            info!("Processing search term '{}'", term);

            match self.process_term(term).await {
                Ok(term_summary) => {
                    summary.absorb(&term_summary);
                    summary.terms_completed += 1;
                }
                Err(ScrapeError::Fatal(msg)) => {
                    error!("Run stopped on fatal error: {}", msg);
                    summary.fatal = Some(msg);
                    break;
                }
                Err(e) => {
                    warn!("Search term '{}' failed, moving on: {}", term, e);
                }
            }
        }

        info!(
            "Run finished: {}/{} terms, {} items ({} inserted, {} updated, {} failed)",
            summary.terms_completed,
            summary.terms_attempted,
            summary.items_processed,
            summary.inserted,
            summary.updated,
            summary.failed
        );
        summary
    }

    async fn process_term(&self, term: &str) -> ScrapeResult<RunSummary> {
        let mut summary = RunSummary::default();

        let query = format!("{} {}", term, self.config.location()).replace(' ', "+");
        let url = format!("{SEARCH_URL_BASE}{query}/?hl=en&gl=us");

        self.executor
            .execute(
                move |s| {
                    let url = url.clone();
                    Box::pin(async move { s.navigate(&url).await })
                },
                self.config.max_retries(),
            )
            .await?;

        self.bypass_consent().await;
        self.wait_for_feed().await?;
        self.clock.sleep(self.config.settle_delay()).await;

        let scan_config = ScanConfig {
            max_stagnant_iterations: self.config.max_stagnant_iterations(),
            max_iterations: self.config.max_scroll_iterations(),
            max_results: self.config.max_results(),
            settle_delay: self.config.settle_delay(),
            max_retries: self.config.max_retries(),
        };
        let outcome = self.scanner.expand_until_stable(&scan_config).await?;
        if outcome.reason == StopReason::ScannerError {
            warn!("Scan aborted for term '{}', skipping it", term);
            return Ok(summary);
        }
        info!(
            "Feed expanded to {} items in {} iterations ({:?})",
            outcome.item_count, outcome.iterations, outcome.reason
        );

        let mut collector = ItemCollector::new();
        let references = self.collect_references(&mut collector).await?;

        for (index, item) in references.iter().enumerate() {
            if let Some(limit) = self.config.max_results()
                && index >= limit
            {
                break;
            }

            summary.items_processed += 1;
            match self.process_item(item).await {
                Ok(ReconcileOutcome::Inserted(_)) => summary.inserted += 1,
                Ok(ReconcileOutcome::Updated(_)) => summary.updated += 1,
                Err(e @ ScrapeError::Fatal(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        "Item '{}' failed, skipping: {}",
                        item.preview_name.as_deref().unwrap_or(&item.identity_key),
                        e
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Read the visible cards and dedup them into item references
    async fn collect_references(
        &self,
        collector: &mut ItemCollector,
    ) -> ScrapeResult<Vec<ItemReference>> {
        let elements = self
            .executor
            .execute(
                |s| Box::pin(async move { s.locate_all(ITEM_CARD_SELECTOR).await }),
                self.config.max_retries(),
            )
            .await?;

        Ok(collector.collect(&elements).await)
    }

    async fn process_item(&self, item: &ItemReference) -> ScrapeResult<ReconcileOutcome> {
        let product_type = self.config.product_type();

        // The attempt future may outlive this borrow of self, so it owns an
        // extractor handle and its own copy of the reference
        let extractor = Arc::clone(&self.extractor);
        let record = self
            .executor
            .execute(
                move |s| {
                    let extractor = Arc::clone(&extractor);
                    let item = item.clone();
                    Box::pin(async move { extractor.extract(s, &item, product_type).await })
                },
                self.config.max_retries(),
            )
            .await?;

        self.reconciler.reconcile(product_type, &record).await
    }

    /// Click through the consent interstitial if one is shown, best-effort
    async fn bypass_consent(&self) {
        let result = self
            .executor
            .execute(
                |s| {
                    Box::pin(async move {
                        let buttons = s.locate_all(CONSENT_BUTTON_SELECTOR).await?;
                        if let Some(button) = buttons.first() {
                            button.click().await?;
                        }
                        Ok(buttons.len())
                    })
                },
                1,
            )
            .await;

        match result {
            Ok(clicked) if clicked > 0 => {
                info!("Dismissed consent interstitial");
                self.clock.sleep(self.config.settle_delay()).await;
            }
            Ok(_) => {}
            Err(e) => {
                // No interstitial on most sessions; nothing to recover
                tracing::debug!("Consent bypass skipped: {}", e);
            }
        }
    }

    /// Poll until the result feed exists or the wait budget runs out
    async fn wait_for_feed(&self) -> ScrapeResult<()> {
        let deadline = self.clock.now() + self.config.feed_wait_timeout();

        loop {
            let probe = feed_present_script();
            let present = self
                .executor
                .execute(
                    move |s| {
                        let js = probe.clone();
                        Box::pin(async move { s.run_script(&js).await })
                    },
                    self.config.max_retries(),
                )
                .await?;

            if present.as_bool() == Some(true) {
                return Ok(());
            }
            if self.clock.now() >= deadline {
                return Err(ScrapeError::Transient(
                    "result feed did not appear".to_string(),
                ));
            }
            self.clock.sleep(FEED_POLL_INTERVAL).await;
        }
    }
}
