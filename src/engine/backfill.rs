//! Column backfill over already-stored records.
//!
//! Rows whose chosen column is NULL or empty are revisited through their
//! stored `card_href` and just that column is re-extracted and written back.
//! Useful after adding a new column or when a selector started working again.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::engine::errors::{ScrapeError, ScrapeResult};
use crate::engine::executor::ActionExecutor;
use crate::engine::types::{ProductType, RunSummary};
use crate::extract::FieldExtractor;
use crate::session::handle::NavigationSession;
use crate::store::{BackfillColumn, RecordStore};

pub struct BackfillRun<S, R, X, C>
where
    S: NavigationSession,
    R: RecordStore,
    X: FieldExtractor<S> + 'static,
    C: Clock,
{
    executor: Arc<ActionExecutor<S, C>>,
    extractor: Arc<X>,
    store: R,
    clock: Arc<C>,
    max_retries: u32,
    settle_delay: Duration,
}

impl<S, R, X, C> BackfillRun<S, R, X, C>
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
        extractor: X,
        store: R,
        clock: Arc<C>,
        max_retries: u32,
        settle_delay: Duration,
    ) -> Self {
        Self {
            executor,
            extractor: Arc::new(extractor),
            store,
            clock,
            max_retries,
            settle_delay,
        }
    }

    /// Re-extract `column` for every row where it is missing.
    ///
    /// Rows without a stored `card_href` cannot be revisited and count as
    /// failed. A still-missing value is written back as NULL so the row
    /// reflects the latest extraction attempt.
    pub async fn run(
        &self,
        column: BackfillColumn,
        product_type: Option<ProductType>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        let rows = match self.store.find_missing(column, product_type).await {
            Ok(rows) => rows,
            Err(e) => {
                summary.fatal = Some(format!("missing-column query failed: {e}"));
                return summary;
            }
        };
        info!("Backfilling '{}' for {} records", column, rows.len());

        for row in rows {
            summary.items_processed += 1;

            let Some(href) = row.card_href.clone().filter(|h| !h.is_empty()) else {
                debug!("Record {} has no stored link, cannot revisit", row.id);
                summary.failed += 1;
                continue;
            };

            match self.refill_row(row.id, &href, column).await {
                Ok(changed) => {
                    if changed {
                        summary.updated += 1;
                    }
                }
                Err(ScrapeError::Fatal(msg)) => {
                    summary.fatal = Some(msg);
                    break;
                }
                Err(e) => {
                    warn!("Backfill of record {} failed, skipping: {}", row.id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Backfill finished: {} records visited, {} updated, {} failed",
            summary.items_processed, summary.updated, summary.failed
        );
        summary
    }

    async fn refill_row(
        &self,
        id: i64,
        href: &str,
        column: BackfillColumn,
    ) -> ScrapeResult<bool> {
        let url = href.to_string();
        self.executor
            .execute(
                move |s| {
                    let url = url.clone();
                    Box::pin(async move { s.navigate(&url).await })
                },
                self.max_retries,
            )
            .await?;
        self.clock.sleep(self.settle_delay).await;

        let extractor = Arc::clone(&self.extractor);
        let value = self
            .executor
            .execute(
                move |s| {
                    let extractor = Arc::clone(&extractor);
                    Box::pin(async move { extractor.extract_field(s, column).await })
                },
                self.max_retries,
            )
            .await?;

        debug!("Backfilling record {}: {} = {:?}", id, column, value);
        self.store.update_column(id, column, value).await
    }
}
