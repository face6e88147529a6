//! Pagination by stagnation detection.
//!
//! The result feed has unknown length and loads lazily on scroll. The scanner
//! keeps expanding it until the visible item count stops growing, a results
//! hint is reached, or a hard iteration ceiling trips.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::engine::errors::{ScrapeError, ScrapeResult};
use crate::engine::executor::ActionExecutor;
use crate::engine::types::{FEED_SELECTOR, ITEM_CARD_SELECTOR, ScanOutcome, StopReason};
use crate::session::handle::NavigationSession;

/// Scroll the feed container to its bottom, triggering the next lazy load
fn scroll_script() -> String {
    format!(
        r#"(() => {{
            const feed = document.querySelector("{FEED_SELECTOR}");
            if (!feed) throw new Error("feed container not found");
            feed.scrollTop = feed.scrollHeight;
            return true;
        }})()"#
    )
}

/// Count currently visible item cards
fn count_script() -> String {
    format!(r#"document.querySelectorAll("{ITEM_CARD_SELECTOR}").length"#)
}

/// Verify the feed container still exists (re-acquire after a stale read)
pub(crate) fn feed_present_script() -> String {
    format!(r#"document.querySelector("{FEED_SELECTOR}") !== null"#)
}

#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    /// Consecutive unchanged counts before the feed is considered stable
    pub max_stagnant_iterations: u32,
    /// Hard ceiling on expansion iterations, even with oscillating counts
    pub max_iterations: u32,
    /// Stop early once this many items are visible
    pub max_results: Option<usize>,
    /// Wait after each expansion before counting
    pub settle_delay: Duration,
    /// Retry budget for each expansion/count action
    pub max_retries: u32,
}

pub struct PaginationScanner<S: NavigationSession, C: Clock> {
    executor: Arc<ActionExecutor<S, C>>,
    clock: Arc<C>,
}

impl<S: NavigationSession, C: Clock> PaginationScanner<S, C> {
    pub fn new(executor: Arc<ActionExecutor<S, C>>, clock: Arc<C>) -> Self {
        Self { executor, clock }
    }

    /// Expand the feed until one of the stop conditions fires.
    ///
    /// One transient counting failure re-acquires the feed container and
    /// retries within the same iteration; a second transient failure stops
    /// the scan with [`StopReason::ScannerError`], which aborts this scan but
    /// not the run. Any other error kind propagates to the caller.
    pub async fn expand_until_stable(&self, config: &ScanConfig) -> ScrapeResult<ScanOutcome> {
        let mut prev_count = 0usize;
        let mut stagnant = 0u32;
        let mut iterations = 0u32;

        loop {
            if iterations >= config.max_iterations {
                info!(
                    "Scan hit iteration ceiling ({}) at {} items",
                    config.max_iterations, prev_count
                );
                return Ok(ScanOutcome {
                    reason: StopReason::IterationCeiling,
                    item_count: prev_count,
                    iterations,
                });
            }
            iterations += 1;

            let scroll = scroll_script();
            self.executor
                .execute(
                    move |s| {
                        let js = scroll.clone();
                        Box::pin(async move { s.run_script(&js).await.map(|_| ()) })
                    },
                    config.max_retries,
                )
                .await?;

            self.clock.sleep(config.settle_delay).await;

            let count = match self.count_items(config).await {
                Ok(count) => count,
                Err(ScrapeError::Transient(msg)) => {
                    // Stale feed read: re-acquire the container once and retry
                    // the count within this same iteration
                    debug!("Count failed ({}), re-acquiring feed container", msg);
                    self.reacquire_feed(config).await?;
                    match self.count_items(config).await {
                        Ok(count) => count,
                        Err(e @ ScrapeError::Transient(_)) => {
                            warn!("Count failed again after re-acquire, stopping scan: {}", e);
                            return Ok(ScanOutcome {
                                reason: StopReason::ScannerError,
                                item_count: prev_count,
                                iterations,
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };

            debug!(
                "Feed expansion {}: {} items ({} stagnant)",
                iterations, count, stagnant
            );

            if let Some(hint) = config.max_results
                && count >= hint
            {
                info!("Results hint ({}) reached with {} items", hint, count);
                return Ok(ScanOutcome {
                    reason: StopReason::HintReached,
                    item_count: count,
                    iterations,
                });
            }

            if count == prev_count {
                stagnant += 1;
                if stagnant >= config.max_stagnant_iterations {
                    info!("Feed stabilized at {} items after {} iterations", count, iterations);
                    return Ok(ScanOutcome {
                        reason: StopReason::Stabilized,
                        item_count: count,
                        iterations,
                    });
                }
            } else {
                stagnant = 0;
            }
            prev_count = count;
        }
    }

    async fn count_items(&self, config: &ScanConfig) -> ScrapeResult<usize> {
        let count = count_script();
        let value = self
            .executor
            .execute(
                move |s| {
                    let js = count.clone();
                    Box::pin(async move { s.run_script(&js).await })
                },
                config.max_retries,
            )
            .await?;

        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| ScrapeError::Transient(format!("item count not numeric: {value}")))
    }

    async fn reacquire_feed(&self, config: &ScanConfig) -> ScrapeResult<()> {
        let probe = feed_present_script();
        let present = self
            .executor
            .execute(
                move |s| {
                    let js = probe.clone();
                    Box::pin(async move { s.run_script(&js).await })
                },
                config.max_retries,
            )
            .await?;

        if present.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(ScrapeError::Transient("feed container disappeared".to_string()))
        }
    }
}
