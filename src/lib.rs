//! Resilient crawl-and-reconcile engine for map-style place feeds.
//!
//! Drives a browsing session over a lazily-paginated search feed, extracts a
//! record per result, and reconciles each record against a SQLite store so
//! that re-running the same or overlapping query refreshes rows instead of
//! duplicating them. Sessions are health-checked and rebuilt on failure,
//! every action runs under a classified bounded-retry loop, and provider
//! quota errors back off using the delay hint they carry.
//!
//! ```rust,no_run
//! use placescrape::{ProductType, ScrapeConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ScrapeConfig::builder()
//!     .product_type(ProductType::Hotel)
//!     .location("Lisbon")
//!     .max_results(50)
//!     .build()?;
//!
//! let summary = placescrape::scrape(config).await?;
//! println!("{} inserted, {} updated", summary.inserted, summary.updated);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod extract;
pub mod session;
pub mod store;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use clock::{Clock, SystemClock};
pub use config::ScrapeConfig;
pub use engine::{
    ActionExecutor, BackfillRun, ItemCollector, PaginationScanner, ProductType,
    QuotaBackoffPolicy, RawRecord, RunSummary, ScanConfig, ScrapeError, ScrapeResult, ScrapeRun,
    StopReason,
};
pub use extract::{FieldExtractor, PanelExtractor};
pub use session::{BrowserSession, ElementRef, NavigationSession, SessionFactory, SessionManager};
pub use store::reconciler::{ReconcileOutcome, Reconciler};
pub use store::{BackfillColumn, FieldValue, PersistentRecord, RecordStore, SqliteStore};

use config::types::{
    DEFAULT_MAX_RETRIES, DEFAULT_PANEL_SETTLE_DELAY_MS, DEFAULT_TRANSIENT_RETRY_DELAY_MS,
};

/// Wire the production stack and run one scrape to completion.
///
/// The browser is closed before this returns, regardless of outcome. A
/// run-level fatal condition is reported inside the summary, not as an error;
/// `Err` means the stack could not even be assembled.
pub async fn scrape(config: ScrapeConfig) -> ScrapeResult<RunSummary> {
    let clock = Arc::new(SystemClock);

    let headless = config.headless();
    let navigation_timeout = config.navigation_timeout();
    let factory: SessionFactory<BrowserSession> =
        Arc::new(move || Box::pin(BrowserSession::launch(headless, navigation_timeout)));

    let manager = Arc::new(SessionManager::new(
        factory,
        Arc::clone(&clock),
        config.health_check_interval(),
    ));
    let quota = Arc::new(QuotaBackoffPolicy::new(
        Arc::clone(&clock),
        config.quota_default_delay(),
        config.quota_safety_margin(),
        config.quota_exhaustion_ceiling(),
    ));
    let executor = Arc::new(ActionExecutor::new(
        Arc::clone(&manager),
        quota,
        Arc::clone(&clock),
        config.transient_retry_delay(),
    ));
    let scanner = PaginationScanner::new(Arc::clone(&executor), Arc::clone(&clock));
    let extractor = PanelExtractor::new(SystemClock, config.panel_settle_delay());

    let store = SqliteStore::open(config.db_path()).await?;
    let reconciler = Reconciler::new(store, config.coord_tolerance_deg());

    let run = ScrapeRun::new(executor, scanner, extractor, reconciler, clock, config);
    let summary = run.run().await;

    manager.shutdown().await;
    Ok(summary)
}

/// Wire the production stack and backfill one column over stored records.
///
/// Revisits every row where `column` is NULL or empty (optionally scoped to
/// one product type) through its stored link and re-extracts just that
/// column. Uses the same session/retry defaults as [`ScrapeConfig`].
pub async fn backfill(
    db_path: &Path,
    column: BackfillColumn,
    product_type: Option<ProductType>,
    headless: bool,
) -> ScrapeResult<RunSummary> {
    let clock = Arc::new(SystemClock);

    let factory: SessionFactory<BrowserSession> = Arc::new(move || {
        Box::pin(BrowserSession::launch(
            headless,
            Duration::from_secs(config::types::DEFAULT_NAVIGATION_TIMEOUT_SECS),
        ))
    });
    let manager = Arc::new(SessionManager::new(
        factory,
        Arc::clone(&clock),
        Duration::from_secs(config::types::DEFAULT_HEALTH_CHECK_INTERVAL_SECS),
    ));
    let quota = Arc::new(QuotaBackoffPolicy::new(
        Arc::clone(&clock),
        Duration::from_secs(config::types::DEFAULT_QUOTA_DELAY_SECS),
        Duration::from_secs(config::types::DEFAULT_QUOTA_SAFETY_MARGIN_SECS),
        config::types::DEFAULT_QUOTA_EXHAUSTION_CEILING,
    ));
    let executor = Arc::new(ActionExecutor::new(
        Arc::clone(&manager),
        quota,
        Arc::clone(&clock),
        Duration::from_millis(DEFAULT_TRANSIENT_RETRY_DELAY_MS),
    ));

    let settle_delay = Duration::from_millis(DEFAULT_PANEL_SETTLE_DELAY_MS);
    let extractor = PanelExtractor::new(SystemClock, settle_delay);
    let store = SqliteStore::open(db_path).await?;

    let run = BackfillRun::new(
        executor,
        extractor,
        store,
        clock,
        DEFAULT_MAX_RETRIES,
        settle_delay,
    );
    let summary = run.run(column, product_type).await;

    manager.shutdown().await;
    Ok(summary)
}
