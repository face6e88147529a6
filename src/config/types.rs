//! Core configuration type for scrape runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::types::ProductType;

// Defaults shared between the builder and the backfill entry point
pub const DEFAULT_DB_PATH: &str = "products.db";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TRANSIENT_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FEED_WAIT_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
pub const DEFAULT_PANEL_SETTLE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_SCROLL_ITERATIONS: u32 = 25;
pub const DEFAULT_MAX_STAGNANT_ITERATIONS: u32 = 2;
pub const DEFAULT_QUOTA_DELAY_SECS: u64 = 10;
pub const DEFAULT_QUOTA_SAFETY_MARGIN_SECS: u64 = 1;
pub const DEFAULT_QUOTA_EXHAUSTION_CEILING: u32 = 9;
pub const DEFAULT_COORD_TOLERANCE_DEG: f64 = 0.001;

/// Configuration for one scrape or backfill run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Category the collected records are stored under
    pub(crate) product_type: ProductType,

    /// Location appended to every search term ("hotel" + "Lisbon")
    pub(crate) location: String,

    /// Search terms to iterate; defaults to the product type itself
    pub(crate) search_terms: Vec<String>,

    /// Stop expanding the feed once this many items are visible
    pub(crate) max_results: Option<usize>,

    /// SQLite database file
    pub(crate) db_path: PathBuf,

    pub(crate) headless: bool,

    /// Total attempt budget per session operation
    pub(crate) max_retries: u32,

    /// Fixed delay before retrying a transient failure (jitter added on top)
    pub(crate) transient_retry_delay_ms: u64,

    /// Minimum interval between session liveness probes
    pub(crate) health_check_interval_secs: u64,

    /// Timeout for page navigation
    pub(crate) navigation_timeout_secs: u64,

    /// How long to poll for the result feed after navigating to a search
    pub(crate) feed_wait_timeout_secs: u64,

    /// Wait after each feed expansion before counting items
    pub(crate) settle_delay_ms: u64,

    /// Wait after detail-page navigation and tab switches
    pub(crate) panel_settle_delay_ms: u64,

    /// Hard ceiling on feed expansion iterations
    pub(crate) max_scroll_iterations: u32,

    /// Consecutive unchanged counts before the feed is considered stable
    pub(crate) max_stagnant_iterations: u32,

    /// Backoff when a quota error carries no parseable delay
    pub(crate) quota_default_delay_secs: u64,

    /// Added on top of any provider-suggested delay
    pub(crate) quota_safety_margin_secs: u64,

    /// Consecutive quota exhaustions before the run is declared fatal
    pub(crate) quota_exhaustion_ceiling: u32,

    /// Coordinate match half-width in degrees for reconciliation
    pub(crate) coord_tolerance_deg: f64,
}
