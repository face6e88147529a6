//! Crawl-and-reconcile engine core.
//!
//! The engine turns one search query into reconciled store rows: the scanner
//! expands the lazily-loaded feed, the collector dedups the visible cards,
//! and the orchestrator drives extraction and reconciliation per item. All
//! session access goes through the executor's classified retry loop.

// Sub-modules
pub mod backfill;
pub mod collector;
pub mod errors;
pub mod executor;
pub mod orchestrator;
pub mod quota;
pub mod scanner;
pub mod types;

// Re-exports for public API
pub use backfill::BackfillRun;
pub use collector::{ItemCollector, normalize_identity_key};
pub use errors::{ScrapeError, ScrapeResult};
pub use executor::ActionExecutor;
pub use orchestrator::ScrapeRun;
pub use quota::{QuotaBackoffPolicy, parse_retry_delay};
pub use scanner::{PaginationScanner, ScanConfig};
pub use types::{
    ItemReference, ProductType, RawRecord, RunSummary, ScanOutcome, StopReason,
};
