//! Error taxonomy for crawl-and-reconcile operations.
//!
//! Every failure in the engine is classified into one of five kinds, and the
//! classification decides the recovery path: session recreation, short retry,
//! quota backoff, item skip, or immediate abort.

use thiserror::Error;

/// Classified failure for a scrape operation
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// The browsing session handle is invalid (browser crashed, target closed).
    /// Recovered by recreating the session and retrying.
    #[error("session lost: {0}")]
    SessionLost(String),

    /// Timeout or missing element. Retried briefly; on an optional field this
    /// degrades to a null value instead of failing the item.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Provider-side rate limit. Handled by the quota backoff policy; becomes
    /// run-fatal after repeated consecutive exhaustions.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Record store operation failed. Logged, the item is skipped, and the
    /// run continues.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Unrecoverable configuration or input error. Aborts immediately.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ScrapeError {
    /// Whether the executor may retry this error at all
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SessionLost(_) | Self::Transient(_) | Self::QuotaExhausted(_))
    }

    /// Classify a browser-automation error by its message text.
    ///
    /// chromiumoxide surfaces CDP failures as strings, so classification works
    /// the same way the crawler classifies page failures: match on the
    /// well-known message fragments.
    ///
    /// Unknown errors classify as `Transient`: a wrong `Fatal` kills a whole
    /// run while a wrong `Transient` wastes a single retry.
    pub fn from_automation(err: impl std::fmt::Display) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();

        // Quota / rate limiting (highest priority check)
        if lower.contains("resource_exhausted")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("rate limit")
        {
            return Self::QuotaExhausted(msg);
        }

        // Session-level breakage: the handle is gone, retrying the op on the
        // same handle cannot succeed
        if lower.contains("browser closed")
            || lower.contains("browser disconnected")
            || lower.contains("page closed")
            || lower.contains("target closed")
            || lower.contains("session not found")
            || lower.contains("session closed")
            || lower.contains("no response from the chromium instance")
            || lower.contains("websocket")
            || lower.contains("channel")
        {
            return Self::SessionLost(msg);
        }

        Self::Transient(msg)
    }
}

impl From<sqlx::Error> for ScrapeError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Convenience alias for Result with [`ScrapeError`]
pub type ScrapeResult<T> = Result<T, ScrapeError>;
