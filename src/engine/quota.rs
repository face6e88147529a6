//! Backoff policy for provider-side quota exhaustion.
//!
//! Quota errors carry a suggested retry delay in their message
//! (`retryDelay: "34s"` shapes). The policy sleeps for that delay plus a
//! safety margin and tracks consecutive exhaustions; past the ceiling the
//! whole run must stop issuing calls to the exhausted collaborator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::engine::errors::{ScrapeError, ScrapeResult};

/// Matches `retryDelay: "34s"` / `retryDelay':'34.5s` / `"retryDelay":"10s"`
static RETRY_DELAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"retryDelay["']?\s*:\s*["']?(\d+(?:\.\d+)?)s"#)
        .expect("retry delay pattern is valid")
});

/// Parse the provider-suggested delay out of an error message
#[must_use]
pub fn parse_retry_delay(message: &str) -> Option<Duration> {
    let captures = RETRY_DELAY_RE.captures(message)?;
    let seconds: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs_f64(seconds))
}

/// Governs sleeps and the consecutive-exhaustion counter for quota errors
pub struct QuotaBackoffPolicy<C: Clock> {
    clock: Arc<C>,
    /// Used when the error carries no parseable delay
    default_delay: Duration,
    /// Added on top of any provider-suggested delay
    safety_margin: Duration,
    /// Consecutive exhaustions allowed before the run is declared unable to proceed
    max_consecutive: u32,
    consecutive: AtomicU32,
}

impl<C: Clock> QuotaBackoffPolicy<C> {
    pub fn new(
        clock: Arc<C>,
        default_delay: Duration,
        safety_margin: Duration,
        max_consecutive: u32,
    ) -> Self {
        Self {
            clock,
            default_delay,
            safety_margin,
            max_consecutive,
            consecutive: AtomicU32::new(0),
        }
    }

    /// Handle one quota exhaustion: bump the counter, then either sleep and
    /// allow a retry, or return `Fatal` once the ceiling is reached.
    ///
    /// The counter survives unrelated transient errors; only
    /// [`record_success`](Self::record_success) resets it.
    pub async fn on_quota_exhausted(&self, message: &str) -> ScrapeResult<()> {
        let count = self.consecutive.fetch_add(1, Ordering::Relaxed) + 1;

        if count >= self.max_consecutive {
            warn!(
                "Quota exhausted {} consecutive times (ceiling {}), giving up",
                count, self.max_consecutive
            );
            return Err(ScrapeError::Fatal(format!(
                "provider quota exhausted {count} consecutive times"
            )));
        }

        let delay = parse_retry_delay(message).unwrap_or(self.default_delay) + self.safety_margin;
        info!(
            "Quota exhausted ({}/{}), sleeping {:?} per provider hint",
            count, self.max_consecutive, delay
        );
        self.clock.sleep(delay).await;
        Ok(())
    }

    /// Reset the consecutive-exhaustion counter after any successful call
    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::Relaxed);
    }

    #[must_use]
    pub fn consecutive_exhaustions(&self) -> u32 {
        self.consecutive.load(Ordering::Relaxed)
    }
}
