//! Bounded-retry execution of session operations.
//!
//! Every navigation or scripting action in the engine funnels through
//! [`ActionExecutor::execute`], which classifies failures and applies the
//! matching recovery: session recreation, short delay, or quota backoff.
//! No operation is ever retried indefinitely.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::engine::errors::{ScrapeError, ScrapeResult};
use crate::engine::quota::QuotaBackoffPolicy;
use crate::session::handle::NavigationSession;
use crate::session::manager::SessionManager;

/// Boxed future borrowing the session for one operation attempt
pub type SessionOp<'a, T> = Pin<Box<dyn Future<Output = ScrapeResult<T>> + Send + 'a>>;

pub struct ActionExecutor<S: NavigationSession, C: Clock> {
    manager: Arc<SessionManager<S, C>>,
    quota: Arc<QuotaBackoffPolicy<C>>,
    clock: Arc<C>,
    /// Fixed short delay before retrying a transient failure
    transient_delay: Duration,
}

impl<S: NavigationSession, C: Clock> ActionExecutor<S, C> {
    pub fn new(
        manager: Arc<SessionManager<S, C>>,
        quota: Arc<QuotaBackoffPolicy<C>>,
        clock: Arc<C>,
        transient_delay: Duration,
    ) -> Self {
        Self {
            manager,
            quota,
            clock,
            transient_delay,
        }
    }

    pub fn manager(&self) -> &Arc<SessionManager<S, C>> {
        &self.manager
    }

    pub fn quota(&self) -> &Arc<QuotaBackoffPolicy<C>> {
        &self.quota
    }

    /// Run `op` against the current session with a total budget of
    /// `max_retries` standard attempts.
    ///
    /// - `SessionLost`: force recreation, retry (consumes an attempt)
    /// - `Transient`: fixed short delay plus jitter, retry (consumes an attempt)
    /// - `QuotaExhausted`: quota policy sleep, retry WITHOUT consuming a
    ///   standard attempt; the policy's own consecutive-exhaustion ceiling
    ///   bounds that path
    /// - `Persistence` / `Fatal`: propagate immediately
    pub async fn execute<T, F>(&self, op: F, max_retries: u32) -> ScrapeResult<T>
    where
        F: for<'a> Fn(&'a S) -> SessionOp<'a, T> + Send + Sync,
    {
        let mut attempts = 0u32;

        loop {
            self.manager.ensure_alive().await?;

            let err = match self.manager.run(&op).await {
                Ok(value) => {
                    self.quota.record_success();
                    return Ok(value);
                }
                Err(e) => e,
            };

            if let ScrapeError::QuotaExhausted(msg) = &err {
                // Separate exhaustion budget; fatal from the policy ends the run
                self.quota.on_quota_exhausted(msg).await?;
                continue;
            }

            attempts += 1;

            match &err {
                ScrapeError::SessionLost(msg) => {
                    if attempts >= max_retries {
                        warn!("Retry budget ({}) exhausted: {}", max_retries, err);
                        return Err(err);
                    }
                    warn!(
                        "Session lost mid-operation (attempt {}/{}): {}",
                        attempts, max_retries, msg
                    );
                    self.manager.force_recreate().await?;
                }
                ScrapeError::Transient(msg) => {
                    if attempts >= max_retries {
                        warn!("Retry budget ({}) exhausted: {}", max_retries, err);
                        return Err(err);
                    }
                    let jitter = Duration::from_millis(rand::rng().random_range(0..250));
                    debug!(
                        "Transient failure (attempt {}/{}), retrying in {:?}: {}",
                        attempts,
                        max_retries,
                        self.transient_delay + jitter,
                        msg
                    );
                    self.clock.sleep(self.transient_delay + jitter).await;
                }
                _ => {
                    warn!("Non-retryable error, failing fast: {}", err);
                    return Err(err);
                }
            }
        }
    }
}
