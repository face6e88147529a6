//! Time source abstraction.
//!
//! All waiting in the engine (settle delays, health-check intervals, backoff
//! sleeps) goes through [`Clock`] so that stagnation and backoff behavior is
//! deterministic under test.

use std::time::{Duration, Instant};

use async_trait::async_trait;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic now
    fn now(&self) -> Instant;

    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by `std::time::Instant` and `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
