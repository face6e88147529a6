//! Accessor methods for `ScrapeConfig`.

use std::path::Path;
use std::time::Duration;

use crate::engine::types::ProductType;

use super::types::ScrapeConfig;

impl ScrapeConfig {
    #[must_use]
    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn search_terms(&self) -> &[String] {
        &self.search_terms
    }

    #[must_use]
    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn transient_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transient_retry_delay_ms)
    }

    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    #[must_use]
    pub fn feed_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_wait_timeout_secs)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn panel_settle_delay(&self) -> Duration {
        Duration::from_millis(self.panel_settle_delay_ms)
    }

    #[must_use]
    pub fn max_scroll_iterations(&self) -> u32 {
        self.max_scroll_iterations
    }

    #[must_use]
    pub fn max_stagnant_iterations(&self) -> u32 {
        self.max_stagnant_iterations
    }

    #[must_use]
    pub fn quota_default_delay(&self) -> Duration {
        Duration::from_secs(self.quota_default_delay_secs)
    }

    #[must_use]
    pub fn quota_safety_margin(&self) -> Duration {
        Duration::from_secs(self.quota_safety_margin_secs)
    }

    #[must_use]
    pub fn quota_exhaustion_ceiling(&self) -> u32 {
        self.quota_exhaustion_ceiling
    }

    #[must_use]
    pub fn coord_tolerance_deg(&self) -> f64 {
        self.coord_tolerance_deg
    }
}
