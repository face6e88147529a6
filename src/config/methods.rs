//! Builder methods available in every state.

use std::path::PathBuf;

use super::builder::ScrapeConfigBuilder;

impl<State> ScrapeConfigBuilder<State> {
    /// Replace the default search terms (the product type itself)
    #[must_use]
    pub fn search_terms(mut self, terms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.search_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Stop expanding the feed once this many items are visible
    #[must_use]
    pub fn max_results(mut self, limit: usize) -> Self {
        self.max_results = Some(limit);
        self
    }

    #[must_use]
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Visible browser window when `false`; headless is the default
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Total attempt budget per session operation
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn transient_retry_delay_ms(mut self, millis: u64) -> Self {
        self.transient_retry_delay_ms = millis;
        self
    }

    #[must_use]
    pub fn health_check_interval_secs(mut self, secs: u64) -> Self {
        self.health_check_interval_secs = secs;
        self
    }

    #[must_use]
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn feed_wait_timeout_secs(mut self, secs: u64) -> Self {
        self.feed_wait_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn settle_delay_ms(mut self, millis: u64) -> Self {
        self.settle_delay_ms = millis;
        self
    }

    #[must_use]
    pub fn panel_settle_delay_ms(mut self, millis: u64) -> Self {
        self.panel_settle_delay_ms = millis;
        self
    }

    #[must_use]
    pub fn max_scroll_iterations(mut self, iterations: u32) -> Self {
        self.max_scroll_iterations = iterations;
        self
    }

    #[must_use]
    pub fn max_stagnant_iterations(mut self, iterations: u32) -> Self {
        self.max_stagnant_iterations = iterations;
        self
    }

    #[must_use]
    pub fn quota_default_delay_secs(mut self, secs: u64) -> Self {
        self.quota_default_delay_secs = secs;
        self
    }

    #[must_use]
    pub fn quota_safety_margin_secs(mut self, secs: u64) -> Self {
        self.quota_safety_margin_secs = secs;
        self
    }

    #[must_use]
    pub fn quota_exhaustion_ceiling(mut self, ceiling: u32) -> Self {
        self.quota_exhaustion_ceiling = ceiling;
        self
    }

    /// Coordinate match half-width in degrees for reconciliation
    #[must_use]
    pub fn coord_tolerance_deg(mut self, tolerance: f64) -> Self {
        self.coord_tolerance_deg = tolerance;
        self
    }
}
