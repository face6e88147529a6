//! Type-safe builder for `ScrapeConfig` using the typestate pattern.
//!
//! The two required fields (product type and location) must be set, in
//! order, before `build()` becomes available; everything else has a default.

use std::marker::PhantomData;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::engine::types::ProductType;

use super::types::{
    DEFAULT_COORD_TOLERANCE_DEG, DEFAULT_DB_PATH, DEFAULT_FEED_WAIT_TIMEOUT_SECS,
    DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MAX_SCROLL_ITERATIONS,
    DEFAULT_MAX_STAGNANT_ITERATIONS, DEFAULT_NAVIGATION_TIMEOUT_SECS,
    DEFAULT_PANEL_SETTLE_DELAY_MS, DEFAULT_QUOTA_DELAY_SECS, DEFAULT_QUOTA_EXHAUSTION_CEILING,
    DEFAULT_QUOTA_SAFETY_MARGIN_SECS, DEFAULT_SETTLE_DELAY_MS, DEFAULT_TRANSIENT_RETRY_DELAY_MS,
    ScrapeConfig,
};

// Type states for the builder
pub struct WithProductType;
pub struct WithLocation;

pub struct ScrapeConfigBuilder<State = ()> {
    pub(crate) product_type: Option<ProductType>,
    pub(crate) location: Option<String>,
    pub(crate) search_terms: Vec<String>,
    pub(crate) max_results: Option<usize>,
    pub(crate) db_path: PathBuf,
    pub(crate) headless: bool,
    pub(crate) max_retries: u32,
    pub(crate) transient_retry_delay_ms: u64,
    pub(crate) health_check_interval_secs: u64,
    pub(crate) navigation_timeout_secs: u64,
    pub(crate) feed_wait_timeout_secs: u64,
    pub(crate) settle_delay_ms: u64,
    pub(crate) panel_settle_delay_ms: u64,
    pub(crate) max_scroll_iterations: u32,
    pub(crate) max_stagnant_iterations: u32,
    pub(crate) quota_default_delay_secs: u64,
    pub(crate) quota_safety_margin_secs: u64,
    pub(crate) quota_exhaustion_ceiling: u32,
    pub(crate) coord_tolerance_deg: f64,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for ScrapeConfigBuilder<()> {
    fn default() -> Self {
        Self {
            product_type: None,
            location: None,
            search_terms: Vec::new(),
            max_results: None,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            headless: true,
            max_retries: DEFAULT_MAX_RETRIES,
            transient_retry_delay_ms: DEFAULT_TRANSIENT_RETRY_DELAY_MS,
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
            feed_wait_timeout_secs: DEFAULT_FEED_WAIT_TIMEOUT_SECS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            panel_settle_delay_ms: DEFAULT_PANEL_SETTLE_DELAY_MS,
            max_scroll_iterations: DEFAULT_MAX_SCROLL_ITERATIONS,
            max_stagnant_iterations: DEFAULT_MAX_STAGNANT_ITERATIONS,
            quota_default_delay_secs: DEFAULT_QUOTA_DELAY_SECS,
            quota_safety_margin_secs: DEFAULT_QUOTA_SAFETY_MARGIN_SECS,
            quota_exhaustion_ceiling: DEFAULT_QUOTA_EXHAUSTION_CEILING,
            coord_tolerance_deg: DEFAULT_COORD_TOLERANCE_DEG,
            _phantom: PhantomData,
        }
    }
}

impl ScrapeConfig {
    /// Create a builder for configuring a `ScrapeConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> ScrapeConfigBuilder<()> {
        ScrapeConfigBuilder::default()
    }
}

impl ScrapeConfigBuilder<()> {
    pub fn product_type(self, product_type: ProductType) -> ScrapeConfigBuilder<WithProductType> {
        ScrapeConfigBuilder {
            product_type: Some(product_type),
            location: self.location,
            search_terms: self.search_terms,
            max_results: self.max_results,
            db_path: self.db_path,
            headless: self.headless,
            max_retries: self.max_retries,
            transient_retry_delay_ms: self.transient_retry_delay_ms,
            health_check_interval_secs: self.health_check_interval_secs,
            navigation_timeout_secs: self.navigation_timeout_secs,
            feed_wait_timeout_secs: self.feed_wait_timeout_secs,
            settle_delay_ms: self.settle_delay_ms,
            panel_settle_delay_ms: self.panel_settle_delay_ms,
            max_scroll_iterations: self.max_scroll_iterations,
            max_stagnant_iterations: self.max_stagnant_iterations,
            quota_default_delay_secs: self.quota_default_delay_secs,
            quota_safety_margin_secs: self.quota_safety_margin_secs,
            quota_exhaustion_ceiling: self.quota_exhaustion_ceiling,
            coord_tolerance_deg: self.coord_tolerance_deg,
            _phantom: PhantomData,
        }
    }
}

impl ScrapeConfigBuilder<WithProductType> {
    pub fn location(self, location: impl Into<String>) -> ScrapeConfigBuilder<WithLocation> {
        ScrapeConfigBuilder {
            product_type: self.product_type,
            location: Some(location.into()),
            search_terms: self.search_terms,
            max_results: self.max_results,
            db_path: self.db_path,
            headless: self.headless,
            max_retries: self.max_retries,
            transient_retry_delay_ms: self.transient_retry_delay_ms,
            health_check_interval_secs: self.health_check_interval_secs,
            navigation_timeout_secs: self.navigation_timeout_secs,
            feed_wait_timeout_secs: self.feed_wait_timeout_secs,
            settle_delay_ms: self.settle_delay_ms,
            panel_settle_delay_ms: self.panel_settle_delay_ms,
            max_scroll_iterations: self.max_scroll_iterations,
            max_stagnant_iterations: self.max_stagnant_iterations,
            quota_default_delay_secs: self.quota_default_delay_secs,
            quota_safety_margin_secs: self.quota_safety_margin_secs,
            quota_exhaustion_ceiling: self.quota_exhaustion_ceiling,
            coord_tolerance_deg: self.coord_tolerance_deg,
            _phantom: PhantomData,
        }
    }
}

impl ScrapeConfigBuilder<WithLocation> {
    /// Validate and build the final configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when a numeric parameter is outside its valid range
    /// or the location is empty.
    pub fn build(self) -> Result<ScrapeConfig> {
        let product_type = self
            .product_type
            .ok_or_else(|| anyhow!("product type is required"))?;
        let location = self.location.ok_or_else(|| anyhow!("location is required"))?;

        if location.trim().is_empty() {
            return Err(anyhow!("location must not be empty"));
        }
        if self.max_retries == 0 {
            return Err(anyhow!("max_retries must be at least 1"));
        }
        if self.max_scroll_iterations == 0 {
            return Err(anyhow!("max_scroll_iterations must be at least 1"));
        }
        if self.max_stagnant_iterations == 0 {
            return Err(anyhow!("max_stagnant_iterations must be at least 1"));
        }
        if self.quota_exhaustion_ceiling == 0 {
            return Err(anyhow!("quota_exhaustion_ceiling must be at least 1"));
        }
        if !(self.coord_tolerance_deg > 0.0) {
            return Err(anyhow!("coord_tolerance_deg must be positive"));
        }

        // No terms configured: search for the category itself
        let search_terms = if self.search_terms.is_empty() {
            vec![product_type.as_str().to_string()]
        } else {
            self.search_terms
        };

        Ok(ScrapeConfig {
            product_type,
            location: location.trim().to_string(),
            search_terms,
            max_results: self.max_results,
            db_path: self.db_path,
            headless: self.headless,
            max_retries: self.max_retries,
            transient_retry_delay_ms: self.transient_retry_delay_ms,
            health_check_interval_secs: self.health_check_interval_secs,
            navigation_timeout_secs: self.navigation_timeout_secs,
            feed_wait_timeout_secs: self.feed_wait_timeout_secs,
            settle_delay_ms: self.settle_delay_ms,
            panel_settle_delay_ms: self.panel_settle_delay_ms,
            max_scroll_iterations: self.max_scroll_iterations,
            max_stagnant_iterations: self.max_stagnant_iterations,
            quota_default_delay_secs: self.quota_default_delay_secs,
            quota_safety_margin_secs: self.quota_safety_margin_secs,
            quota_exhaustion_ceiling: self.quota_exhaustion_ceiling,
            coord_tolerance_deg: self.coord_tolerance_deg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let config = ScrapeConfig::builder()
            .product_type(ProductType::Hotel)
            .location("Lisbon")
            .build()
            .expect("valid config");

        assert_eq!(config.search_terms, vec!["hotel".to_string()]);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_scroll_iterations, 25);
        assert!(config.headless);
    }

    #[test]
    fn rejects_empty_location() {
        let result = ScrapeConfig::builder()
            .product_type(ProductType::Hotel)
            .location("  ")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_retry_budget() {
        let result = ScrapeConfig::builder()
            .product_type(ProductType::Gastronomy)
            .location("Porto")
            .max_retries(0)
            .build();
        assert!(result.is_err());
    }
}
