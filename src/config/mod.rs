//! Configuration for scrape runs.
//!
//! `ScrapeConfig` carries every tunable of the engine; its type-safe builder
//! requires the product type and location before `build()` is available.

pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

pub use builder::{ScrapeConfigBuilder, WithLocation, WithProductType};
pub use types::ScrapeConfig;
