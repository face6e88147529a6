//! Data structures and selector constants for the feed scan pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Map search URL base; query and locale parameters are appended per term
pub const SEARCH_URL_BASE: &str = "https://www.google.com/maps/search/";

/// CSS selector for the lazily-paginated result feed container
pub const FEED_SELECTOR: &str = "div[role='feed']";

/// CSS selector for one result card inside the feed
pub const ITEM_CARD_SELECTOR: &str = "div.Nv2PK.THOPZb.CpccDe";

/// CSS selector for the card's stable link (the item's identity key)
pub const ITEM_LINK_SELECTOR: &str = "a.hfpxzc";

/// CSS selector for the card's preview name
pub const PREVIEW_NAME_SELECTOR: &str = ".qBF1Pd";

/// CSS selector for the card's preview facet spans (category, hours, price tier)
pub const PREVIEW_FACET_SELECTOR: &str = ".W4Efsd span";

/// Consent interstitial accept button (English and Portuguese variants)
pub const CONSENT_BUTTON_SELECTOR: &str =
    "button[aria-label^='Accept a'], button[aria-label^='Aceitar t']";

// =============================================================================
// Data Structures
// =============================================================================

/// The fixed set of product categories the store recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Hotel,
    Gastronomy,
    Attraction,
    Shopping,
    Activity,
}

impl ProductType {
    /// All recognized categories, for CLI help and validation messages
    pub const ALL: [Self; 5] = [
        Self::Hotel,
        Self::Gastronomy,
        Self::Attraction,
        Self::Shopping,
        Self::Activity,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel",
            Self::Gastronomy => "gastronomy",
            Self::Attraction => "attraction",
            Self::Shopping => "shopping",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hotel" => Ok(Self::Hotel),
            "gastronomy" => Ok(Self::Gastronomy),
            "attraction" => Ok(Self::Attraction),
            "shopping" => Ok(Self::Shopping),
            "activity" => Ok(Self::Activity),
            other => Err(format!(
                "unknown product type '{other}' (expected one of: hotel, gastronomy, attraction, shopping, activity)"
            )),
        }
    }
}

/// Lightweight handle plus preview metadata for one feed item, pre-extraction.
///
/// Scoped to a single scan; the identity key is the card's stable href and is
/// what the dedup cache filters on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReference {
    /// Stable URL uniquely identifying the item across repeated feed reads
    pub identity_key: String,

    /// Best-effort card title; `None` when the preview sub-step failed
    pub preview_name: Option<String>,

    /// Best-effort facet list in card order (category, price tier, hours)
    pub preview_facets: Vec<String>,
}

/// Full set of fields extracted for one item, pre-reconciliation.
///
/// `name` is the only required field; everything else degrades to null when
/// its extraction strategies all miss.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub images: Vec<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub facilities: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub stars: Option<i64>,
    pub price: Option<String>,
    pub operating_hours: Option<String>,
    /// The item's identity key, persisted as `card_href`
    pub card_href: Option<String>,
}

/// Why a pagination scan stopped expanding the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Item count stopped growing for `max_stagnant_iterations` reads
    Stabilized,
    /// Configured `max_results` hint was reached
    HintReached,
    /// Hard iteration ceiling hit (oscillating counts, endless feed)
    IterationCeiling,
    /// Two consecutive counting failures; the scan aborts, the run continues
    ScannerError,
}

/// Result of one `expand_until_stable` invocation
#[derive(Debug, Clone, Copy)]
pub struct ScanOutcome {
    pub reason: StopReason,
    /// Items visible in the feed when the scan stopped
    pub item_count: usize,
    /// Expansion iterations performed
    pub iterations: u32,
}

/// Aggregated result of a whole run, always produced even on partial failure
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub terms_attempted: usize,
    pub terms_completed: usize,
    pub items_processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    /// Set when the run stopped early on a run-level fatal condition
    pub fatal: Option<String>,
}

impl RunSummary {
    pub fn absorb(&mut self, other: &RunSummary) {
        self.items_processed += other.items_processed;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.failed += other.failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_type_round_trips() {
        for pt in ProductType::ALL {
            assert_eq!(pt.as_str().parse::<ProductType>(), Ok(pt));
        }
        assert!("museum".parse::<ProductType>().is_err());
        assert_eq!(" Hotel ".parse::<ProductType>(), Ok(ProductType::Hotel));
    }
}
