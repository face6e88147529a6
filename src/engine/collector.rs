//! Item enumeration with per-scan identity-key deduplication.
//!
//! The collector walks the currently visible cards, derives each card's
//! identity key (its stable href) and filters out keys already seen during
//! this scan. It is restartable: after further pagination it can be called
//! again and only newly revealed items come back.

use std::collections::HashSet;

use tracing::{debug, trace};
use url::Url;

use crate::engine::types::{
    ITEM_LINK_SELECTOR, ItemReference, PREVIEW_FACET_SELECTOR, PREVIEW_NAME_SELECTOR,
};
use crate::session::handle::ElementRef;

/// Normalize an identity key so the same item dedups across feed reads.
///
/// Drops the fragment and lowercases scheme/host; query parameters stay, they
/// are significant on map links. Unparseable hrefs pass through unchanged.
#[must_use]
pub fn normalize_identity_key(href: &str) -> String {
    match Url::parse(href) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => href.to_string(),
    }
}

/// Per-scan collector; the dedup cache lives and dies with one scan
pub struct ItemCollector {
    seen: HashSet<String>,
}

impl ItemCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Number of distinct identity keys seen so far in this scan
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Collect references for all not-yet-seen items, preserving feed order.
    ///
    /// Preview fields are best-effort: each sub-step fails independently and a
    /// miss yields `None`/empty rather than dropping the item. Cards without a
    /// derivable identity key are skipped entirely.
    pub async fn collect<E: ElementRef>(&mut self, elements: &[E]) -> Vec<ItemReference> {
        let mut references = Vec::new();

        for element in elements {
            let href = match element.child_attribute(ITEM_LINK_SELECTOR, "href").await {
                Ok(Some(href)) if !href.is_empty() => href,
                Ok(_) => {
                    trace!("Card without stable link, skipping");
                    continue;
                }
                Err(e) => {
                    debug!("Failed to read card link, skipping item: {}", e);
                    continue;
                }
            };

            let key = normalize_identity_key(&href);
            if self.seen.contains(&key) {
                // Already collected this scan: skip without re-reading previews
                continue;
            }

            let preview_name = element
                .query_texts(PREVIEW_NAME_SELECTOR)
                .await
                .ok()
                .and_then(|texts| texts.into_iter().next());

            let preview_facets = element
                .query_texts(PREVIEW_FACET_SELECTOR)
                .await
                .unwrap_or_default();

            self.seen.insert(key.clone());
            references.push(ItemReference {
                identity_key: key,
                preview_name,
                preview_facets,
            });
        }

        debug!(
            "Collected {} new item references ({} keys seen this scan)",
            references.len(),
            self.seen.len()
        );
        references
    }
}

impl Default for ItemCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_fragment_and_keeps_query() {
        assert_eq!(
            normalize_identity_key("https://Example.com/maps/place/x?hl=en#frag"),
            "https://example.com/maps/place/x?hl=en"
        );
        assert_eq!(normalize_identity_key("not a url"), "not a url");
    }
}
