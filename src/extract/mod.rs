//! Detail-panel field extraction.
//!
//! Given an item reference, [`PanelExtractor`] navigates the session to the
//! item's detail page and reads each field through an ordered list of
//! selector strategies: the first strategy that yields a non-empty value
//! wins, and a field whose strategies all miss stores as null. Only a
//! missing name fails the item.

pub mod parse;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::engine::errors::{ScrapeError, ScrapeResult};
use crate::engine::types::{ItemReference, ProductType, RawRecord};
use crate::extract::parse::{
    join_list, parse_coordinates, parse_leading_int, parse_price, parse_rating,
    parse_rating_count,
};
use crate::session::handle::{ElementRef, NavigationSession};
use crate::store::{BackfillColumn, FieldValue};

/// One way to read a text value out of the page
#[derive(Debug, Clone, Copy)]
enum TextSource {
    /// Inner text of the first element matching the selector
    Text(&'static str),
    /// Attribute of the first element matching the selector
    Attr(&'static str, &'static str),
    /// Inner texts of all matching elements, joined with the separator
    Joined(&'static str, &'static str),
}

const NAME_SOURCES: &[TextSource] = &[TextSource::Text("h1.DUwDvf"), TextSource::Text("h1")];

const DESCRIPTION_SOURCES: &[TextSource] = &[
    TextSource::Joined(".P1LL5e", "\n"),
    TextSource::Text(".MmD1mb.fontBodyMedium"),
];

const LINK_SOURCES: &[TextSource] = &[
    TextSource::Attr("a[data-item-id='authority']", "href"),
    TextSource::Attr(".SlvSdc.co54Ed.e3R2ac", "href"),
];

const RATING_SOURCES: &[TextSource] = &[TextSource::Text(".F7nice span[aria-hidden='true']")];

const RATING_COUNT_SOURCES: &[TextSource] = &[
    TextSource::Attr("span[aria-label*=' reviews']", "aria-label"),
    TextSource::Text(".Bd93Zb .HHrUdb span"),
];

const PHONE_SOURCES: &[TextSource] = &[TextSource::Text("button[data-item-id*='phone'] .Io6YTe")];

const ADDRESS_SOURCES: &[TextSource] = &[TextSource::Text("button[data-item-id='address'] .Io6YTe")];

const IMAGE_SOURCES: &[TextSource] =
    &[TextSource::Attr("img[src*='googleusercontent.com']", "src")];

const PRICE_SOURCES: &[TextSource] = &[
    TextSource::Attr(
        "[aria-label*='$'], [aria-label*='R$'], [aria-label*='\u{20ac}']",
        "aria-label",
    ),
    TextSource::Text(".drwWxc, .NFP9ae"),
    TextSource::Text(".MNVeJb div"),
];

const FACILITY_LIST_SELECTOR: &str = ".QoXOEc .CK16pd:not(:has(.G47vBd)) .gSamH";

const HOURS_SOURCES: &[TextSource] = &[
    TextSource::Attr(".t39EBf", "aria-label"),
    TextSource::Text(".ZDu9vd"),
];

/// Hotel class spans carry no stable selector; locate by text content
const STARS_SCRIPT: &str = r#"
(() => {
    const span = Array.from(document.querySelectorAll('span'))
        .find(el => el.textContent && el.textContent.includes('star hotel'));
    return span ? span.textContent : null;
})()
"#;

/// Per-item field extraction over a live navigation session
#[async_trait]
pub trait FieldExtractor<S: NavigationSession>: Send + Sync {
    /// Navigate to the item's detail page and extract a full record
    async fn extract(
        &self,
        session: &S,
        item: &ItemReference,
        product_type: ProductType,
    ) -> ScrapeResult<RawRecord>;

    /// Extract a single column from the page the session is already on
    async fn extract_field(
        &self,
        session: &S,
        column: BackfillColumn,
    ) -> ScrapeResult<Option<FieldValue>>;
}

/// Default extractor using the ranked selector strategies above
pub struct PanelExtractor<C> {
    clock: C,
    /// Wait after navigation and tab switches for the panel to render
    settle_delay: Duration,
}

impl<C: Clock> PanelExtractor<C> {
    pub fn new(clock: C, settle_delay: Duration) -> Self {
        Self {
            clock,
            settle_delay,
        }
    }

    /// First strategy producing a non-empty trimmed value, else `None`.
    ///
    /// Lookup failures count as misses; a field read never aborts an item.
    async fn first_of<S: NavigationSession>(
        &self,
        session: &S,
        sources: &[TextSource],
    ) -> Option<String> {
        for source in sources {
            let value = match *source {
                TextSource::Text(selector) => match session.locate_all(selector).await {
                    Ok(elements) => match elements.first() {
                        Some(el) => el.inner_text().await.ok().flatten(),
                        None => None,
                    },
                    Err(e) => {
                        trace!("Selector lookup failed, trying next strategy: {}", e);
                        None
                    }
                },
                TextSource::Attr(selector, attr) => match session.locate_all(selector).await {
                    Ok(elements) => match elements.first() {
                        Some(el) => el.attribute(attr).await.ok().flatten(),
                        None => None,
                    },
                    Err(e) => {
                        trace!("Selector lookup failed, trying next strategy: {}", e);
                        None
                    }
                },
                TextSource::Joined(selector, separator) => {
                    let texts = self.all_texts(session, selector).await;
                    (!texts.is_empty()).then(|| texts.join(separator))
                }
            };

            if let Some(value) = value {
                let value = value.trim().to_string();
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        None
    }

    async fn all_texts<S: NavigationSession>(&self, session: &S, selector: &str) -> Vec<String> {
        let Ok(elements) = session.locate_all(selector).await else {
            return Vec::new();
        };

        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            if let Ok(Some(text)) = element.inner_text().await {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    texts.push(text);
                }
            }
        }
        texts
    }

    /// Switch the panel to the named tab, best-effort
    async fn open_tab<S: NavigationSession>(&self, session: &S, label: &str) {
        let Ok(tabs) = session.locate_all("button[role='tab']").await else {
            return;
        };
        for tab in tabs {
            if let Ok(Some(text)) = tab.inner_text().await
                && text.contains(label)
            {
                if tab.click().await.is_ok() {
                    self.clock.sleep(self.settle_delay).await;
                }
                return;
            }
        }
    }

    /// The long description lives under the About tab on most listings;
    /// some render it inline so both paths are tried
    async fn read_description<S: NavigationSession>(&self, session: &S) -> Option<String> {
        self.open_tab(session, "About").await;
        let description = self.first_of(session, DESCRIPTION_SOURCES).await;
        self.open_tab(session, "Overview").await;
        description
    }

    async fn read_stars<S: NavigationSession>(&self, session: &S) -> Option<i64> {
        let value = session.run_script(STARS_SCRIPT).await.ok()?;
        parse_leading_int(value.as_str()?)
    }

    async fn read_coordinates<S: NavigationSession>(&self, session: &S) -> Option<(f64, f64)> {
        let url = session.current_url().await.ok().flatten()?;
        parse_coordinates(&url)
    }
}

#[async_trait]
impl<S: NavigationSession, C: Clock> FieldExtractor<S> for PanelExtractor<C> {
    async fn extract(
        &self,
        session: &S,
        item: &ItemReference,
        product_type: ProductType,
    ) -> ScrapeResult<RawRecord> {
        session.navigate(&item.identity_key).await?;
        self.clock.sleep(self.settle_delay).await;

        // Name is the one required field; the card preview is the fallback
        let name = match self.first_of(session, NAME_SOURCES).await {
            Some(name) => name,
            None => item
                .preview_name
                .clone()
                .ok_or_else(|| ScrapeError::Transient("item name not found".to_string()))?,
        };

        let mut record = RawRecord {
            name,
            card_href: Some(item.identity_key.clone()),
            ..Default::default()
        };

        record.description = self.read_description(session).await;
        record.link = self.first_of(session, LINK_SOURCES).await;
        record.rating = self
            .first_of(session, RATING_SOURCES)
            .await
            .as_deref()
            .and_then(parse_rating);
        record.rating_count = self
            .first_of(session, RATING_COUNT_SOURCES)
            .await
            .as_deref()
            .and_then(parse_rating_count);
        record.phone = self.first_of(session, PHONE_SOURCES).await;
        record.address = self.first_of(session, ADDRESS_SOURCES).await;
        record.price = self
            .first_of(session, PRICE_SOURCES)
            .await
            .map(|v| parse_price(&v));
        record.operating_hours = self.first_of(session, HOURS_SOURCES).await;
        record.images = self
            .first_of(session, IMAGE_SOURCES)
            .await
            .into_iter()
            .collect();
        record.facilities = self.all_texts(session, FACILITY_LIST_SELECTOR).await;

        if product_type == ProductType::Hotel {
            record.stars = self.read_stars(session).await;
        }

        if let Some((lat, lon)) = self.read_coordinates(session).await {
            record.latitude = Some(lat);
            record.longitude = Some(lon);
        }

        debug!(
            "Extracted '{}' (rating: {:?}, coords: {:?}/{:?})",
            record.name, record.rating, record.latitude, record.longitude
        );
        Ok(record)
    }

    async fn extract_field(
        &self,
        session: &S,
        column: BackfillColumn,
    ) -> ScrapeResult<Option<FieldValue>> {
        let value = match column {
            BackfillColumn::Name => self
                .first_of(session, NAME_SOURCES)
                .await
                .map(FieldValue::Text),
            BackfillColumn::Description => {
                self.read_description(session).await.map(FieldValue::Text)
            }
            BackfillColumn::Link => self
                .first_of(session, LINK_SOURCES)
                .await
                .map(FieldValue::Text),
            BackfillColumn::Images => self
                .first_of(session, IMAGE_SOURCES)
                .await
                .map(FieldValue::Text),
            BackfillColumn::Rating => self
                .first_of(session, RATING_SOURCES)
                .await
                .as_deref()
                .and_then(parse_rating)
                .map(FieldValue::Real),
            BackfillColumn::RatingCount => self
                .first_of(session, RATING_COUNT_SOURCES)
                .await
                .as_deref()
                .and_then(parse_rating_count)
                .map(FieldValue::Int),
            BackfillColumn::Facilities => {
                let facilities = self.all_texts(session, FACILITY_LIST_SELECTOR).await;
                (!facilities.is_empty()).then(|| FieldValue::Text(join_list(&facilities)))
            }
            BackfillColumn::Latitude => self
                .read_coordinates(session)
                .await
                .map(|(lat, _)| FieldValue::Real(lat)),
            BackfillColumn::Longitude => self
                .read_coordinates(session)
                .await
                .map(|(_, lon)| FieldValue::Real(lon)),
            BackfillColumn::Phone => self
                .first_of(session, PHONE_SOURCES)
                .await
                .map(FieldValue::Text),
            BackfillColumn::Address => self
                .first_of(session, ADDRESS_SOURCES)
                .await
                .map(FieldValue::Text),
            BackfillColumn::Stars => self.read_stars(session).await.map(FieldValue::Int),
            BackfillColumn::Price => self
                .first_of(session, PRICE_SOURCES)
                .await
                .map(|v| FieldValue::Text(parse_price(&v))),
            BackfillColumn::OperatingHours => self
                .first_of(session, HOURS_SOURCES)
                .await
                .map(FieldValue::Text),
        };
        Ok(value)
    }
}
