//! Insert-or-update resolution of extracted records against the store.
//!
//! A raw record first looks for an existing row with the same type and name
//! whose coordinates fall inside a tolerance window, then falls back to a
//! name-only match. A hit becomes a partial update carrying only the fields
//! the extraction actually produced; a miss becomes an insert. Re-running a
//! query therefore refreshes rows instead of duplicating them.

use tracing::{debug, info};

use crate::engine::errors::ScrapeResult;
use crate::engine::types::{ProductType, RawRecord};
use crate::store::{CoordWindow, FieldPatch, PersistentRecord, RecordFilter, RecordStore};

/// What reconciliation did with one raw record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No existing row matched; a new row with this id was created
    Inserted(i64),
    /// An existing row with this id absorbed the record's non-null fields
    Updated(i64),
}

pub struct Reconciler<R> {
    store: R,
    /// Coordinate match half-width in degrees
    tolerance: f64,
}

impl<R: RecordStore> Reconciler<R> {
    pub fn new(store: R, tolerance: f64) -> Self {
        Self { store, tolerance }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Resolve `raw` to at most one stored row.
    ///
    /// Matching order: coordinate window on `(product_type, name)` when both
    /// coordinates are present, then name-only fallback. The fallback skips
    /// candidates whose stored coordinates conflict with the raw ones beyond
    /// the tolerance, so places sharing a name at different positions stay
    /// separate rows.
    pub async fn reconcile(
        &self,
        product_type: ProductType,
        raw: &RawRecord,
    ) -> ScrapeResult<ReconcileOutcome> {
        let mut matched: Option<PersistentRecord> = None;

        if let (Some(lat), Some(lon)) = (raw.latitude, raw.longitude) {
            let filter = RecordFilter {
                product_type,
                name: raw.name.clone(),
                coords: Some(CoordWindow {
                    latitude: lat,
                    longitude: lon,
                    tolerance: self.tolerance,
                }),
            };
            matched = self.store.find_matches(&filter).await?.into_iter().next();
        }

        if matched.is_none() {
            let filter = RecordFilter {
                product_type,
                name: raw.name.clone(),
                coords: None,
            };
            matched = self
                .store
                .find_matches(&filter)
                .await?
                .into_iter()
                .find(|row| self.coords_compatible(row, raw));
        }

        match matched {
            Some(row) => {
                let patch = FieldPatch::from_raw(raw);
                self.store.update(row.id, &patch).await?;
                debug!("Updated record {} ({})", row.id, raw.name);
                Ok(ReconcileOutcome::Updated(row.id))
            }
            None => {
                // rating is non-nullable historically: absent means 0.0 here,
                // while updates above never touch it when absent
                let mut merged = raw.clone();
                merged.rating = Some(merged.rating.unwrap_or(0.0));

                let id = self.store.insert(product_type, &merged).await?;
                info!("Inserted record {} ({})", id, raw.name);
                Ok(ReconcileOutcome::Inserted(id))
            }
        }
    }

    /// A fallback candidate is compatible unless both sides carry coordinates
    /// and they disagree beyond the tolerance
    fn coords_compatible(&self, row: &PersistentRecord, raw: &RawRecord) -> bool {
        match (row.latitude, row.longitude, raw.latitude, raw.longitude) {
            (Some(row_lat), Some(row_lon), Some(lat), Some(lon)) => {
                (row_lat - lat).abs() <= self.tolerance && (row_lon - lon).abs() <= self.tolerance
            }
            _ => true,
        }
    }
}
