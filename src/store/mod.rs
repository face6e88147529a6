//! Persistent record store backed by SQLite.
//!
//! The store keeps one row per real-world place in a `products` table and
//! exposes the narrow query surface the reconciler needs: window-filtered
//! match lookup, insert, partial update, and the missing-column scan used by
//! the backfill pass. The engine never deletes rows.

pub mod reconciler;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::engine::errors::ScrapeResult;
use crate::engine::types::{ProductType, RawRecord};
use crate::extract::parse::join_list;

/// SQL schema, applied idempotently at open
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_type TEXT NOT NULL,
    name TEXT,
    description TEXT,
    link TEXT,
    images TEXT,
    rating REAL,
    rating_count INTEGER,
    facilities TEXT,
    latitude REAL,
    longitude REAL,
    phone TEXT,
    address TEXT,
    stars INTEGER,
    price TEXT,
    operating_hours TEXT,
    card_href TEXT,
    scraped_at TEXT
);

-- Covers both the windowed match query and the name fallback
CREATE INDEX IF NOT EXISTS idx_products_type_name ON products(product_type, name);
"#;

/// One stored row from the `products` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersistentRecord {
    pub id: i64,
    pub product_type: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub images: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub facilities: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub stars: Option<i64>,
    pub price: Option<String>,
    pub operating_hours: Option<String>,
    pub card_href: Option<String>,
    pub scraped_at: Option<String>,
}

/// Coordinate window for fuzzy matching; half-width `tolerance` in degrees
#[derive(Debug, Clone, Copy)]
pub struct CoordWindow {
    pub latitude: f64,
    pub longitude: f64,
    pub tolerance: f64,
}

/// Match query: `(product_type, name)` plus an optional coordinate window
#[derive(Debug, Clone)]
pub struct RecordFilter {
    pub product_type: ProductType,
    pub name: String,
    pub coords: Option<CoordWindow>,
}

/// Typed value for one column write
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Real(f64),
    Int(i64),
}

/// Columns eligible for backfill.
///
/// Closed enum so the column name interpolated into SQL always comes from
/// this list, never from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillColumn {
    Name,
    Description,
    Link,
    Images,
    Rating,
    RatingCount,
    Facilities,
    Latitude,
    Longitude,
    Phone,
    Address,
    Stars,
    Price,
    OperatingHours,
}

impl BackfillColumn {
    pub const ALL: [Self; 14] = [
        Self::Name,
        Self::Description,
        Self::Link,
        Self::Images,
        Self::Rating,
        Self::RatingCount,
        Self::Facilities,
        Self::Latitude,
        Self::Longitude,
        Self::Phone,
        Self::Address,
        Self::Stars,
        Self::Price,
        Self::OperatingHours,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Link => "link",
            Self::Images => "images",
            Self::Rating => "rating",
            Self::RatingCount => "rating_count",
            Self::Facilities => "facilities",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::Stars => "stars",
            Self::Price => "price",
            Self::OperatingHours => "operating_hours",
        }
    }
}

impl fmt::Display for BackfillColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackfillColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown column '{s}'"))
    }
}

/// Set of column assignments for a partial row update
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    fields: Vec<(&'static str, FieldValue)>,
}

impl FieldPatch {
    /// Build a patch from the non-null fields of a raw record.
    ///
    /// Absent fields stay out of the patch entirely, so an update never nulls
    /// a column a previous run managed to fill. Refreshes `scraped_at`.
    #[must_use]
    pub fn from_raw(raw: &RawRecord) -> Self {
        let mut patch = Self::default();
        patch.set("name", FieldValue::Text(raw.name.clone()));

        if let Some(v) = &raw.description {
            patch.set("description", FieldValue::Text(v.clone()));
        }
        if let Some(v) = &raw.link {
            patch.set("link", FieldValue::Text(v.clone()));
        }
        if !raw.images.is_empty() {
            patch.set("images", FieldValue::Text(join_list(&raw.images)));
        }
        if let Some(v) = raw.rating {
            patch.set("rating", FieldValue::Real(v));
        }
        if let Some(v) = raw.rating_count {
            patch.set("rating_count", FieldValue::Int(v));
        }
        if !raw.facilities.is_empty() {
            patch.set("facilities", FieldValue::Text(join_list(&raw.facilities)));
        }
        if let Some(v) = raw.latitude {
            patch.set("latitude", FieldValue::Real(v));
        }
        if let Some(v) = raw.longitude {
            patch.set("longitude", FieldValue::Real(v));
        }
        if let Some(v) = &raw.phone {
            patch.set("phone", FieldValue::Text(v.clone()));
        }
        if let Some(v) = &raw.address {
            patch.set("address", FieldValue::Text(v.clone()));
        }
        if let Some(v) = raw.stars {
            patch.set("stars", FieldValue::Int(v));
        }
        if let Some(v) = &raw.price {
            patch.set("price", FieldValue::Text(v.clone()));
        }
        if let Some(v) = &raw.operating_hours {
            patch.set("operating_hours", FieldValue::Text(v.clone()));
        }
        if let Some(v) = &raw.card_href {
            patch.set("card_href", FieldValue::Text(v.clone()));
        }
        patch.set("scraped_at", FieldValue::Text(Utc::now().to_rfc3339()));
        patch
    }

    pub fn set(&mut self, column: &'static str, value: FieldValue) {
        self.fields.push((column, value));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }
}

/// Persistence seam for the reconciler and the backfill pass
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows matching the filter; the coordinate window is inclusive
    async fn find_matches(&self, filter: &RecordFilter) -> ScrapeResult<Vec<PersistentRecord>>;

    /// Insert a new row, returning its id
    async fn insert(&self, product_type: ProductType, record: &RawRecord) -> ScrapeResult<i64>;

    /// Apply a partial update; `true` when a row was changed
    async fn update(&self, id: i64, patch: &FieldPatch) -> ScrapeResult<bool>;

    /// Rows whose `column` is NULL or empty, optionally scoped to one type
    async fn find_missing(
        &self,
        column: BackfillColumn,
        product_type: Option<ProductType>,
    ) -> ScrapeResult<Vec<PersistentRecord>>;

    /// Set a single column, NULL when `value` is absent
    async fn update_column(
        &self,
        id: i64,
        column: BackfillColumn,
        value: Option<FieldValue>,
    ) -> ScrapeResult<bool>;
}

/// SQLite-backed implementation of [`RecordStore`]
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database at `db_path`, creating file and schema as needed
    pub async fn open(db_path: &Path) -> ScrapeResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        info!("Opened record store at {}", db_path.display());
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_matches(&self, filter: &RecordFilter) -> ScrapeResult<Vec<PersistentRecord>> {
        let rows = match filter.coords {
            Some(window) => {
                sqlx::query_as::<_, PersistentRecord>(
                    r#"
                    SELECT * FROM products
                    WHERE product_type = ? AND name = ?
                      AND latitude BETWEEN ? AND ?
                      AND longitude BETWEEN ? AND ?
                    "#,
                )
                .bind(filter.product_type.as_str())
                .bind(&filter.name)
                .bind(window.latitude - window.tolerance)
                .bind(window.latitude + window.tolerance)
                .bind(window.longitude - window.tolerance)
                .bind(window.longitude + window.tolerance)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, PersistentRecord>(
                    "SELECT * FROM products WHERE product_type = ? AND name = ?",
                )
                .bind(filter.product_type.as_str())
                .bind(&filter.name)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn insert(&self, product_type: ProductType, record: &RawRecord) -> ScrapeResult<i64> {
        let images = (!record.images.is_empty()).then(|| join_list(&record.images));
        let facilities = (!record.facilities.is_empty()).then(|| join_list(&record.facilities));

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                product_type, name, description, link, images,
                rating, rating_count, facilities, latitude, longitude,
                phone, address, stars, price, operating_hours,
                card_href, scraped_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product_type.as_str())
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.link)
        .bind(images)
        .bind(record.rating)
        .bind(record.rating_count)
        .bind(facilities)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(&record.phone)
        .bind(&record.address)
        .bind(record.stars)
        .bind(&record.price)
        .bind(&record.operating_hours)
        .bind(&record.card_href)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Inserted record {} ({})", id, record.name);
        Ok(id)
    }

    async fn update(&self, id: i64, patch: &FieldPatch) -> ScrapeResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        // Column names are &'static str from our own code, safe to splice
        let set_clause = patch
            .fields()
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE products SET {set_clause} WHERE id = ?");

        let mut query = sqlx::query(&sql);
        for (_, value) in patch.fields() {
            query = match value {
                FieldValue::Text(v) => query.bind(v),
                FieldValue::Real(v) => query.bind(v),
                FieldValue::Int(v) => query.bind(v),
            };
        }
        let result = query.bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_missing(
        &self,
        column: BackfillColumn,
        product_type: Option<ProductType>,
    ) -> ScrapeResult<Vec<PersistentRecord>> {
        let col = column.as_str();
        let mut sql = format!("SELECT * FROM products WHERE ({col} = '' OR {col} IS NULL)");
        if product_type.is_some() {
            sql.push_str(" AND product_type = ?");
        }

        let mut query = sqlx::query_as::<_, PersistentRecord>(&sql);
        if let Some(pt) = product_type {
            query = query.bind(pt.as_str());
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn update_column(
        &self,
        id: i64,
        column: BackfillColumn,
        value: Option<FieldValue>,
    ) -> ScrapeResult<bool> {
        let sql = format!("UPDATE products SET {} = ? WHERE id = ?", column.as_str());

        let query = sqlx::query(&sql);
        let query = match value {
            Some(FieldValue::Text(v)) => query.bind(v),
            Some(FieldValue::Real(v)) => query.bind(v),
            Some(FieldValue::Int(v)) => query.bind(v),
            None => query.bind(Option::<String>::None),
        };
        let result = query.bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backfill_column_parses_known_names() {
        assert_eq!(
            "rating_count".parse::<BackfillColumn>(),
            Ok(BackfillColumn::RatingCount)
        );
        assert!("id".parse::<BackfillColumn>().is_err());
        assert!("name; DROP TABLE products".parse::<BackfillColumn>().is_err());
    }

    #[test]
    fn patch_skips_absent_fields() {
        let raw = RawRecord {
            name: "Hotel X".to_string(),
            rating: Some(4.5),
            ..Default::default()
        };
        let patch = FieldPatch::from_raw(&raw);
        let columns: Vec<&str> = patch.fields().iter().map(|(c, _)| *c).collect();
        assert!(columns.contains(&"name"));
        assert!(columns.contains(&"rating"));
        assert!(columns.contains(&"scraped_at"));
        assert!(!columns.contains(&"description"));
        assert!(!columns.contains(&"latitude"));
    }
}
