//! End-to-end runs over fake sessions and a real SQLite store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use placescrape::engine::types::{ProductType, RawRecord};
use placescrape::engine::{
    ActionExecutor, BackfillRun, QuotaBackoffPolicy, PaginationScanner, ScrapeRun,
};
use placescrape::engine::errors::ScrapeError;
use placescrape::session::SessionManager;
use placescrape::store::reconciler::Reconciler;
use placescrape::store::{BackfillColumn, FieldValue, RecordStore, SqliteStore};
use placescrape::ScrapeConfig;

use common::{CountStep, FakeClock, FakeElement, FakeExtractor, FakeSession, shared_factory};

fn executor_over(
    session: &FakeSession,
    clock: &Arc<FakeClock>,
) -> Arc<ActionExecutor<FakeSession, FakeClock>> {
    let manager = Arc::new(SessionManager::new(
        shared_factory(session),
        Arc::clone(clock),
        Duration::from_secs(30),
    ));
    let quota = Arc::new(QuotaBackoffPolicy::new(
        Arc::clone(clock),
        Duration::from_secs(10),
        Duration::from_secs(1),
        9,
    ));
    Arc::new(ActionExecutor::new(
        manager,
        quota,
        Arc::clone(clock),
        Duration::from_millis(10),
    ))
}

fn config(product_type: ProductType) -> ScrapeConfig {
    ScrapeConfig::builder()
        .product_type(product_type)
        .location("Lima")
        .search_terms(["cafe"])
        .max_retries(2)
        .settle_delay_ms(1)
        .feed_wait_timeout_secs(1)
        .build()
        .unwrap()
}

fn seeded_session(keys: &[&str]) -> FakeSession {
    let session = FakeSession::with_counts([CountStep::Count(keys.len() as u64)]);
    *session.cards.lock().unwrap() = keys
        .iter()
        .map(|key| FakeElement::card(key, &format!("Place {key}")))
        .collect();
    session
}

fn record_for(name: &str, lat: f64, lon: f64) -> RawRecord {
    RawRecord {
        name: name.to_string(),
        latitude: Some(lat),
        longitude: Some(lon),
        phone: Some("+51 1 000 0000".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn repeated_runs_insert_then_update() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FakeClock::new());
    let session = seeded_session(&["https://maps.example/a", "https://maps.example/b"]);
    let executor = executor_over(&session, &clock);

    let extractor = FakeExtractor::new()
        .with_record("https://maps.example/a", record_for("Cafe A", 1.0, 2.0))
        .with_record("https://maps.example/b", record_for("Cafe B", 3.0, 4.0));

    let store = SqliteStore::open(&dir.path().join("test.db")).await.unwrap();
    let run = ScrapeRun::new(
        Arc::clone(&executor),
        PaginationScanner::new(Arc::clone(&executor), Arc::clone(&clock)),
        extractor,
        Reconciler::new(store.clone(), 0.001),
        Arc::clone(&clock),
        config(ProductType::Gastronomy),
    );

    let first = run.run().await;
    assert_eq!(first.terms_completed, 1);
    assert_eq!(first.inserted, 2);
    assert_eq!(first.updated, 0);
    assert!(first.fatal.is_none());

    let second = run.run().await;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 2);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn one_failing_item_does_not_fail_the_term() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FakeClock::new());
    let session = seeded_session(&[
        "https://maps.example/a",
        "https://maps.example/broken",
        "https://maps.example/c",
    ]);
    let executor = executor_over(&session, &clock);

    let extractor = FakeExtractor::new()
        .with_record("https://maps.example/a", record_for("Cafe A", 1.0, 2.0))
        .with_failure(
            "https://maps.example/broken",
            ScrapeError::Transient("panel never rendered".to_string()),
        )
        .with_record("https://maps.example/c", record_for("Cafe C", 3.0, 4.0));

    let store = SqliteStore::open(&dir.path().join("test.db")).await.unwrap();
    let run = ScrapeRun::new(
        Arc::clone(&executor),
        PaginationScanner::new(Arc::clone(&executor), Arc::clone(&clock)),
        extractor,
        Reconciler::new(store, 0.001),
        Arc::clone(&clock),
        config(ProductType::Gastronomy),
    );

    let summary = run.run().await;
    assert_eq!(summary.terms_completed, 1);
    assert_eq!(summary.items_processed, 3);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.fatal.is_none());
}

#[tokio::test]
async fn fatal_extraction_stops_the_run_and_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FakeClock::new());
    let session = seeded_session(&["https://maps.example/a"]);
    let executor = executor_over(&session, &clock);

    let extractor = FakeExtractor::new().with_failure(
        "https://maps.example/a",
        ScrapeError::Fatal("browser cannot start".to_string()),
    );

    let store = SqliteStore::open(&dir.path().join("test.db")).await.unwrap();
    let two_terms = ScrapeConfig::builder()
        .product_type(ProductType::Hotel)
        .location("Lima")
        .search_terms(["hotel", "hostal"])
        .max_retries(2)
        .settle_delay_ms(1)
        .feed_wait_timeout_secs(1)
        .build()
        .unwrap();
    let run = ScrapeRun::new(
        Arc::clone(&executor),
        PaginationScanner::new(Arc::clone(&executor), Arc::clone(&clock)),
        extractor,
        Reconciler::new(store, 0.001),
        Arc::clone(&clock),
        two_terms,
    );

    let summary = run.run().await;
    assert!(summary.fatal.is_some());
    // the second term is never attempted after a fatal error
    assert_eq!(summary.terms_attempted, 1);
    assert_eq!(summary.terms_completed, 0);
}

#[tokio::test]
async fn max_results_caps_the_items_processed() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FakeClock::new());
    let session = seeded_session(&["https://maps.example/a", "https://maps.example/b"]);
    let executor = executor_over(&session, &clock);

    let extractor = FakeExtractor::new()
        .with_record("https://maps.example/a", record_for("Cafe A", 1.0, 2.0))
        .with_record("https://maps.example/b", record_for("Cafe B", 3.0, 4.0));

    let store = SqliteStore::open(&dir.path().join("test.db")).await.unwrap();
    let capped = ScrapeConfig::builder()
        .product_type(ProductType::Gastronomy)
        .location("Lima")
        .search_terms(["cafe"])
        .max_results(1)
        .max_retries(2)
        .settle_delay_ms(1)
        .feed_wait_timeout_secs(1)
        .build()
        .unwrap();
    let run = ScrapeRun::new(
        Arc::clone(&executor),
        PaginationScanner::new(Arc::clone(&executor), Arc::clone(&clock)),
        extractor,
        Reconciler::new(store, 0.001),
        Arc::clone(&clock),
        capped,
    );

    let summary = run.run().await;
    assert_eq!(summary.items_processed, 1);
    assert_eq!(summary.inserted, 1);
}

#[tokio::test]
async fn a_failed_term_leaves_the_exhaustion_counter_alone() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FakeClock::new());
    let session = seeded_session(&["https://maps.example/a"]);
    // both navigation attempts fail, so the term ends without one successful call
    *session.navigation_errors.lock().unwrap() = [
        ScrapeError::Transient("net::ERR_CONNECTION_RESET".to_string()),
        ScrapeError::Transient("net::ERR_CONNECTION_RESET".to_string()),
    ]
    .into();
    let executor = executor_over(&session, &clock);

    let quota = Arc::clone(executor.quota());
    quota.on_quota_exhausted("retryDelay: 1s").await.unwrap();
    quota.on_quota_exhausted("retryDelay: 1s").await.unwrap();
    assert_eq!(quota.consecutive_exhaustions(), 2);

    let store = SqliteStore::open(&dir.path().join("test.db")).await.unwrap();
    let run = ScrapeRun::new(
        Arc::clone(&executor),
        PaginationScanner::new(Arc::clone(&executor), Arc::clone(&clock)),
        FakeExtractor::new(),
        Reconciler::new(store, 0.001),
        Arc::clone(&clock),
        config(ProductType::Gastronomy),
    );

    let summary = run.run().await;
    assert_eq!(summary.terms_completed, 0);
    assert!(summary.fatal.is_none());

    // only a successful call resets the counter, not a skipped term
    assert_eq!(quota.consecutive_exhaustions(), 2);
}

#[tokio::test]
async fn backfill_refills_missing_columns_through_stored_links() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FakeClock::new());
    let session = FakeSession::new();
    let executor = executor_over(&session, &clock);

    let store = SqliteStore::open(&dir.path().join("test.db")).await.unwrap();
    let mut revisitable = record_for("Cafe A", 1.0, 2.0);
    revisitable.phone = None;
    revisitable.card_href = Some("https://maps.example/a".to_string());
    let id = store
        .insert(ProductType::Gastronomy, &revisitable)
        .await
        .unwrap();

    // no stored link, cannot be revisited
    let mut stranded = record_for("Cafe B", 3.0, 4.0);
    stranded.phone = None;
    store.insert(ProductType::Gastronomy, &stranded).await.unwrap();

    let mut extractor = FakeExtractor::new();
    extractor.field_value = Some(FieldValue::Text("+51 1 234 5678".to_string()));

    let backfill = BackfillRun::new(
        executor,
        extractor,
        store.clone(),
        clock,
        2,
        Duration::from_millis(1),
    );
    let summary = backfill.run(BackfillColumn::Phone, None).await;

    assert_eq!(summary.items_processed, 2);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.fatal.is_none());

    let phone: Option<String> = sqlx::query_scalar("SELECT phone FROM products WHERE id = ?")
        .bind(id)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(phone.as_deref(), Some("+51 1 234 5678"));
    // session was pointed at the stored link before re-extraction
    assert!(
        session
            .navigations
            .lock()
            .unwrap()
            .contains(&"https://maps.example/a".to_string())
    );
}
