//! Classified retry behavior of the action executor.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use placescrape::engine::errors::ScrapeError;
use placescrape::engine::{ActionExecutor, QuotaBackoffPolicy};
use placescrape::session::{SessionFactory, SessionManager};

use common::{FakeClock, FakeSession, shared_factory};

fn executor_over(
    factory: SessionFactory<FakeSession>,
    clock: Arc<FakeClock>,
) -> ActionExecutor<FakeSession, FakeClock> {
    let manager = Arc::new(SessionManager::new(
        factory,
        Arc::clone(&clock),
        Duration::from_secs(30),
    ));
    let quota = Arc::new(QuotaBackoffPolicy::new(
        Arc::clone(&clock),
        Duration::from_secs(10),
        Duration::from_secs(1),
        9,
    ));
    ActionExecutor::new(manager, quota, clock, Duration::from_millis(50))
}

#[tokio::test]
async fn transient_failure_consumes_whole_attempt_budget() {
    let clock = Arc::new(FakeClock::new());
    let executor = executor_over(shared_factory(&FakeSession::new()), Arc::clone(&clock));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let result: Result<(), _> = executor
        .execute(
            move |_s| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ScrapeError::Transient("element not found".to_string()))
                })
            },
            3,
        )
        .await;

    assert!(matches!(result, Err(ScrapeError::Transient(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // two retry delays, no third sleep after the final attempt
    assert_eq!(clock.sleep_count(), 2);
}

#[tokio::test]
async fn session_loss_recreates_and_retries() {
    let clock = Arc::new(FakeClock::new());

    let sessions_built = Arc::new(AtomicUsize::new(0));
    let factory: SessionFactory<FakeSession> = {
        let built = Arc::clone(&sessions_built);
        Arc::new(move || {
            built.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(FakeSession::new()) })
        })
    };
    let executor = executor_over(factory, clock);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let result = executor
        .execute(
            move |_s| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ScrapeError::SessionLost("target closed".to_string()))
                    } else {
                        Ok(42u32)
                    }
                })
            },
            3,
        )
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // initial launch plus one forced recreation
    assert_eq!(sessions_built.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fatal_fails_without_retry() {
    let clock = Arc::new(FakeClock::new());
    let executor = executor_over(shared_factory(&FakeSession::new()), Arc::clone(&clock));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let result: Result<(), _> = executor
        .execute(
            move |_s| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ScrapeError::Fatal("bad input".to_string()))
                })
            },
            5,
        )
        .await;

    assert!(matches!(result, Err(ScrapeError::Fatal(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(clock.sleep_count(), 0);
}

#[tokio::test]
async fn failing_factory_surfaces_as_fatal() {
    let clock = Arc::new(FakeClock::new());
    let factory: SessionFactory<FakeSession> = Arc::new(|| {
        Box::pin(async { Err(ScrapeError::Transient("chrome missing".to_string())) })
    });
    let executor = executor_over(factory, clock);

    let result: Result<(), _> = executor
        .execute(|_s| Box::pin(async { Ok(()) }), 3)
        .await;

    assert!(matches!(result, Err(ScrapeError::Fatal(_))));
}

#[tokio::test]
async fn health_probe_is_rate_limited() {
    let clock = Arc::new(FakeClock::new());
    let session = FakeSession::new();
    let executor = executor_over(shared_factory(&session), Arc::clone(&clock));

    executor
        .execute(|_s| Box::pin(async { Ok(()) }), 3)
        .await
        .unwrap();

    // Flip liveness; within the check interval the manager must keep trusting
    // its last probe instead of recreating
    session.alive.store(false, std::sync::atomic::Ordering::Relaxed);
    let state_before = executor.manager().session_state().await.unwrap();

    executor
        .execute(|_s| Box::pin(async { Ok(()) }), 3)
        .await
        .unwrap();

    let state_after = executor.manager().session_state().await.unwrap();
    assert_eq!(state_before.created_at, state_after.created_at);
    assert!(state_after.alive);
}
