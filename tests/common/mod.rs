//! Fake collaborators for deterministic engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};

use placescrape::clock::Clock;
use placescrape::engine::errors::{ScrapeError, ScrapeResult};
use placescrape::engine::types::{ITEM_CARD_SELECTOR, ItemReference, ProductType, RawRecord};
use placescrape::extract::FieldExtractor;
use placescrape::session::handle::{ElementRef, NavigationSession};
use placescrape::store::{BackfillColumn, FieldValue};

/// Clock that advances instantly on sleep and records every sleep duration
pub struct FakeClock {
    start: Instant,
    elapsed: Mutex<Duration>,
    pub sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn sleep_count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }

    #[allow(dead_code)]
    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Feed card fake with a fixed link, preview name, and facets
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub href: Option<String>,
    pub name: Option<String>,
    pub facets: Vec<String>,
}

impl FakeElement {
    #[allow(dead_code)]
    pub fn card(href: &str, name: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            name: Some(name.to_string()),
            facets: Vec::new(),
        }
    }
}

#[async_trait]
impl ElementRef for FakeElement {
    async fn attribute(&self, name: &str) -> ScrapeResult<Option<String>> {
        Ok((name == "href").then(|| self.href.clone()).flatten())
    }

    async fn inner_text(&self) -> ScrapeResult<Option<String>> {
        Ok(self.name.clone())
    }

    async fn child_attribute(&self, _selector: &str, name: &str) -> ScrapeResult<Option<String>> {
        Ok((name == "href").then(|| self.href.clone()).flatten())
    }

    async fn query_texts(&self, selector: &str) -> ScrapeResult<Vec<String>> {
        if selector.contains("qBF1Pd") {
            Ok(self.name.clone().into_iter().collect())
        } else if selector.contains("W4Efsd") {
            Ok(self.facets.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn click(&self) -> ScrapeResult<()> {
        Ok(())
    }
}

/// One scripted response for the item-count query
#[derive(Debug, Clone)]
pub enum CountStep {
    Count(u64),
    Fail(String),
    FatalFail(String),
}

/// Scriptable navigation session.
///
/// Counting queries pop from `count_steps` (the last count repeats once the
/// script runs dry); card lookups return `cards`; everything else succeeds.
pub struct FakeSession {
    pub alive: Arc<AtomicBool>,
    pub count_steps: Arc<Mutex<VecDeque<CountStep>>>,
    last_count: Mutex<u64>,
    pub cards: Arc<Mutex<Vec<FakeElement>>>,
    pub navigations: Arc<Mutex<Vec<String>>>,
    /// Errors to fail the next navigations with, in order
    pub navigation_errors: Arc<Mutex<VecDeque<ScrapeError>>>,
    pub url: Mutex<Option<String>>,
}

impl FakeSession {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
            count_steps: Arc::new(Mutex::new(VecDeque::new())),
            last_count: Mutex::new(0),
            cards: Arc::new(Mutex::new(Vec::new())),
            navigations: Arc::new(Mutex::new(Vec::new())),
            navigation_errors: Arc::new(Mutex::new(VecDeque::new())),
            url: Mutex::new(None),
        }
    }

    #[allow(dead_code)]
    pub fn with_counts(counts: impl IntoIterator<Item = CountStep>) -> Self {
        let session = Self::new();
        *session.count_steps.lock().unwrap() = counts.into_iter().collect();
        session
    }

    /// New session handle over the same shared state, as a recreation would
    /// produce in these tests
    #[allow(dead_code)]
    pub fn share(&self) -> Self {
        Self {
            alive: Arc::clone(&self.alive),
            count_steps: Arc::clone(&self.count_steps),
            last_count: Mutex::new(0),
            cards: Arc::clone(&self.cards),
            navigations: Arc::clone(&self.navigations),
            navigation_errors: Arc::clone(&self.navigation_errors),
            url: Mutex::new(None),
        }
    }
}

/// Factory producing handles that share `template`'s scripted state
#[allow(dead_code)]
pub fn shared_factory(
    template: &FakeSession,
) -> placescrape::session::SessionFactory<FakeSession> {
    let template = template.share();
    Arc::new(move || {
        let session = template.share();
        Box::pin(async move { Ok(session) })
    })
}

#[async_trait]
impl NavigationSession for FakeSession {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> ScrapeResult<()> {
        if let Some(error) = self.navigation_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.navigations.lock().unwrap().push(url.to_string());
        *self.url.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn run_script(&self, js: &str) -> ScrapeResult<Value> {
        if js.contains("querySelectorAll") {
            let step = self.count_steps.lock().unwrap().pop_front();
            return match step {
                Some(CountStep::Count(n)) => {
                    *self.last_count.lock().unwrap() = n;
                    Ok(json!(n))
                }
                Some(CountStep::Fail(msg)) => Err(ScrapeError::Transient(msg)),
                Some(CountStep::FatalFail(msg)) => Err(ScrapeError::Fatal(msg)),
                None => Ok(json!(*self.last_count.lock().unwrap())),
            };
        }
        if js.contains("scrollTop") {
            return Ok(json!(true));
        }
        if js.contains("!== null") {
            return Ok(json!(true));
        }
        Ok(Value::Null)
    }

    async fn locate_all(&self, selector: &str) -> ScrapeResult<Vec<Self::Element>> {
        if selector == ITEM_CARD_SELECTOR {
            Ok(self.cards.lock().unwrap().clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn current_url(&self) -> ScrapeResult<Option<String>> {
        Ok(self.url.lock().unwrap().clone())
    }
}

/// Extractor returning canned records keyed by identity key
pub struct FakeExtractor {
    pub records: HashMap<String, RawRecord>,
    /// Keys whose extraction fails with the given error message
    pub failures: HashMap<String, ScrapeError>,
    /// Returned by every `extract_field` call
    pub field_value: Option<FieldValue>,
}

impl FakeExtractor {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            failures: HashMap::new(),
            field_value: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_record(mut self, key: &str, record: RawRecord) -> Self {
        self.records.insert(key.to_string(), record);
        self
    }

    #[allow(dead_code)]
    pub fn with_failure(mut self, key: &str, error: ScrapeError) -> Self {
        self.failures.insert(key.to_string(), error);
        self
    }
}

#[async_trait]
impl<S: NavigationSession> FieldExtractor<S> for FakeExtractor {
    async fn extract(
        &self,
        session: &S,
        item: &ItemReference,
        _product_type: ProductType,
    ) -> ScrapeResult<RawRecord> {
        session.navigate(&item.identity_key).await?;

        if let Some(error) = self.failures.get(&item.identity_key) {
            return Err(error.clone());
        }
        self.records
            .get(&item.identity_key)
            .cloned()
            .ok_or_else(|| ScrapeError::Transient("no canned record".to_string()))
    }

    async fn extract_field(
        &self,
        _session: &S,
        _column: BackfillColumn,
    ) -> ScrapeResult<Option<FieldValue>> {
        Ok(self.field_value.clone())
    }
}

/// Raw record with just a name and coordinates
#[allow(dead_code)]
pub fn raw_record(name: &str, lat: f64, lon: f64) -> RawRecord {
    RawRecord {
        name: name.to_string(),
        latitude: Some(lat),
        longitude: Some(lon),
        ..Default::default()
    }
}
