//! Identity-key deduplication across repeated feed reads.

mod common;

use placescrape::engine::ItemCollector;

use common::FakeElement;

fn card(href: &str, name: &str) -> FakeElement {
    FakeElement::card(href, name)
}

#[tokio::test]
async fn duplicates_within_one_read_collapse_in_order() {
    let mut collector = ItemCollector::new();
    let cards = [
        card("https://maps.example/place/a", "A"),
        card("https://maps.example/place/b", "B"),
        card("https://maps.example/place/a", "A again"),
        card("https://maps.example/place/c", "C"),
    ];

    let refs = collector.collect(&cards).await;

    let keys: Vec<&str> = refs.iter().map(|r| r.identity_key.as_str()).collect();
    assert_eq!(
        keys,
        [
            "https://maps.example/place/a",
            "https://maps.example/place/b",
            "https://maps.example/place/c",
        ]
    );
    assert_eq!(refs[0].preview_name.as_deref(), Some("A"));
    assert_eq!(collector.seen_count(), 3);
}

#[tokio::test]
async fn second_read_returns_only_new_items() {
    let mut collector = ItemCollector::new();
    let first = [
        card("https://maps.example/place/a", "A"),
        card("https://maps.example/place/b", "B"),
    ];
    assert_eq!(collector.collect(&first).await.len(), 2);

    // after further pagination the feed re-renders the old cards too
    let second = [
        card("https://maps.example/place/a", "A"),
        card("https://maps.example/place/b", "B"),
        card("https://maps.example/place/c", "C"),
    ];
    let refs = collector.collect(&second).await;

    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].identity_key, "https://maps.example/place/c");
    assert_eq!(collector.seen_count(), 3);
}

#[tokio::test]
async fn fragments_do_not_defeat_deduplication() {
    let mut collector = ItemCollector::new();
    let cards = [
        card("https://maps.example/place/a?hl=en#top", "A"),
        card("https://maps.example/place/a?hl=en", "A"),
    ];

    let refs = collector.collect(&cards).await;
    assert_eq!(refs.len(), 1);
}

#[tokio::test]
async fn cards_without_a_link_are_skipped() {
    let mut collector = ItemCollector::new();
    let cards = [
        FakeElement {
            href: None,
            name: Some("ad slot".to_string()),
            facets: Vec::new(),
        },
        card("https://maps.example/place/a", "A"),
    ];

    let refs = collector.collect(&cards).await;
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].preview_name.as_deref(), Some("A"));
}
