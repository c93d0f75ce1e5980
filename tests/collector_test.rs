//! Scroll/dedupe behavior of the content collector against scripted pages

mod fixtures;
mod helpers;

use fixtures::*;
use helpers::*;
use std::sync::atomic::Ordering;
use ticker_scraper::error::WorkerError;
use ticker_scraper::services::collector::collect;

#[tokio::test]
async fn test_stalled_feed_runs_exactly_the_round_budget() {
    // The same two posts are rendered forever; nothing new ever appears.
    let page = ScriptedTab::new(vec![round_of(0..2, "$ABC")]);
    let counters = page.counters();

    let posts = collect(&page, "$ABC", &fast_limits(20, 3)).await.unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(counters.snapshots.load(Ordering::SeqCst), 3);
    assert_eq!(counters.scrolls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_empty_feed_returns_nothing_after_budget() {
    let page = ScriptedTab::new(vec![Vec::new()]);
    let counters = page.counters();

    let posts = collect(&page, "$ABC", &fast_limits(20, 4)).await.unwrap();

    assert!(posts.is_empty());
    assert_eq!(counters.snapshots.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_target_cutoff_keeps_first_seen_order() {
    // Overlapping windows, as a virtualized list re-renders the tail.
    let page = ScriptedTab::new(vec![
        round_of(0..8, "$ABC"),
        round_of(5..13, "$ABC"),
        round_of(10..18, "$ABC"),
    ]);
    let counters = page.counters();

    let posts = collect(&page, "$ABC", &fast_limits(12, 15)).await.unwrap();

    let expected: Vec<String> = (0..12).map(post_url).collect();
    let urls: Vec<String> = posts.iter().map(|p| p.url.clone()).collect();
    assert_eq!(urls, expected);
    // 8 after round one, 13 after round two: stops there.
    assert_eq!(counters.snapshots.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_remounted_post_keeps_first_content() {
    let page = ScriptedTab::new(vec![
        vec![post_html(1, "$ABC first render")],
        vec![post_html(1, "$ABC edited render"), post_html(2, "$ABC another")],
    ]);

    let posts = collect(&page, "$ABC", &fast_limits(20, 2)).await.unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].url, post_url(1));
    assert_eq!(posts[0].text, "$ABC first render");
    assert_eq!(posts[1].url, post_url(2));
}

#[tokio::test]
async fn test_unparseable_elements_are_skipped() {
    let page = ScriptedTab::new(vec![vec![
        broken_post_html(),
        post_html(1, "$ABC text"),
        "<article data-testid=\"tweet\"></article>".to_string(),
        media_post_html(2),
    ]]);

    let posts = collect(&page, "$ABC", &fast_limits(20, 1)).await.unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].author.handle, "@trader1");
    assert_eq!(posts[0].engagement.share_count, "0");
    assert!(posts[1].text.is_empty());
    assert_eq!(posts[1].media.images.len(), 1);
}

#[tokio::test]
async fn test_open_failure_fails_collection_before_scrolling() {
    let page = ScriptedTab::failing_open(WorkerError::ContentTimeout(
        "no posts rendered within 15s".into(),
    ));
    let counters = page.counters();

    let err = collect(&page, "$ABC", &fast_limits(20, 15)).await.unwrap_err();

    assert_eq!(err.kind(), "content_timeout");
    assert_eq!(counters.snapshots.load(Ordering::SeqCst), 0);
    assert_eq!(*counters.searches.lock().unwrap(), vec!["$ABC".to_string()]);
}

#[tokio::test]
async fn test_zero_target_collects_nothing() {
    let page = ScriptedTab::new(vec![round_of(0..5, "$ABC")]);
    let counters = page.counters();

    let posts = collect(&page, "$ABC", &fast_limits(0, 5)).await.unwrap();

    assert!(posts.is_empty());
    assert_eq!(counters.snapshots.load(Ordering::SeqCst), 0);
}
