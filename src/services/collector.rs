//! Scroll-and-dedupe collection of posts from a virtualized result list.
//!
//! The search view unmounts posts that scroll out of view and remounts them as
//! new elements later, so every round re-extracts everything rendered and
//! posts are keyed by permalink rather than by element identity.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use crate::error::WorkerError;
use crate::models::post::Post;

/// Snapshot of one rendered post element (its outer HTML).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostElement {
    pub html: String,
}

impl PostElement {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

/// What the collector needs from a browser page.
#[async_trait]
pub trait SearchPage: Send + Sync {
    /// Navigate to the search view for `query` and wait until at least one
    /// post is rendered.
    async fn open_search(&self, query: &str) -> Result<(), WorkerError>;

    /// All post elements currently rendered, in document order.
    async fn post_elements(&self) -> Result<Vec<PostElement>, WorkerError>;

    /// Parse one element. Failures are [`WorkerError::ExtractionSkip`].
    fn extract_post(&self, element: &PostElement) -> Result<Post, WorkerError>;

    /// Scroll the viewport down by `pixels`.
    async fn scroll_by(&self, pixels: i64) -> Result<(), WorkerError>;
}

/// Bounds for one collection run.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectLimits {
    pub target_count: usize,
    pub max_scroll_rounds: usize,
    pub scroll_step_px: i64,
    pub scroll_pause: Duration,
}

impl Default for CollectLimits {
    fn default() -> Self {
        Self {
            target_count: 20,
            max_scroll_rounds: 15,
            scroll_step_px: 800,
            scroll_pause: Duration::from_secs(1),
        }
    }
}

/// Insertion-ordered set of posts keyed by permalink. The first post seen for
/// a URL is kept; later copies are dropped.
#[derive(Debug, Default)]
pub struct PostAccumulator {
    seen: HashSet<String>,
    posts: Vec<Post>,
}

impl PostAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Add candidates whose URL is new. Returns how many were added.
    pub fn fold<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = Post>,
    {
        let before = self.posts.len();
        for post in candidates {
            if post.url.is_empty() || self.seen.contains(&post.url) {
                continue;
            }
            self.seen.insert(post.url.clone());
            self.posts.push(post);
        }
        self.posts.len() - before
    }

    /// First-seen order, truncated to `limit`.
    pub fn into_posts(mut self, limit: usize) -> Vec<Post> {
        self.posts.truncate(limit);
        self.posts
    }
}

/// Open the search view for `query` and scroll through it until
/// `target_count` unique posts are collected or the round budget runs out.
pub async fn collect(
    page: &dyn SearchPage,
    query: &str,
    limits: &CollectLimits,
) -> Result<Vec<Post>, WorkerError> {
    page.open_search(query).await?;

    let mut acc = PostAccumulator::new();
    let mut round = 0;

    while round < limits.max_scroll_rounds && acc.len() < limits.target_count {
        round += 1;

        let elements = page.post_elements().await?;
        let visible = elements.len();
        let candidates = elements.iter().filter_map(|el| match page.extract_post(el) {
            Ok(post) => Some(post),
            Err(e) => {
                tracing::trace!(error = %e, "Skipping post element");
                None
            }
        });
        let added = acc.fold(candidates);

        tracing::info!(
            query,
            round,
            visible,
            added,
            collected = acc.len(),
            "Scroll round complete"
        );

        page.scroll_by(limits.scroll_step_px).await?;
        if !limits.scroll_pause.is_zero() {
            tokio::time::sleep(limits.scroll_pause).await;
        }
    }

    let posts = acc.into_posts(limits.target_count);
    tracing::info!(query, rounds = round, posts = posts.len(), "Collection finished");
    Ok(posts)
}
