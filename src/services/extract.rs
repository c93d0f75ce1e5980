//! Post element extraction.
//!
//! The browser hands us a snapshot of each rendered post as outer HTML; this
//! module turns one such fragment into a [`Post`]. Selectors follow the
//! site's `data-testid` attributes.

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use crate::error::WorkerError;
use crate::models::post::{Author, Engagement, Media, Post};

/// Selector matching one rendered post on the search page.
pub const POST_SELECTOR: &str = r#"article[data-testid="tweet"]"#;

/// Host serving post photos and link-preview images.
const MEDIA_CDN_HOST: &str = "pbs.twimg.com";

struct PostSelectors {
    text: Selector,
    user_name: Selector,
    time: Selector,
    reply: Selector,
    share: Selector,
    like: Selector,
    permalink: Selector,
    photo: Selector,
    video: Selector,
    animated: Selector,
    card_image: Selector,
}

fn selectors() -> &'static PostSelectors {
    static SELECTORS: OnceLock<PostSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |s: &str| Selector::parse(s).expect("valid selector");
        PostSelectors {
            text: parse(r#"[data-testid="tweetText"]"#),
            user_name: parse(r#"[data-testid="User-Name"]"#),
            time: parse("time"),
            reply: parse(r#"[data-testid="reply"]"#),
            share: parse(r#"[data-testid="retweet"], [data-testid="unretweet"]"#),
            like: parse(r#"[data-testid="like"], [data-testid="unlike"]"#),
            permalink: parse(r#"a[href*="/status/"]"#),
            photo: parse(r#"[data-testid="tweetPhoto"] img"#),
            video: parse(r#"[data-testid="videoPlayer"] video"#),
            animated: parse(r#"[data-testid="tweetGif"] video"#),
            card_image: parse(r#"[data-testid="card.wrapper"] img"#),
        }
    })
}

/// Parse one post element. Elements without a permalink or without any
/// text/image content are skipped.
pub fn parse_post(html: &str, base_url: &Url) -> Result<Post, WorkerError> {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();
    let sel = selectors();

    let text = root
        .select(&sel.text)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let author = root
        .select(&sel.user_name)
        .next()
        .map(parse_author)
        .unwrap_or_default();

    let (timestamp, relative_time) = match root.select(&sel.time).next() {
        Some(el) => (
            el.value().attr("datetime").unwrap_or_default().to_string(),
            collapsed_text(el),
        ),
        None => (String::new(), String::new()),
    };

    let engagement = Engagement {
        reply_count: counter(root, &sel.reply),
        share_count: counter(root, &sel.share),
        like_count: counter(root, &sel.like),
    };

    let url = match root
        .select(&sel.permalink)
        .find_map(|a| a.value().attr("href"))
    {
        Some(href) => base_url
            .join(href)
            .map_err(|e| WorkerError::ExtractionSkip(format!("bad permalink {href}: {e}")))?
            .to_string(),
        None => String::new(),
    };

    let images = root
        .select(&sel.photo)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| is_media_cdn(src) && src.contains("/media"))
        .map(large_image_variant)
        .collect();

    let video_thumbnails = attrs(root, &sel.video, "poster");
    let animated_images = attrs(root, &sel.animated, "src");
    let link_preview_images = root
        .select(&sel.card_image)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| is_media_cdn(src))
        .map(str::to_string)
        .collect();

    let post = Post {
        text,
        author,
        timestamp,
        relative_time,
        engagement,
        media: Media {
            images,
            video_thumbnails,
            animated_images,
            link_preview_images,
        },
        url,
    };

    if post.url.is_empty() {
        return Err(WorkerError::ExtractionSkip("post has no permalink".into()));
    }
    if !post.is_valid() {
        return Err(WorkerError::ExtractionSkip(format!(
            "post {} has neither text nor images",
            post.url
        )));
    }
    Ok(post)
}

/// The name block holds one child per line: the display name, then the
/// `@handle` line. Emoji inside a display name render as `<img>` between text
/// runs, so each line keeps all of its runs.
fn parse_author(el: ElementRef<'_>) -> Author {
    let mut lines: Vec<String> = el
        .children()
        .filter_map(ElementRef::wrap)
        .map(collapsed_text)
        .filter(|s| !s.is_empty())
        .collect();
    if lines.is_empty() {
        lines = el
            .text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    let display_name = lines
        .iter()
        .find(|line| !line.starts_with('@'))
        .cloned()
        .unwrap_or_default();
    let handle = el
        .text()
        .map(str::trim)
        .find(|s| s.starts_with('@'))
        .map(str::to_string)
        .or_else(|| lines.get(1).cloned())
        .unwrap_or_default();

    Author {
        display_name,
        handle,
    }
}

fn collapsed_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn counter(root: ElementRef<'_>, selector: &Selector) -> String {
    root.select(selector)
        .next()
        .map(collapsed_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "0".to_string())
}

fn attrs(root: ElementRef<'_>, selector: &Selector, name: &str) -> Vec<String> {
    root.select(selector)
        .filter_map(|el| el.value().attr(name))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_media_cdn(src: &str) -> bool {
    Url::parse(src)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == MEDIA_CDN_HOST))
        .unwrap_or(false)
}

/// Request the `large` rendition of a CDN photo.
fn large_image_variant(src: &str) -> String {
    let Ok(mut url) = Url::parse(src) else {
        return src.to_string();
    };

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "name")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.push(("name".to_string(), "large".to_string()));

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}
