//! HTML fixtures shaped like rendered search result posts

#![allow(dead_code)]

/// Permalink the fixture post `n` resolves to.
pub fn post_url(n: usize) -> String {
    format!("https://x.com/trader{n}/status/{}", 1_790_000_000_000_000_000u64 + n as u64)
}

/// A text post with author, timestamp and engagement counters.
pub fn post_html(n: usize, text: &str) -> String {
    format!(
        r#"<article data-testid="tweet">
             <div data-testid="User-Name">
               <a href="/trader{n}"><span>Trader {n}</span></a>
               <a href="/trader{n}"><span>@trader{n}</span></a>
               <a href="/trader{n}/status/{id}"><time datetime="2026-10-19T12:00:00.000Z">{n}m</time></a>
             </div>
             <div data-testid="tweetText"><span>{text}</span></div>
             <div data-testid="reply"><span>{n}</span></div>
             <div data-testid="retweet"></div>
             <div data-testid="like"><span>1.{n}K</span></div>
           </article>"#,
        id = 1_790_000_000_000_000_000u64 + n as u64,
    )
}

/// A photo-only post.
pub fn media_post_html(n: usize) -> String {
    format!(
        r#"<article data-testid="tweet">
             <a href="/trader{n}/status/{id}"><time datetime="2026-10-19T12:00:00.000Z">now</time></a>
             <div data-testid="tweetPhoto"><img src="https://pbs.twimg.com/media/P{n}?format=jpg&amp;name=small"></div>
           </article>"#,
        id = 1_790_000_000_000_000_000u64 + n as u64,
    )
}

/// A promoted/placeholder element with no permalink.
pub fn broken_post_html() -> String {
    r#"<article data-testid="tweet"><div data-testid="tweetText">Promoted</div></article>"#
        .to_string()
}

/// Text posts `range` rendered as one scroll round.
pub fn round_of(range: std::ops::Range<usize>, ticker: &str) -> Vec<String> {
    range
        .map(|n| post_html(n, &format!("{ticker} post number {n}")))
        .collect()
}
