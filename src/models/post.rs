use serde::{Deserialize, Serialize};

/// Author of a scraped post.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub display_name: String,
    pub handle: String,
}

/// Engagement counters exactly as displayed ("1.2K" stays "1.2K").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub reply_count: String,
    pub share_count: String,
    pub like_count: String,
}

impl Default for Engagement {
    fn default() -> Self {
        Self {
            reply_count: "0".to_string(),
            share_count: "0".to_string(),
            like_count: "0".to_string(),
        }
    }
}

/// Media URLs attached to a post.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub images: Vec<String>,
    pub video_thumbnails: Vec<String>,
    pub animated_images: Vec<String>,
    pub link_preview_images: Vec<String>,
}

/// One scraped post. `url` is the permalink and the deduplication key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub text: String,
    pub author: Author,
    pub timestamp: String,
    pub relative_time: String,
    pub engagement: Engagement,
    pub media: Media,
    pub url: String,
}

impl Post {
    /// A post is kept only if it has a permalink and some content.
    pub fn is_valid(&self) -> bool {
        !self.url.is_empty() && (!self.text.is_empty() || !self.media.images.is_empty())
    }
}
