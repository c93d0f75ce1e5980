use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::services::collector::CollectLimits;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// API server bind address (e.g., "0.0.0.0:3000"). Unused by the worker.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string for the job queue
    pub database_url: String,

    /// Chrome remote-debugging HTTP endpoint
    #[serde(default = "default_chrome_debug_url")]
    pub chrome_debug_url: String,

    /// Base URL of the social site searched for tickers
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,

    /// Hosts that identify an already-open site tab (comma separated)
    #[serde(default = "default_site_hosts", deserialize_with = "comma_separated")]
    pub site_hosts: Vec<String>,

    /// URL fragment of the tab to refocus after scraping
    #[serde(default = "default_focus_return_fragment")]
    pub focus_return_fragment: String,

    #[serde(default = "default_target_count")]
    pub scrape_target_count: usize,

    #[serde(default = "default_max_scroll_rounds")]
    pub scrape_max_scroll_rounds: usize,

    #[serde(default = "default_scroll_step_px")]
    pub scrape_scroll_step_px: i64,

    #[serde(default = "default_scroll_pause_ms")]
    pub scrape_scroll_pause_ms: u64,

    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    #[serde(default = "default_content_timeout_secs")]
    pub content_timeout_secs: u64,

    /// When set, the worker serves Prometheus metrics on this address
    #[serde(default)]
    pub worker_metrics_addr: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_chrome_debug_url() -> String {
    "http://localhost:9222".to_string()
}

fn default_search_base_url() -> String {
    "https://x.com".to_string()
}

fn default_site_hosts() -> Vec<String> {
    vec!["x.com".to_string(), "twitter.com".to_string()]
}

fn default_focus_return_fragment() -> String {
    "localhost".to_string()
}

fn default_target_count() -> usize {
    20
}

fn default_max_scroll_rounds() -> usize {
    15
}

fn default_scroll_step_px() -> i64 {
    800
}

fn default_scroll_pause_ms() -> u64 {
    1000
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_content_timeout_secs() -> u64 {
    15
}

fn comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Scroll/dedupe limits handed to the content collector.
    pub fn collect_limits(&self) -> CollectLimits {
        CollectLimits {
            target_count: self.scrape_target_count,
            max_scroll_rounds: self.scrape_max_scroll_rounds,
            scroll_step_px: self.scrape_scroll_step_px,
            scroll_pause: Duration::from_millis(self.scrape_scroll_pause_ms),
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }
}
