//! Persistent browser session over the Chrome DevTools Protocol.
//!
//! One connection to the user's Chrome and one dedicated tab are kept for the
//! life of the worker. The tab is probed before each job and replaced when it
//! stops answering; the connection is re-established when its event loop ends.

use async_trait::async_trait;
use chromiumoxide::{Browser, Handler, Page};
use futures::StreamExt;
use reqwest::Url;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

use crate::config::AppConfig;
use crate::error::WorkerError;
use crate::models::post::Post;
use crate::services::collector::{PostElement, SearchPage};
use crate::services::extract::{self, POST_SELECTOR};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Hands out the page a job scrapes with.
#[async_trait]
pub trait PageProvider: Send + Sync {
    /// A live page bound to the dedicated scraper tab.
    async fn acquire_page(&self) -> Result<Box<dyn ScrapeTab>, WorkerError>;

    /// Bring the search panel tab back to the foreground. Best-effort.
    async fn restore_focus(&self);
}

/// A search page that can also be brought to the foreground.
#[async_trait]
pub trait ScrapeTab: SearchPage {
    async fn bring_to_front(&self) -> Result<(), WorkerError>;

    fn as_search_page(&self) -> &dyn SearchPage;
}

/// Browser-side settings taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub debug_url: String,
    pub search_base_url: Url,
    pub site_hosts: Vec<String>,
    pub focus_return_fragment: String,
    pub navigation_timeout: Duration,
    pub content_timeout: Duration,
}

impl BrowserSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, WorkerError> {
        let search_base_url = Url::parse(&config.search_base_url).map_err(|e| {
            WorkerError::Startup(format!(
                "invalid search base URL {}: {e}",
                config.search_base_url
            ))
        })?;

        Ok(Self {
            debug_url: config.chrome_debug_url.trim_end_matches('/').to_string(),
            search_base_url,
            site_hosts: config.site_hosts.clone(),
            focus_return_fragment: config.focus_return_fragment.clone(),
            navigation_timeout: config.navigation_timeout(),
            content_timeout: config.content_timeout(),
        })
    }

    /// Search view URL for a query.
    pub fn search_url(&self, query: &str) -> Result<Url, WorkerError> {
        let mut url = self
            .search_base_url
            .join("/search")
            .map_err(|e| WorkerError::Navigation(format!("cannot build search URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("src", "typed_query");
        Ok(url)
    }
}

/// Which open tab the scraper should take over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabChoice {
    /// A tab already on the target site.
    Site(usize),
    /// An empty tab.
    Blank(usize),
    /// Nothing usable, open a new tab.
    New,
}

/// Prefer a tab already on one of `site_hosts`, then a blank tab, then a new one.
pub fn choose_tab(urls: &[Option<String>], site_hosts: &[String]) -> TabChoice {
    let on_site = |url: &str| {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .map(|host| {
                site_hosts
                    .iter()
                    .any(|h| host == *h || host.ends_with(&format!(".{h}")))
            })
            .unwrap_or(false)
    };
    let is_blank = |url: Option<&str>| {
        matches!(url, None | Some("") | Some("about:blank") | Some("chrome://newtab/"))
    };

    if let Some(i) = urls.iter().position(|u| u.as_deref().is_some_and(on_site)) {
        return TabChoice::Site(i);
    }
    if let Some(i) = urls.iter().position(|u| is_blank(u.as_deref())) {
        return TabChoice::Blank(i);
    }
    TabChoice::New
}

#[derive(Deserialize)]
struct JsonVersion {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

struct Connection {
    browser: Browser,
    closed: Arc<AtomicBool>,
    handler_task: JoinHandle<()>,
}

impl Connection {
    fn is_live(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

fn spawn_handler_task(mut handler: Handler, closed: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!(error = %e, "CDP handler event error");
            }
        }
        closed.store(true, Ordering::SeqCst);
        tracing::warn!("Browser connection closed");
    })
}

#[derive(Default)]
struct SessionState {
    connection: Option<Connection>,
    page: Option<Page>,
}

/// Owner of the browser connection and the dedicated scraper tab.
pub struct BrowserSession {
    settings: Arc<BrowserSettings>,
    http: reqwest::Client,
    state: Mutex<SessionState>,
}

impl BrowserSession {
    pub fn new(settings: BrowserSettings) -> Result<Self, WorkerError> {
        let http = reqwest::Client::builder()
            .timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| WorkerError::Startup(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            settings: Arc::new(settings),
            http,
            state: Mutex::new(SessionState::default()),
        })
    }

    /// Return the dedicated tab, reconnecting and re-selecting it as needed.
    pub async fn acquire(&self) -> Result<Page, WorkerError> {
        let mut state = self.state.lock().await;

        if !state.connection.as_ref().is_some_and(Connection::is_live) {
            state.page = None;
            state.connection = Some(self.connect().await?);
            tracing::info!(endpoint = %self.settings.debug_url, "Connected to Chrome");
        }

        if let Some(page) = state.page.clone() {
            if probe(&page).await {
                return Ok(page);
            }
            tracing::info!("Scraper tab no longer responds, selecting another");
            state.page = None;
        }

        let connection = state
            .connection
            .as_ref()
            .ok_or_else(|| WorkerError::Startup("browser connection missing".into()))?;
        let page = select_tab(&connection.browser, &self.settings.site_hosts).await?;
        state.page = Some(page.clone());
        Ok(page)
    }

    async fn connect(&self) -> Result<Connection, WorkerError> {
        let ws_url = self.discover_ws_url().await?;

        let (mut browser, handler) = timeout(CONNECT_TIMEOUT, Browser::connect(ws_url))
            .await
            .map_err(|_| WorkerError::Startup("timed out connecting to Chrome".into()))?
            .map_err(|e| WorkerError::Startup(format!("CDP connect failed: {e}")))?;

        let closed = Arc::new(AtomicBool::new(false));
        let handler_task = spawn_handler_task(handler, closed.clone());

        // Existing tabs only show up in pages() once their targets are known.
        match timeout(PROBE_TIMEOUT, browser.fetch_targets()).await {
            Ok(Ok(targets)) => tracing::debug!(targets = targets.len(), "Fetched browser targets"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to fetch browser targets"),
            Err(_) => tracing::warn!("Timed out fetching browser targets"),
        }

        Ok(Connection {
            browser,
            closed,
            handler_task,
        })
    }

    async fn discover_ws_url(&self) -> Result<String, WorkerError> {
        let url = format!("{}/json/version", self.settings.debug_url);
        tracing::debug!(%url, "Requesting Chrome version info");

        let resp = self.http.get(&url).send().await.map_err(|e| {
            WorkerError::Startup(format!(
                "cannot reach Chrome debug endpoint {}: {e}",
                self.settings.debug_url
            ))
        })?;

        if !resp.status().is_success() {
            return Err(WorkerError::Startup(format!(
                "Chrome /json/version returned {}",
                resp.status()
            )));
        }

        let body: JsonVersion = resp.json().await.map_err(|e| {
            WorkerError::Startup(format!("invalid Chrome debug response: {e}"))
        })?;
        Ok(body.web_socket_debugger_url)
    }

    /// Focus the first tab whose URL contains the configured fragment.
    pub async fn focus_return_tab(&self) {
        let state = self.state.lock().await;
        let Some(connection) = state.connection.as_ref().filter(|c| c.is_live()) else {
            return;
        };

        let pages = match connection.browser.pages().await {
            Ok(pages) => pages,
            Err(e) => {
                tracing::debug!(error = %e, "Could not list tabs to restore focus");
                return;
            }
        };

        for page in pages {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            if url.contains(&self.settings.focus_return_fragment) {
                match page.bring_to_front().await {
                    Ok(_) => tracing::info!(%url, "Switched back to search panel"),
                    Err(e) => tracing::debug!(error = %e, "Could not focus search panel"),
                }
                return;
            }
        }
    }
}

async fn probe(page: &Page) -> bool {
    matches!(timeout(PROBE_TIMEOUT, page.evaluate("true")).await, Ok(Ok(_)))
}

async fn select_tab(browser: &Browser, site_hosts: &[String]) -> Result<Page, WorkerError> {
    let pages = browser
        .pages()
        .await
        .map_err(|e| WorkerError::Startup(format!("cannot list tabs: {e}")))?;

    let mut urls = Vec::with_capacity(pages.len());
    for page in &pages {
        urls.push(page.url().await.ok().flatten());
    }

    match choose_tab(&urls, site_hosts) {
        TabChoice::Site(i) | TabChoice::Blank(i) => {
            tracing::info!(url = ?urls[i], "Reusing existing tab for scraping");
            Ok(pages[i].clone())
        }
        TabChoice::New => {
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| WorkerError::Startup(format!("cannot open tab: {e}")))?;
            tracing::info!("Created dedicated scraper tab");
            Ok(page)
        }
    }
}

#[async_trait]
impl PageProvider for BrowserSession {
    async fn acquire_page(&self) -> Result<Box<dyn ScrapeTab>, WorkerError> {
        let page = self.acquire().await?;
        Ok(Box::new(CdpSearchPage::new(page, self.settings.clone())))
    }

    async fn restore_focus(&self) {
        self.focus_return_tab().await;
    }
}

/// [`SearchPage`] implementation driving a CDP tab.
pub struct CdpSearchPage {
    page: Page,
    settings: Arc<BrowserSettings>,
}

impl CdpSearchPage {
    pub fn new(page: Page, settings: Arc<BrowserSettings>) -> Self {
        Self { page, settings }
    }

    async fn wait_for_posts(&self) -> Result<(), WorkerError> {
        let deadline = Instant::now() + self.settings.content_timeout;
        loop {
            if self.page.find_element(POST_SELECTOR).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(WorkerError::ContentTimeout(format!(
                    "no posts rendered within {}s",
                    self.settings.content_timeout.as_secs()
                )));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl SearchPage for CdpSearchPage {
    async fn open_search(&self, query: &str) -> Result<(), WorkerError> {
        let url = self.settings.search_url(query)?;
        tracing::info!(%url, "Navigating to search");

        timeout(self.settings.navigation_timeout, self.page.goto(url.as_str()))
            .await
            .map_err(|_| {
                WorkerError::Navigation(format!(
                    "{url} did not load within {}s",
                    self.settings.navigation_timeout.as_secs()
                ))
            })?
            .map_err(|e| WorkerError::Navigation(format!("{url}: {e}")))?;

        self.wait_for_posts().await
    }

    async fn post_elements(&self) -> Result<Vec<PostElement>, WorkerError> {
        let script = format!(
            "Array.from(document.querySelectorAll('{}')).map(e => e.outerHTML)",
            POST_SELECTOR
        );
        let html: Vec<String> = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| WorkerError::Navigation(format!("post snapshot failed: {e}")))?
            .into_value()
            .map_err(|e| WorkerError::Navigation(format!("post snapshot unreadable: {e}")))?;

        Ok(html.into_iter().map(PostElement::new).collect())
    }

    fn extract_post(&self, element: &PostElement) -> Result<Post, WorkerError> {
        extract::parse_post(&element.html, &self.settings.search_base_url)
    }

    async fn scroll_by(&self, pixels: i64) -> Result<(), WorkerError> {
        self.page
            .evaluate(format!("window.scrollBy(0, {pixels})"))
            .await
            .map_err(|e| WorkerError::Navigation(format!("scroll failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ScrapeTab for CdpSearchPage {
    async fn bring_to_front(&self) -> Result<(), WorkerError> {
        self.page
            .bring_to_front()
            .await
            .map_err(|e| WorkerError::Navigation(format!("cannot focus scraper tab: {e}")))?;
        Ok(())
    }

    fn as_search_page(&self) -> &dyn SearchPage {
        self
    }
}
