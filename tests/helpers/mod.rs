//! Test doubles for the queue store and the browser

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use ticker_scraper::error::WorkerError;
use ticker_scraper::models::job::{Job, JobResults, JobStatus};
use ticker_scraper::models::post::Post;
use ticker_scraper::services::browser::{PageProvider, ScrapeTab};
use ticker_scraper::services::collector::{CollectLimits, PostElement, SearchPage};
use ticker_scraper::services::extract;
use ticker_scraper::services::queue::{JobStore, QueueError};

/// Collector limits with no pause between rounds.
pub fn fast_limits(target_count: usize, max_scroll_rounds: usize) -> CollectLimits {
    CollectLimits {
        target_count,
        max_scroll_rounds,
        scroll_step_px: 800,
        scroll_pause: std::time::Duration::ZERO,
    }
}

/// In-memory job queue enforcing the same transitions as the SQL store.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<Job>>,
    history: Mutex<HashMap<Uuid, Vec<JobStatus>>>,
    claims: Mutex<Vec<Uuid>>,
    pub fail_list: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending job; each insert is one second newer than the last.
    pub fn insert(&self, ticker: &str) -> Job {
        let mut jobs = self.jobs.lock().unwrap();
        let job = Job {
            id: Uuid::new_v4(),
            ticker: ticker.to_string(),
            status: JobStatus::Pending,
            results: None,
            created_at: Utc::now() + Duration::seconds(jobs.len() as i64),
            started_at: None,
            completed_at: None,
        };
        jobs.push(job.clone());
        self.history
            .lock()
            .unwrap()
            .insert(job.id, vec![JobStatus::Pending]);
        job
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned()
    }

    /// Every status the job has been observed in, in order.
    pub fn history(&self, id: Uuid) -> Vec<JobStatus> {
        self.history
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Job ids in the order they were successfully claimed.
    pub fn claim_order(&self) -> Vec<Uuid> {
        self.claims.lock().unwrap().clone()
    }

    fn transition(
        &self,
        id: Uuid,
        next: JobStatus,
        results: Option<JobResults>,
    ) -> Result<bool, QueueError> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(false);
        };
        if !job.status.can_transition_to(next) {
            return Ok(false);
        }

        job.status = next;
        match next {
            JobStatus::Processing => job.started_at = Some(Utc::now()),
            JobStatus::Completed | JobStatus::Failed => {
                job.results = results;
                job.completed_at = Some(Utc::now());
            }
            JobStatus::Pending => {}
        }
        self.history
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push(next);
        Ok(true)
    }

    fn write_guard(&self) -> Result<(), QueueError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(QueueError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn list_pending(&self) -> Result<Vec<Job>, QueueError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(QueueError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut pending: Vec<Job> = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|j| j.created_at);
        Ok(pending)
    }

    async fn try_claim(&self, job_id: Uuid) -> Result<bool, QueueError> {
        let claimed = self.transition(job_id, JobStatus::Processing, None)?;
        if claimed {
            self.claims.lock().unwrap().push(job_id);
        }
        Ok(claimed)
    }

    async fn complete(&self, job_id: Uuid, posts: &[Post]) -> Result<(), QueueError> {
        self.write_guard()?;
        let results = JobResults::Posts(posts.to_vec());
        if !self.transition(job_id, JobStatus::Completed, Some(results))? {
            return Err(QueueError::NotProcessing(job_id));
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, message: &str) -> Result<(), QueueError> {
        self.write_guard()?;
        let results = JobResults::Error {
            error: message.to_string(),
        };
        if !self.transition(job_id, JobStatus::Failed, Some(results))? {
            return Err(QueueError::NotProcessing(job_id));
        }
        Ok(())
    }
}

/// Counters shared between a scripted browser and the tabs it hands out.
#[derive(Default)]
pub struct TabCounters {
    pub snapshots: AtomicUsize,
    pub scrolls: AtomicUsize,
    pub focused: AtomicUsize,
    pub searches: Mutex<Vec<String>>,
}

/// A page that renders a fixed list of post elements per scroll round. Rounds
/// past the end of the script repeat the last one.
pub struct ScriptedTab {
    rounds: Arc<Vec<Vec<String>>>,
    open_error: Option<WorkerError>,
    counters: Arc<TabCounters>,
    base_url: Url,
}

impl ScriptedTab {
    pub fn new(rounds: Vec<Vec<String>>) -> Self {
        Self {
            rounds: Arc::new(rounds),
            open_error: None,
            counters: Arc::new(TabCounters::default()),
            base_url: Url::parse("https://x.com").unwrap(),
        }
    }

    pub fn failing_open(error: WorkerError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn counters(&self) -> Arc<TabCounters> {
        self.counters.clone()
    }
}

#[async_trait]
impl SearchPage for ScriptedTab {
    async fn open_search(&self, query: &str) -> Result<(), WorkerError> {
        self.counters
            .searches
            .lock()
            .unwrap()
            .push(query.to_string());
        match &self.open_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn post_elements(&self) -> Result<Vec<PostElement>, WorkerError> {
        let round = self.counters.snapshots.fetch_add(1, Ordering::SeqCst);
        let rendered = self
            .rounds
            .get(round)
            .or_else(|| self.rounds.last())
            .cloned()
            .unwrap_or_default();
        Ok(rendered.into_iter().map(PostElement::new).collect())
    }

    fn extract_post(&self, element: &PostElement) -> Result<Post, WorkerError> {
        extract::parse_post(&element.html, &self.base_url)
    }

    async fn scroll_by(&self, _pixels: i64) -> Result<(), WorkerError> {
        self.counters.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ScrapeTab for ScriptedTab {
    async fn bring_to_front(&self) -> Result<(), WorkerError> {
        self.counters.focused.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_search_page(&self) -> &dyn SearchPage {
        self
    }
}

/// Browser whose tab replays the same script for every job. The first
/// `unreachable_for` acquisitions fail as if Chrome were down.
pub struct ScriptedBrowser {
    rounds: Arc<Vec<Vec<String>>>,
    counters: Arc<TabCounters>,
    unreachable_for: AtomicUsize,
    pub acquisitions: AtomicUsize,
    pub focus_restores: AtomicUsize,
}

impl ScriptedBrowser {
    pub fn new(rounds: Vec<Vec<String>>) -> Self {
        Self {
            rounds: Arc::new(rounds),
            counters: Arc::new(TabCounters::default()),
            unreachable_for: AtomicUsize::new(0),
            acquisitions: AtomicUsize::new(0),
            focus_restores: AtomicUsize::new(0),
        }
    }

    pub fn unreachable_for(self, attempts: usize) -> Self {
        self.unreachable_for.store(attempts, Ordering::SeqCst);
        self
    }

    pub fn counters(&self) -> Arc<TabCounters> {
        self.counters.clone()
    }
}

#[async_trait]
impl PageProvider for ScriptedBrowser {
    async fn acquire_page(&self) -> Result<Box<dyn ScrapeTab>, WorkerError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let remaining = self.unreachable_for.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unreachable_for.store(remaining - 1, Ordering::SeqCst);
            return Err(WorkerError::Startup(
                "cannot reach Chrome debug endpoint http://localhost:9222: connection refused"
                    .into(),
            ));
        }

        // Each job starts from the top of the result list.
        self.counters.snapshots.store(0, Ordering::SeqCst);
        Ok(Box::new(ScriptedTab {
            rounds: self.rounds.clone(),
            open_error: None,
            counters: self.counters.clone(),
            base_url: Url::parse("https://x.com").unwrap(),
        }))
    }

    async fn restore_focus(&self) {
        self.focus_restores.fetch_add(1, Ordering::SeqCst);
    }
}
