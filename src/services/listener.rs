use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::models::job::Job;
use crate::services::processor::JobProcessor;
use crate::services::queue::JobStore;

/// Feeds jobs to the processor one at a time: the pending backlog first, then
/// whatever arrives on the live feed.
pub struct QueueListener {
    store: Arc<dyn JobStore>,
    processor: JobProcessor,
}

impl QueueListener {
    pub fn new(store: Arc<dyn JobStore>, processor: JobProcessor) -> Self {
        Self { store, processor }
    }

    /// Process every job that was pending at startup, oldest first. Returns the
    /// number of jobs handed to the processor.
    pub async fn drain_backlog(&self) -> usize {
        self.drain(&mut std::future::pending::<()>()).await.0
    }

    /// Returns the number of jobs processed and whether `shutdown` fired.
    async fn drain<F>(&self, shutdown: &mut F) -> (usize, bool)
    where
        F: Future<Output = ()> + Unpin,
    {
        let pending = match self.store.list_pending().await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Error checking pending jobs, skipping backlog");
                return (0, false);
            }
        };

        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "Found pending jobs");
        }
        let mut processed = 0;
        for job in &pending {
            if (&mut *shutdown).now_or_never().is_some() {
                return (processed, true);
            }
            self.processor.process(job).await;
            processed += 1;
        }
        (processed, false)
    }

    /// Drain the backlog, then process jobs from `feed` until it closes or
    /// `shutdown` resolves. A job already in flight always runs to its
    /// terminal write; `shutdown` is only observed between jobs.
    ///
    /// Subscribe before calling this so inserts that land during the drain
    /// wait in the feed; jobs seen twice are dropped by the claim.
    pub async fn run<F>(&self, mut feed: mpsc::Receiver<Job>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let (_, stopped) = self.drain(&mut shutdown).await;
        if stopped {
            tracing::info!("Shutdown requested, listener stopping");
            return;
        }

        tracing::info!("Listening for new jobs");
        loop {
            let job = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, listener stopping");
                    return;
                }
                job = feed.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.processor.process(&job).await;
        }
        tracing::info!("Job feed closed, listener stopping");
    }
}
