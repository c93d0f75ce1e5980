use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use ticker_scraper::{
    config::AppConfig,
    db,
    services::{
        browser::{BrowserSession, BrowserSettings},
        listener::QueueListener,
        processor::JobProcessor,
        queue::PgJobStore,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting ticker scrape worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    if let Some(addr) = &config.worker_metrics_addr {
        let addr: SocketAddr = addr.parse().expect("Invalid WORKER_METRICS_ADDR");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus exporter");
        tracing::info!(%addr, "Serving worker metrics");
    }
    describe_metrics();

    // Chrome must be reachable before any job is accepted.
    let settings = match BrowserSettings::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Invalid browser settings");
            return ExitCode::FAILURE;
        }
    };
    let browser = match BrowserSession::new(settings) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize browser session");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = browser.acquire().await {
        tracing::error!(
            error = %e,
            endpoint = %config.chrome_debug_url,
            "Cannot connect to Chrome. Start it with --remote-debugging-port=9222"
        );
        return ExitCode::FAILURE;
    }
    tracing::info!("Chrome connection verified");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let store = Arc::new(PgJobStore::new(db_pool));
    let feed = store
        .subscribe()
        .await
        .expect("Failed to subscribe to job notifications");

    let processor = JobProcessor::new(store.clone(), Arc::new(browser), config.collect_limits());
    let listener = QueueListener::new(store, processor);

    tracing::info!("Worker is running. Press Ctrl+C to stop.");
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down after the current job");
    };
    listener.run(feed, shutdown).await;

    ExitCode::SUCCESS
}

fn describe_metrics() {
    metrics::describe_counter!(
        "scrape_jobs_completed_total",
        "Total scrape jobs completed"
    );
    metrics::describe_counter!(
        "scrape_jobs_failed_total",
        "Total scrape jobs that failed, by error kind"
    );
    metrics::describe_counter!(
        "scrape_jobs_claim_conflicts_total",
        "Jobs skipped because another intake path claimed them first"
    );
    metrics::describe_histogram!(
        "scrape_job_duration_seconds",
        "Time to scrape one job"
    );
    metrics::describe_gauge!(
        "scrape_posts_collected",
        "Posts collected by the most recent job"
    );
}
