use sqlx::PgPool;
use std::sync::Arc;

use crate::services::queue::PgJobStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<PgJobStore>,
}

impl AppState {
    pub fn new(db: PgPool) -> Self {
        let queue = PgJobStore::new(db.clone());
        Self {
            db,
            queue: Arc::new(queue),
        }
    }
}
