//! Shared application state.

use std::sync::RwLock;

use flightwx_core::models::RunSummary;

use crate::persistence::Database;

/// State shared between the background loops and the status API.
pub struct AppState {
    pub db: Database,
    latest_run: RwLock<Option<RunSummary>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            latest_run: RwLock::new(None),
        }
    }

    pub fn set_latest_run(&self, summary: RunSummary) {
        if let Ok(mut guard) = self.latest_run.write() {
            *guard = Some(summary);
        }
    }

    pub fn latest_run(&self) -> Option<RunSummary> {
        self.latest_run.read().ok().and_then(|guard| guard.clone())
    }
}
