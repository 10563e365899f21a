//! Shared setup: config, store snapshot, and service wiring.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use lexiloop_core::grading::Grader;
use lexiloop_core::review::ReviewService;
use lexiloop_core::traits::{Clock, SystemClock};
use lexiloop_providers::config::load_config_from;
use lexiloop_providers::LexiloopConfig;
use lexiloop_store::MemoryStore;

use crate::GlobalArgs;

/// Everything a command needs, loaded from disk.
pub struct AppContext {
    pub config: LexiloopConfig,
    pub learner: String,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<dyn Clock>,
    store_path: PathBuf,
}

impl AppContext {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let config = load_config_from(global.config.as_deref())?;
        let store_path = global
            .store
            .clone()
            .unwrap_or_else(|| config.store_path.clone());
        let store = MemoryStore::load_snapshot(&store_path)?;
        tracing::debug!(store = %store_path.display(), learner = %global.learner, "context loaded");

        Ok(Self {
            config,
            learner: global.learner.clone(),
            store: Arc::new(store),
            clock: Arc::new(SystemClock),
            store_path,
        })
    }

    pub fn review_service(&self) -> ReviewService {
        ReviewService::new(
            self.store.clone(),
            self.store.clone(),
            Grader::default(),
            self.clock.clone(),
            self.config.review_config(),
        )
    }

    /// Write the store back to its snapshot file.
    pub async fn persist(&self) -> Result<()> {
        self.store.save_snapshot(&self.store_path).await
    }
}

/// Parse `--date`, or fall back to today's local date.
pub fn resolve_date(date: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{d}', expected YYYY-MM-DD")),
        None => Ok(today),
    }
}
