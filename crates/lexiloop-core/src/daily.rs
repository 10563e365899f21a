//! Idempotent daily-story guard.
//!
//! At most one story exists per learner per calendar day. The store's unique
//! key on `(learner, kind, date)` is the only de-duplication mechanism: two
//! racing requests may both generate, but only one insert wins and the loser
//! re-reads the winner's artifact. No lock is held across the generator call.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ReviewError, StoreError};
use crate::executor::BoundedExecutor;
use crate::model::{ArtifactKind, DailyArtifact, Level, StoryLength};
use crate::sampling::select_targets;
use crate::traits::{Clock, ContentGenerator, ReviewStore, StoryRequest};

/// What the learner asked for today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRequest {
    pub length: StoryLength,
    pub level: Level,
    /// Terms the learner wants featured; matching items are picked first.
    #[serde(default)]
    pub requested_terms: Vec<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl Default for DailyRequest {
    fn default() -> Self {
        Self {
            length: StoryLength::Medium,
            level: Level::A2,
            requested_terms: Vec::new(),
            topic: None,
        }
    }
}

/// Configuration for the daily guard.
#[derive(Debug, Clone)]
pub struct DailyConfig {
    /// Model identifier passed to the generator.
    pub model: String,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

pub struct DailyGuard {
    store: Arc<dyn ReviewStore>,
    generator: Arc<dyn ContentGenerator>,
    executor: BoundedExecutor,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    config: DailyConfig,
}

impl DailyGuard {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        generator: Arc<dyn ContentGenerator>,
        executor: BoundedExecutor,
        clock: Arc<dyn Clock>,
        config: DailyConfig,
    ) -> Self {
        Self {
            store,
            generator,
            executor,
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
            config,
        }
    }

    /// Use a fixed seed for the backfill sample.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Return the learner's story for `date`, generating it on first request.
    pub async fn get_or_create(
        &self,
        learner_id: &str,
        date: NaiveDate,
        request: &DailyRequest,
    ) -> Result<DailyArtifact, ReviewError> {
        if let Some(existing) = self.store.get_artifact(learner_id, ArtifactKind::Daily, date).await? {
            return Ok(existing);
        }

        let pool = self.store.items(learner_id).await?;
        if pool.is_empty() {
            return Err(ReviewError::InvalidArgument(
                "learner has no vocabulary to build a story from".into(),
            ));
        }
        let targets = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            select_targets(
                pool,
                &request.requested_terms,
                request.length.target_count(),
                &mut *rng,
            )
        };

        let story_request = StoryRequest {
            model: self.config.model.clone(),
            terms: targets.iter().map(|i| i.term.clone()).collect(),
            level: request.level,
            length: request.length,
            topic: request.topic.clone(),
        };
        let generator = Arc::clone(&self.generator);
        let story = self
            .executor
            .submit(async move { generator.generate(&story_request).await })
            .join()
            .await?
            .map_err(|e| ReviewError::Upstream(e.context("daily story generation failed")))?;

        let artifact = DailyArtifact {
            id: Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            kind: ArtifactKind::Daily,
            date,
            text: story.text,
            level: request.level,
            length: request.length,
            saved: false,
            target_item_ids: targets.into_iter().map(|i| i.id).collect(),
            created_at: self.clock.now(),
        };

        match self.store.insert_artifact(artifact.clone()).await {
            Ok(()) => {
                tracing::info!(learner = learner_id, %date, model = %story.model, "daily story created");
                Ok(artifact)
            }
            Err(StoreError::ConstraintViolation(_)) => {
                tracing::warn!(learner = learner_id, %date, "daily story raced, returning stored one");
                self.store
                    .get_artifact(learner_id, ArtifactKind::Daily, date)
                    .await?
                    .ok_or_else(|| {
                        ReviewError::Internal(format!(
                            "daily story for {date} reported as existing but not readable"
                        ))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Mark the story as saved. Later calls leave it unchanged.
    pub async fn save(&self, learner_id: &str, date: NaiveDate) -> Result<DailyArtifact, ReviewError> {
        mark_saved(self.store.as_ref(), learner_id, date).await
    }

    /// Today's date in the learner's local time.
    pub fn today(&self, offset_minutes: i32) -> Result<NaiveDate, ReviewError> {
        crate::activity::check_offset(offset_minutes)?;
        Ok(crate::activity::local_date(self.clock.now(), offset_minutes))
    }
}

/// Flip the stored story's `saved` flag; a no-op when it is already set.
///
/// Needs only the store, so hosts can save without wiring a generator.
pub async fn mark_saved(
    store: &dyn ReviewStore,
    learner_id: &str,
    date: NaiveDate,
) -> Result<DailyArtifact, ReviewError> {
    let mut artifact = store
        .get_artifact(learner_id, ArtifactKind::Daily, date)
        .await?
        .ok_or_else(|| ReviewError::NotFound(format!("daily story for {date}")))?;
    if artifact.saved {
        return Ok(artifact);
    }
    artifact.saved = true;
    store.update_artifact(artifact.clone()).await?;
    tracing::debug!(learner = learner_id, %date, "daily story saved");
    Ok(artifact)
}
