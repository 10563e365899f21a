//! Collaborator trait definitions.
//!
//! The engine never talks to a database, an LLM, or the system clock
//! directly. Hosts implement these traits; `lexiloop-store` and
//! `lexiloop-providers` ship the stock implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::grading::FourLevelRating;
use crate::model::{ArtifactKind, DailyArtifact, Deck, GradeEvent, Item, Level, ReviewState, StoryLength};

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Keyed storage for items, review state, and daily artifacts.
///
/// Implementations must enforce uniqueness on `(learner, item)` for review
/// state and on `(learner, kind, date)` for artifacts, reporting a hit as
/// [`StoreError::ConstraintViolation`].
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Register a deck. Re-registering an existing deck is a constraint violation.
    async fn insert_deck(&self, deck: Deck) -> StoreResult<()>;

    async fn get_deck(&self, learner_id: &str, name: &str) -> StoreResult<Option<Deck>>;

    /// Create an item together with its seeded review state, atomically.
    async fn insert_item(&self, item: Item, state: ReviewState) -> StoreResult<()>;

    /// All items owned by a learner, oldest first.
    async fn items(&self, learner_id: &str) -> StoreResult<Vec<Item>>;

    async fn get_review_state(
        &self,
        learner_id: &str,
        item_id: &str,
    ) -> StoreResult<Option<ReviewState>>;

    /// Insert or replace the state for `(state.learner_id, state.item_id)`.
    async fn upsert_review_state(&self, state: ReviewState) -> StoreResult<()>;

    /// Every review state a learner owns.
    async fn review_states(&self, learner_id: &str) -> StoreResult<Vec<ReviewState>>;

    async fn get_artifact(
        &self,
        learner_id: &str,
        kind: ArtifactKind,
        date: NaiveDate,
    ) -> StoreResult<Option<DailyArtifact>>;

    /// Insert a new artifact; an existing key is a constraint violation.
    async fn insert_artifact(&self, artifact: DailyArtifact) -> StoreResult<()>;

    /// Replace an existing artifact in place.
    async fn update_artifact(&self, artifact: DailyArtifact) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Append-only log of grade events.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append an event. Writing an event whose id is already present is a no-op.
    async fn write(&self, event: &GradeEvent) -> StoreResult<()>;

    /// Events for a learner with `start <= reviewed_at < end`.
    async fn query(
        &self,
        learner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<GradeEvent>>;
}

// ---------------------------------------------------------------------------
// Scheduler procedure
// ---------------------------------------------------------------------------

/// Ease and interval proposed by a scheduling procedure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub ease: f64,
    pub interval_days: u32,
}

/// External scheduling procedure behind the four-level rating alphabet.
#[async_trait]
pub trait SchedulerProcedure: Send + Sync {
    fn name(&self) -> &str;

    async fn compute(
        &self,
        state: &ReviewState,
        rating: FourLevelRating,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ScheduleOutcome>;
}

// ---------------------------------------------------------------------------
// Content generator
// ---------------------------------------------------------------------------

/// Trait for backends that write practice stories.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Human-readable generator name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Write a story embedding the requested vocabulary.
    async fn generate(&self, request: &StoryRequest) -> anyhow::Result<GeneratedStory>;
}

/// Request to generate a story.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryRequest {
    /// Model identifier passed through to the backend.
    pub model: String,
    /// Vocabulary to embed, in selection order.
    pub terms: Vec<String>,
    pub level: Level,
    pub length: StoryLength,
    /// Optional theme for the story.
    #[serde(default)]
    pub topic: Option<String>,
}

impl StoryRequest {
    /// Approximate word budget for the story.
    pub fn word_budget(&self) -> u32 {
        self.length.word_budget()
    }

    /// The user prompt sent to text-generation backends.
    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            "Write a short story of about {} words for a learner at CEFR level {}.",
            self.word_budget(),
            self.level
        );
        if let Some(topic) = &self.topic {
            prompt.push_str(&format!(" The story is about: {topic}."));
        }
        if !self.terms.is_empty() {
            prompt.push_str(" Use each of these words at least once: ");
            prompt.push_str(&self.terms.join(", "));
            prompt.push('.');
        }
        prompt
    }
}

/// A story returned by a [`ContentGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub text: String,
    /// Model that actually generated the story.
    pub model: String,
    #[serde(default)]
    pub token_usage: TokenUsage,
    pub latency_ms: u64,
}

/// Token accounting reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Default system prompt for story generators.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You write graded reading practice for language learners. Respond ONLY with the story text. Do not add a title, notes, glossaries, or markdown formatting.";

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall-clock source for `now`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
