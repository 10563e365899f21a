//! Review service: grading requests end to end.
//!
//! A review is parse → load → grade → persist → append event. The state
//! write and the event append form one logical operation; if the append keeps
//! failing after the state was written, the caller gets
//! [`ReviewError::EventAppend`] carrying the event, and retries it with
//! [`ReviewService::append_event`] rather than grading again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;
use crate::grading::{Grader, Rating, RatingScheme};
use crate::model::{Deck, GradeEvent, Item, ReviewState};
use crate::traits::{Clock, EventLog, ReviewStore};

/// Configuration for the review service.
#[derive(Debug, Clone)]
pub struct ReviewServiceConfig {
    /// Attempts at appending a grade event before surfacing the failure.
    pub event_append_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub event_retry_delay: Duration,
}

impl Default for ReviewServiceConfig {
    fn default() -> Self {
        Self {
            event_append_attempts: 3,
            event_retry_delay: Duration::from_millis(50),
        }
    }
}

/// Result of a successful review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub previous: ReviewState,
    pub state: ReviewState,
    pub event: GradeEvent,
}

/// Interval a rating would produce, for showing on rating buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPreview {
    pub rating: Rating,
    pub interval_days: u32,
    pub ease: f64,
}

pub struct ReviewService {
    store: Arc<dyn ReviewStore>,
    events: Arc<dyn EventLog>,
    grader: Grader,
    clock: Arc<dyn Clock>,
    config: ReviewServiceConfig,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        events: Arc<dyn EventLog>,
        grader: Grader,
        clock: Arc<dyn Clock>,
        config: ReviewServiceConfig,
    ) -> Self {
        Self {
            store,
            events,
            grader,
            clock,
            config,
        }
    }

    /// Register a deck for a learner.
    pub async fn create_deck(&self, learner_id: &str, name: &str) -> Result<Deck, ReviewError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ReviewError::InvalidArgument("deck name is empty".into()));
        }
        let deck = Deck {
            learner_id: learner_id.to_string(),
            name: name.to_string(),
            created_at: self.clock.now(),
        };
        self.store.insert_deck(deck.clone()).await?;
        Ok(deck)
    }

    /// Create an item and seed its review state in the same store call.
    pub async fn add_item(
        &self,
        learner_id: &str,
        term: &str,
        meaning: &str,
        deck: Option<&str>,
    ) -> Result<Item, ReviewError> {
        if term.trim().is_empty() {
            return Err(ReviewError::InvalidArgument("term is empty".into()));
        }
        if let Some(deck) = deck {
            if self.store.get_deck(learner_id, deck).await?.is_none() {
                return Err(ReviewError::NotFound(format!("deck '{deck}'")));
            }
        }

        let now = self.clock.now();
        let mut item = Item::new(learner_id, term.trim(), meaning.trim(), now);
        if let Some(deck) = deck {
            item = item.in_deck(deck);
        }
        let state = ReviewState::seed(learner_id, &item.id, now);
        self.store.insert_item(item.clone(), state).await?;
        Ok(item)
    }

    async fn load_state(&self, learner_id: &str, item_id: &str) -> Result<ReviewState, ReviewError> {
        self.store
            .get_review_state(learner_id, item_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound(format!("review state for item '{item_id}'")))
    }

    /// Grade one item with a rating token from `scheme`.
    pub async fn review(
        &self,
        learner_id: &str,
        item_id: &str,
        token: &str,
        scheme: RatingScheme,
    ) -> Result<ReviewOutcome, ReviewError> {
        let rating = scheme.parse(token)?;
        let previous = self.load_state(learner_id, item_id).await?;

        let now = self.clock.now();
        let state = self.grader.grade(&previous, rating, now).await?;
        self.store.upsert_review_state(state.clone()).await?;

        let event = GradeEvent::new(learner_id, item_id, &rating.to_string(), now);
        self.append_event(&event).await?;

        tracing::debug!(
            learner = learner_id,
            item = item_id,
            %rating,
            interval = state.interval_days,
            ease = state.ease,
            "item reviewed"
        );
        Ok(ReviewOutcome {
            previous,
            state,
            event,
        })
    }

    /// Append a grade event, retrying with backoff.
    ///
    /// Safe to call again with an event from [`ReviewError::EventAppend`];
    /// the log ignores ids it already holds.
    pub async fn append_event(&self, event: &GradeEvent) -> Result<(), ReviewError> {
        let attempts = self.config.event_append_attempts.max(1);
        let mut delay = self.config.event_retry_delay;
        let mut attempt = 1;
        loop {
            match self.events.write(event).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    tracing::warn!(event = %event.id, attempt, "grade event append failed: {e}");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        event = %event.id,
                        learner = %event.learner_id,
                        "grade event not recorded after {attempts} attempts: {e}"
                    );
                    return Err(ReviewError::EventAppend {
                        event: event.clone(),
                        source: e,
                    });
                }
            }
        }
    }

    /// What each rating in `scheme` would do to the item, without saving.
    pub async fn preview(
        &self,
        learner_id: &str,
        item_id: &str,
        scheme: RatingScheme,
    ) -> Result<Vec<RatingPreview>, ReviewError> {
        let state = self.load_state(learner_id, item_id).await?;
        let now = self.clock.now();
        let mut previews = Vec::new();
        for rating in scheme.ratings() {
            let next = self.grader.grade(&state, rating, now).await?;
            previews.push(RatingPreview {
                rating,
                interval_days: next.interval_days,
                ease: next.ease,
            });
        }
        Ok(previews)
    }

    /// Current wall-clock time as seen by this service.
    pub fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }
}
