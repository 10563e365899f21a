//! Queue builder: picks what a learner should review right now.
//!
//! Precedence is due → new → recent. Due items come first, earliest due at
//! the front; never-graded items follow. Only when both are empty does the
//! builder fall back to items created in the last week, newest first.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ReviewError};
use crate::model::{Item, ReviewState, Scope};
use crate::traits::{Clock, ReviewStore};

/// How far back the recency fallback looks.
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Per-request caps on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueLimits {
    pub review_limit: usize,
    pub new_limit: usize,
}

impl QueueLimits {
    pub fn total(&self) -> usize {
        self.review_limit.saturating_add(self.new_limit)
    }
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            review_limit: 20,
            new_limit: 10,
        }
    }
}

/// Why an item is in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueSource {
    Due,
    New,
    Recent,
}

/// One entry of a built queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub item: Item,
    /// `None` when the state is missing from the store.
    pub state: Option<ReviewState>,
    pub source: QueueSource,
}

/// A queue plus the error tag, for callers that must always render something.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueResponse {
    pub entries: Vec<QueueEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct QueueBuilder {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
}

impl QueueBuilder {
    pub fn new(store: Arc<dyn ReviewStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Build the review queue for `learner_id` within `scope`.
    pub async fn build(
        &self,
        learner_id: &str,
        scope: &Scope,
        limits: QueueLimits,
    ) -> Result<Vec<QueueEntry>, ReviewError> {
        let items = self.resolve_scope(learner_id, scope).await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let states: HashMap<String, ReviewState> = self
            .store
            .review_states(learner_id)
            .await?
            .into_iter()
            .map(|s| (s.item_id.clone(), s))
            .collect();

        let now = self.clock.now();
        let entries = rank(items, &states, now, limits);
        tracing::debug!(
            learner = learner_id,
            count = entries.len(),
            "built review queue"
        );
        Ok(entries)
    }

    /// Like [`build`](Self::build), but degrades to an empty queue and an error tag.
    pub async fn build_or_empty(
        &self,
        learner_id: &str,
        scope: &Scope,
        limits: QueueLimits,
    ) -> QueueResponse {
        match self.build(learner_id, scope, limits).await {
            Ok(entries) => QueueResponse {
                entries,
                error: None,
            },
            Err(e) => {
                let kind: ErrorKind = e.kind();
                tracing::warn!(learner = learner_id, %kind, "queue build failed: {e}");
                QueueResponse {
                    entries: Vec::new(),
                    error: Some(kind.to_string()),
                }
            }
        }
    }

    async fn resolve_scope(&self, learner_id: &str, scope: &Scope) -> Result<Vec<Item>, ReviewError> {
        if let Some(deck) = scope.deck_name() {
            if self.store.get_deck(learner_id, deck).await?.is_none() {
                return Err(ReviewError::NotFound(format!("deck '{deck}'")));
            }
        }

        let mut items = self.store.items(learner_id).await?;
        if let Some(deck) = scope.deck_name() {
            items.retain(|i| i.deck.as_deref() == Some(deck));
        }
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        match scope {
            Scope::Group { index, size, .. } => {
                if *size == 0 {
                    return Err(ReviewError::InvalidArgument(
                        "group size must be at least 1".into(),
                    ));
                }
                Ok(items.into_iter().skip(index.saturating_mul(*size)).take(*size).collect())
            }
            _ => Ok(items),
        }
    }
}

/// Order scoped items into a queue. `items` must be oldest first.
pub fn rank(
    items: Vec<Item>,
    states: &HashMap<String, ReviewState>,
    now: DateTime<Utc>,
    limits: QueueLimits,
) -> Vec<QueueEntry> {
    let mut due = Vec::new();
    let mut new = Vec::new();

    for item in &items {
        match states.get(&item.id) {
            Some(state) if state.has_been_reviewed() => {
                if state.is_due(now) {
                    due.push((item.clone(), state.clone()));
                }
            }
            state => new.push(QueueEntry {
                item: item.clone(),
                state: state.cloned(),
                source: QueueSource::New,
            }),
        }
    }

    due.sort_by(|(a_item, a), (b_item, b)| {
        a.due_at
            .cmp(&b.due_at)
            .then_with(|| a_item.created_at.cmp(&b_item.created_at))
    });

    let mut queue: Vec<QueueEntry> = due
        .into_iter()
        .take(limits.review_limit)
        .map(|(item, state)| QueueEntry {
            item,
            state: Some(state),
            source: QueueSource::Due,
        })
        .collect();
    queue.extend(new.into_iter().take(limits.new_limit));

    if !queue.is_empty() {
        return queue;
    }

    let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
    let mut recent: Vec<Item> = items.into_iter().filter(|i| i.created_at >= cutoff).collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent
        .into_iter()
        .take(limits.total())
        .map(|item| QueueEntry {
            state: states.get(&item.id).cloned(),
            item,
            source: QueueSource::Recent,
        })
        .collect()
}
