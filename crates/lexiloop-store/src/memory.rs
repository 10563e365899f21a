//! In-memory store and event log.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use lexiloop_core::model::{ArtifactKind, DailyArtifact, Deck, GradeEvent, Item, ReviewState};
use lexiloop_core::traits::{EventLog, ReviewStore, StoreResult};
use lexiloop_core::StoreError;

type PairKey = (String, String);
type ArtifactKey = (String, ArtifactKind, NaiveDate);

/// Everything the store holds, in a serializable shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub decks: Vec<Deck>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub review_states: Vec<ReviewState>,
    #[serde(default)]
    pub events: Vec<GradeEvent>,
    #[serde(default)]
    pub artifacts: Vec<DailyArtifact>,
}

#[derive(Default)]
struct Tables {
    decks: BTreeMap<PairKey, Deck>,
    // Keyed by (learner, item id); kept separately from creation order.
    items: BTreeMap<PairKey, Item>,
    item_order: Vec<PairKey>,
    review_states: BTreeMap<PairKey, ReviewState>,
    events: Vec<GradeEvent>,
    event_ids: HashSet<uuid::Uuid>,
    artifacts: BTreeMap<ArtifactKey, DailyArtifact>,
}

/// A [`ReviewStore`] and [`EventLog`] held in process memory.
///
/// One write lock covers every table, so each trait call is atomic and the
/// uniqueness checks cannot race.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut tables = Tables::default();
        for deck in snapshot.decks {
            tables
                .decks
                .insert((deck.learner_id.clone(), deck.name.clone()), deck);
        }
        let mut items = snapshot.items;
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        for item in items {
            let key = (item.learner_id.clone(), item.id.clone());
            anyhow::ensure!(
                !tables.items.contains_key(&key),
                "duplicate item in snapshot: {}",
                item.id
            );
            tables.item_order.push(key.clone());
            tables.items.insert(key, item);
        }
        for state in snapshot.review_states {
            tables
                .review_states
                .insert((state.learner_id.clone(), state.item_id.clone()), state);
        }
        for event in snapshot.events {
            if tables.event_ids.insert(event.id) {
                tables.events.push(event);
            }
        }
        for artifact in snapshot.artifacts {
            let key = (artifact.learner_id.clone(), artifact.kind, artifact.date);
            anyhow::ensure!(
                !tables.artifacts.contains_key(&key),
                "duplicate daily artifact in snapshot for {} on {}",
                artifact.learner_id,
                artifact.date
            );
            tables.artifacts.insert(key, artifact);
        }
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        let tables = self.tables.read().await;
        Snapshot {
            decks: tables.decks.values().cloned().collect(),
            items: tables
                .item_order
                .iter()
                .filter_map(|k| tables.items.get(k).cloned())
                .collect(),
            review_states: tables.review_states.values().cloned().collect(),
            events: tables.events.clone(),
            artifacts: tables.artifacts.values().cloned().collect(),
        }
    }

    /// Load a store from a JSON snapshot file; a missing file yields an empty store.
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read store: {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse store: {}", path.display()))?;
        Self::from_snapshot(snapshot)
    }

    /// Write the store to `path` as pretty-printed JSON.
    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot().await;
        let json = serde_json::to_string_pretty(&snapshot)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write store: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "store snapshot saved");
        Ok(())
    }

    /// Drop a review state without going through the engine.
    pub async fn remove_review_state(&self, learner_id: &str, item_id: &str) -> bool {
        self.tables
            .write()
            .await
            .review_states
            .remove(&(learner_id.to_string(), item_id.to_string()))
            .is_some()
    }

    /// Number of daily artifacts stored for a learner.
    pub async fn artifact_count(&self, learner_id: &str) -> usize {
        self.tables
            .read()
            .await
            .artifacts
            .keys()
            .filter(|(learner, _, _)| learner == learner_id)
            .count()
    }

    /// Number of grade events stored for a learner.
    pub async fn event_count(&self, learner_id: &str) -> usize {
        self.tables
            .read()
            .await
            .events
            .iter()
            .filter(|e| e.learner_id == learner_id)
            .count()
    }
}

fn pair(learner_id: &str, other: &str) -> PairKey {
    (learner_id.to_string(), other.to_string())
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_deck(&self, deck: Deck) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let key = pair(&deck.learner_id, &deck.name);
        if tables.decks.contains_key(&key) {
            return Err(StoreError::ConstraintViolation(format!(
                "deck '{}' already exists",
                deck.name
            )));
        }
        tables.decks.insert(key, deck);
        Ok(())
    }

    async fn get_deck(&self, learner_id: &str, name: &str) -> StoreResult<Option<Deck>> {
        Ok(self.tables.read().await.decks.get(&pair(learner_id, name)).cloned())
    }

    async fn insert_item(&self, item: Item, state: ReviewState) -> StoreResult<()> {
        if state.learner_id != item.learner_id || state.item_id != item.id {
            return Err(StoreError::Backend(
                "review state does not belong to the item".into(),
            ));
        }
        let mut tables = self.tables.write().await;
        let key = pair(&item.learner_id, &item.id);
        if tables.items.contains_key(&key) || tables.review_states.contains_key(&key) {
            return Err(StoreError::ConstraintViolation(format!(
                "item '{}' already exists",
                item.id
            )));
        }
        tables.item_order.push(key.clone());
        tables.items.insert(key.clone(), item);
        tables.review_states.insert(key, state);
        Ok(())
    }

    async fn items(&self, learner_id: &str) -> StoreResult<Vec<Item>> {
        let tables = self.tables.read().await;
        Ok(tables
            .item_order
            .iter()
            .filter(|(learner, _)| learner == learner_id)
            .filter_map(|k| tables.items.get(k).cloned())
            .collect())
    }

    async fn get_review_state(
        &self,
        learner_id: &str,
        item_id: &str,
    ) -> StoreResult<Option<ReviewState>> {
        Ok(self
            .tables
            .read()
            .await
            .review_states
            .get(&pair(learner_id, item_id))
            .cloned())
    }

    async fn upsert_review_state(&self, state: ReviewState) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let key = pair(&state.learner_id, &state.item_id);
        tables.review_states.insert(key, state);
        Ok(())
    }

    async fn review_states(&self, learner_id: &str) -> StoreResult<Vec<ReviewState>> {
        Ok(self
            .tables
            .read()
            .await
            .review_states
            .values()
            .filter(|s| s.learner_id == learner_id)
            .cloned()
            .collect())
    }

    async fn get_artifact(
        &self,
        learner_id: &str,
        kind: ArtifactKind,
        date: NaiveDate,
    ) -> StoreResult<Option<DailyArtifact>> {
        Ok(self
            .tables
            .read()
            .await
            .artifacts
            .get(&(learner_id.to_string(), kind, date))
            .cloned())
    }

    async fn insert_artifact(&self, artifact: DailyArtifact) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let key = (artifact.learner_id.clone(), artifact.kind, artifact.date);
        if tables.artifacts.contains_key(&key) {
            return Err(StoreError::ConstraintViolation(format!(
                "{} artifact for {} on {} already exists",
                artifact.kind, artifact.learner_id, artifact.date
            )));
        }
        tables.artifacts.insert(key, artifact);
        Ok(())
    }

    async fn update_artifact(&self, artifact: DailyArtifact) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let key = (artifact.learner_id.clone(), artifact.kind, artifact.date);
        match tables.artifacts.get_mut(&key) {
            Some(existing) if existing.id == artifact.id => {
                *existing = artifact;
                Ok(())
            }
            Some(_) => Err(StoreError::ConstraintViolation(format!(
                "artifact {} does not own its key",
                artifact.id
            ))),
            None => Err(StoreError::Backend(format!(
                "artifact {} not found",
                artifact.id
            ))),
        }
    }
}

#[async_trait]
impl EventLog for MemoryStore {
    async fn write(&self, event: &GradeEvent) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.event_ids.insert(event.id) {
            tables.events.push(event.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        learner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<GradeEvent>> {
        Ok(self
            .tables
            .read()
            .await
            .events
            .iter()
            .filter(|e| e.learner_id == learner_id && e.reviewed_at >= start && e.reviewed_at < end)
            .cloned()
            .collect())
    }
}
