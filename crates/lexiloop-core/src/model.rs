//! Core data model types for lexiloop.
//!
//! These are the records the review engine reads and writes: learning items,
//! their memory-strength state, the append-only grade log, and the daily
//! practice artifact.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReviewError;

/// Lowest ease a review state may hold.
pub const MIN_EASE: f64 = 1.3;
/// Highest ease a review state may hold.
pub const MAX_EASE: f64 = 2.8;
/// Ease assigned to freshly created items.
pub const DEFAULT_EASE: f64 = 2.5;

/// A single learnable unit (vocabulary entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier for this item.
    pub id: String,
    /// Owning learner.
    pub learner_id: String,
    /// The word or phrase being learned.
    pub term: String,
    /// Meaning or translation shown on the back of the card.
    #[serde(default)]
    pub meaning: String,
    /// Deck this item belongs to, if any.
    #[serde(default)]
    pub deck: Option<String>,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn new(learner_id: &str, term: &str, meaning: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            term: term.to_string(),
            meaning: meaning.to_string(),
            deck: None,
            created_at: now,
        }
    }

    pub fn in_deck(mut self, deck: &str) -> Self {
        self.deck = Some(deck.to_string());
        self
    }
}

/// A named collection of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub learner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Memory-strength record for one (learner, item) pair.
///
/// `ease` and `interval_days` change only through the grading engine; the
/// fields are public for storage round-trips, not for direct mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub learner_id: String,
    pub item_id: String,
    /// Multiplier in `[MIN_EASE, MAX_EASE]`.
    pub ease: f64,
    /// Days until the next due date, always at least 1.
    pub interval_days: u32,
    /// The item is reviewable once `due_at <= now`.
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewState {
    /// The state seeded when an item is created.
    pub fn seed(learner_id: &str, item_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            item_id: item_id.to_string(),
            ease: DEFAULT_EASE,
            interval_days: 1,
            due_at: now,
            last_reviewed_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }

    /// Whether this item has been graded at least once.
    pub fn has_been_reviewed(&self) -> bool {
        self.last_reviewed_at.is_some()
    }

    /// Build the successor state from a computed ease and interval.
    ///
    /// Clamps both into their domains and derives `due_at` from the interval,
    /// so every grading path ends here.
    pub(crate) fn advance(&self, ease: f64, interval_days: u32, now: DateTime<Utc>) -> Self {
        let ease = if ease.is_finite() {
            ease.clamp(MIN_EASE, MAX_EASE)
        } else {
            self.ease.clamp(MIN_EASE, MAX_EASE)
        };
        let interval_days = interval_days.max(1);
        Self {
            learner_id: self.learner_id.clone(),
            item_id: self.item_id.clone(),
            ease: round_ease(ease),
            interval_days,
            due_at: now + Duration::days(i64::from(interval_days)),
            last_reviewed_at: Some(now),
        }
    }
}

/// Round to two decimals so repeated ±0.05 steps do not drift.
fn round_ease(ease: f64) -> f64 {
    (ease * 100.0).round() / 100.0
}

/// Append-only record of one grading event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeEvent {
    /// Unique id; appending the same event twice is a no-op at the log.
    pub id: Uuid,
    pub learner_id: String,
    pub item_id: String,
    /// Rating token as submitted.
    pub rating: String,
    pub reviewed_at: DateTime<Utc>,
}

impl GradeEvent {
    pub fn new(learner_id: &str, item_id: &str, rating: &str, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            item_id: item_id.to_string(),
            rating: rating.to_string(),
            reviewed_at,
        }
    }
}

/// Kind of generated artifact. Only the daily story exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Daily,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Daily => write!(f, "daily"),
        }
    }
}

/// The one generated story permitted per learner per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyArtifact {
    pub id: Uuid,
    pub learner_id: String,
    pub kind: ArtifactKind,
    pub date: NaiveDate,
    /// Generated story text.
    pub text: String,
    pub level: Level,
    pub length: StoryLength,
    /// Set once the learner confirms the story; never reset.
    pub saved: bool,
    /// Items embedded in the story, in selection order.
    pub target_item_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// CEFR difficulty level of generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::A1 => "A1",
            Level::A2 => "A2",
            Level::B1 => "B1",
            Level::B2 => "B2",
            Level::C1 => "C1",
            Level::C2 => "C2",
        };
        f.write_str(s)
    }
}

impl FromStr for Level {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(Level::A1),
            "A2" => Ok(Level::A2),
            "B1" => Ok(Level::B1),
            "B2" => Ok(Level::B2),
            "C1" => Ok(Level::C1),
            "C2" => Ok(Level::C2),
            other => Err(ReviewError::InvalidArgument(format!(
                "unknown level: {other}"
            ))),
        }
    }
}

/// Desired story length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl StoryLength {
    /// How many vocabulary items a story of this length embeds.
    pub fn target_count(self) -> usize {
        match self {
            StoryLength::Short => 10,
            StoryLength::Long => 14,
            StoryLength::Medium => 12,
        }
    }

    /// Approximate word budget handed to the generator.
    pub fn word_budget(self) -> u32 {
        match self {
            StoryLength::Short => 120,
            StoryLength::Medium => 200,
            StoryLength::Long => 300,
        }
    }
}

impl fmt::Display for StoryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoryLength::Short => write!(f, "short"),
            StoryLength::Medium => write!(f, "medium"),
            StoryLength::Long => write!(f, "long"),
        }
    }
}

impl FromStr for StoryLength {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(StoryLength::Short),
            "medium" => Ok(StoryLength::Medium),
            "long" => Ok(StoryLength::Long),
            other => Err(ReviewError::InvalidArgument(format!(
                "unknown story length: {other}"
            ))),
        }
    }
}

/// A collection boundary used to pick queue candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Scope {
    /// Every item the learner owns.
    All,
    /// Items of one named deck.
    Deck { name: String },
    /// The `index`-th block of `size` items, ordered by creation time,
    /// taken from one deck or from all items.
    Group {
        #[serde(default)]
        deck: Option<String>,
        index: usize,
        size: usize,
    },
}

impl Scope {
    pub fn deck(name: &str) -> Self {
        Scope::Deck {
            name: name.to_string(),
        }
    }

    /// The deck this scope names, if any.
    pub fn deck_name(&self) -> Option<&str> {
        match self {
            Scope::All => None,
            Scope::Deck { name } => Some(name),
            Scope::Group { deck, .. } => deck.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_uses_defaults() {
        let now = Utc::now();
        let state = ReviewState::seed("alice", "item-1", now);
        assert_eq!(state.ease, 2.5);
        assert_eq!(state.interval_days, 1);
        assert_eq!(state.due_at, now);
        assert!(state.last_reviewed_at.is_none());
        assert!(state.is_due(now));
    }

    #[test]
    fn advance_clamps_and_derives_due() {
        let now = Utc::now();
        let state = ReviewState::seed("alice", "item-1", now);

        let next = state.advance(9.0, 0, now);
        assert_eq!(next.ease, MAX_EASE);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.due_at, now + Duration::days(1));
        assert_eq!(next.last_reviewed_at, Some(now));

        let low = state.advance(f64::NAN, 4, now);
        assert_eq!(low.ease, 2.5);
        assert_eq!(low.due_at, now + Duration::days(4));
    }

    #[test]
    fn level_and_length_parse() {
        assert_eq!("b1".parse::<Level>().unwrap(), Level::B1);
        assert!("D1".parse::<Level>().is_err());
        assert_eq!("LONG".parse::<StoryLength>().unwrap(), StoryLength::Long);
        assert!("epic".parse::<StoryLength>().is_err());
    }

    #[test]
    fn target_counts_follow_length() {
        assert_eq!(StoryLength::Short.target_count(), 10);
        assert_eq!(StoryLength::Medium.target_count(), 12);
        assert_eq!(StoryLength::Long.target_count(), 14);
    }

    #[test]
    fn scope_serde_roundtrip() {
        let scope = Scope::Group {
            deck: Some("verbs".into()),
            index: 1,
            size: 20,
        };
        let json = serde_json::to_string(&scope).unwrap();
        let back: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
        assert_eq!(back.deck_name(), Some("verbs"));
    }
}
