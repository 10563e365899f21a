//! Grading engine: maps (current state, rating) to the next review state.
//!
//! Two rating alphabets coexist. The legacy three-level scheme is computed
//! in-process; the four-level scheme is delegated to a
//! [`SchedulerProcedure`]. Both end in [`ReviewState::advance`], which holds
//! the ease/interval/due invariants for either path.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;
use crate::model::{ReviewState, MIN_EASE};
use crate::traits::{ScheduleOutcome, SchedulerProcedure};

/// Three-level rating alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyRating {
    Again,
    Hard,
    Good,
}

/// Four-level rating alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FourLevelRating {
    Forgot,
    Hard,
    Good,
    Easy,
}

/// Which alphabet a rating token belongs to. Chosen by the caller, since
/// `hard` and `good` exist in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RatingScheme {
    #[default]
    Legacy,
    FourLevel,
}

impl RatingScheme {
    /// Parse a rating token in this alphabet.
    pub fn parse(self, token: &str) -> Result<Rating, ReviewError> {
        let normalized = token.trim().to_lowercase();
        let rating = match (self, normalized.as_str()) {
            (RatingScheme::Legacy, "again") => Rating::Legacy(LegacyRating::Again),
            (RatingScheme::Legacy, "hard") => Rating::Legacy(LegacyRating::Hard),
            (RatingScheme::Legacy, "good") => Rating::Legacy(LegacyRating::Good),
            (RatingScheme::FourLevel, "forgot") => Rating::FourLevel(FourLevelRating::Forgot),
            (RatingScheme::FourLevel, "hard") => Rating::FourLevel(FourLevelRating::Hard),
            (RatingScheme::FourLevel, "good") => Rating::FourLevel(FourLevelRating::Good),
            (RatingScheme::FourLevel, "easy") => Rating::FourLevel(FourLevelRating::Easy),
            _ => {
                return Err(ReviewError::InvalidArgument(format!(
                    "unknown {} rating: {:?}",
                    self, token
                )))
            }
        };
        Ok(rating)
    }

    /// Every rating in this alphabet, weakest first.
    pub fn ratings(self) -> Vec<Rating> {
        match self {
            RatingScheme::Legacy => vec![
                Rating::Legacy(LegacyRating::Again),
                Rating::Legacy(LegacyRating::Hard),
                Rating::Legacy(LegacyRating::Good),
            ],
            RatingScheme::FourLevel => vec![
                Rating::FourLevel(FourLevelRating::Forgot),
                Rating::FourLevel(FourLevelRating::Hard),
                Rating::FourLevel(FourLevelRating::Good),
                Rating::FourLevel(FourLevelRating::Easy),
            ],
        }
    }
}

impl fmt::Display for RatingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingScheme::Legacy => write!(f, "legacy"),
            RatingScheme::FourLevel => write!(f, "four-level"),
        }
    }
}

impl std::str::FromStr for RatingScheme {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" | "3" => Ok(RatingScheme::Legacy),
            "four-level" | "four" | "4" => Ok(RatingScheme::FourLevel),
            other => Err(ReviewError::InvalidArgument(format!(
                "unknown rating scheme: {other}"
            ))),
        }
    }
}

/// A parsed rating tagged with its alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "rating", rename_all = "kebab-case")]
pub enum Rating {
    Legacy(LegacyRating),
    FourLevel(FourLevelRating),
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Rating::Legacy(LegacyRating::Again) => "again",
            Rating::Legacy(LegacyRating::Hard) | Rating::FourLevel(FourLevelRating::Hard) => "hard",
            Rating::Legacy(LegacyRating::Good) | Rating::FourLevel(FourLevelRating::Good) => "good",
            Rating::FourLevel(FourLevelRating::Forgot) => "forgot",
            Rating::FourLevel(FourLevelRating::Easy) => "easy",
        };
        f.write_str(token)
    }
}

/// Apply a legacy three-level rating.
///
/// | rating | ease'               | interval'                      |
/// |--------|---------------------|--------------------------------|
/// | again  | max(1.3, ease-0.2)  | 1                              |
/// | hard   | max(1.3, ease-0.05) | max(1, round(interval * 1.5))  |
/// | good   | min(2.8, ease+0.05) | max(1, round(interval * ease)) |
pub fn grade_legacy(state: &ReviewState, rating: LegacyRating, now: DateTime<Utc>) -> ReviewState {
    let interval = f64::from(state.interval_days);
    let (ease, interval_days) = match rating {
        LegacyRating::Again => ((state.ease - 0.2).max(MIN_EASE), 1),
        LegacyRating::Hard => ((state.ease - 0.05).max(MIN_EASE), round_days(interval * 1.5)),
        LegacyRating::Good => (state.ease + 0.05, round_days(interval * state.ease)),
    };
    state.advance(ease, interval_days, now)
}

fn round_days(days: f64) -> u32 {
    if !days.is_finite() || days < 1.0 {
        return 1;
    }
    days.round().min(f64::from(u32::MAX)) as u32
}

/// Four-level SM-2 variant used when no other procedure is configured.
#[derive(Debug, Clone)]
pub struct Sm2Procedure {
    /// Interval multiplier for `hard`.
    pub hard_multiplier: f64,
    /// Extra multiplier for `easy`.
    pub easy_bonus: f64,
    /// Smallest interval an `easy` rating produces.
    pub easy_min_days: u32,
}

impl Default for Sm2Procedure {
    fn default() -> Self {
        Self {
            hard_multiplier: 1.2,
            easy_bonus: 1.3,
            easy_min_days: 4,
        }
    }
}

#[async_trait]
impl SchedulerProcedure for Sm2Procedure {
    fn name(&self) -> &str {
        "sm2"
    }

    async fn compute(
        &self,
        state: &ReviewState,
        rating: FourLevelRating,
        _now: DateTime<Utc>,
    ) -> anyhow::Result<ScheduleOutcome> {
        let interval = f64::from(state.interval_days);
        let (ease, interval_days) = match rating {
            FourLevelRating::Forgot => (state.ease - 0.2, 1),
            FourLevelRating::Hard => (state.ease - 0.15, round_days(interval * self.hard_multiplier)),
            FourLevelRating::Good => (state.ease, round_days(interval * state.ease)),
            FourLevelRating::Easy => {
                let ease = state.ease + 0.15;
                let days = round_days(interval * ease * self.easy_bonus).max(self.easy_min_days);
                (ease, days)
            }
        };
        Ok(ScheduleOutcome {
            ease,
            interval_days,
        })
    }
}

/// One grading capability over both alphabets.
#[derive(Clone)]
pub struct Grader {
    procedure: Arc<dyn SchedulerProcedure>,
}

impl Grader {
    pub fn new(procedure: Arc<dyn SchedulerProcedure>) -> Self {
        Self { procedure }
    }

    /// Compute the successor state for `rating`. Does not touch storage.
    pub async fn grade(
        &self,
        state: &ReviewState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<ReviewState, ReviewError> {
        match rating {
            Rating::Legacy(rating) => Ok(grade_legacy(state, rating, now)),
            Rating::FourLevel(rating) => {
                let outcome = self
                    .procedure
                    .compute(state, rating, now)
                    .await
                    .map_err(|e| {
                        ReviewError::Upstream(
                            e.context(format!("scheduler '{}' failed", self.procedure.name())),
                        )
                    })?;
                Ok(state.advance(outcome.ease, outcome.interval_days, now))
            }
        }
    }
}

impl Default for Grader {
    fn default() -> Self {
        Self::new(Arc::new(Sm2Procedure::default()))
    }
}
