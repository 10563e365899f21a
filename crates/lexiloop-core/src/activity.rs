//! Monthly review-activity calendar.
//!
//! The grade event log is the primary source. When it cannot be read, or has
//! nothing for a month the review states show activity in, the calendar is
//! rebuilt from `ReviewState::last_reviewed_at`. That path counts at most one
//! review per item and is reported through [`ActivitySource`] so callers can
//! tell the two apart.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;
use crate::traits::{EventLog, ReviewStore};

/// Largest accepted UTC offset, in minutes (UTC+14:00).
pub const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Where a calendar's counts came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    EventLog,
    ReviewStateFallback,
}

/// Per-day review counts for one local calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCalendar {
    pub year: i32,
    pub month: u32,
    pub source: ActivitySource,
    /// `YYYY-MM-DD` in the learner's local time → reviews that day.
    pub days: BTreeMap<String, u32>,
}

impl ActivityCalendar {
    pub fn total(&self) -> u32 {
        self.days.values().sum()
    }
}

/// Reject UTC offsets outside -14:00..=+14:00.
pub fn check_offset(offset_minutes: i32) -> Result<(), ReviewError> {
    if !(-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&offset_minutes) {
        return Err(ReviewError::InvalidArgument(format!(
            "utc offset out of range: {offset_minutes} minutes"
        )));
    }
    Ok(())
}

/// The UTC instants bounding a local calendar month, as `[start, end)`.
pub fn month_window(
    year: i32,
    month: u32,
    offset_minutes: i32,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ReviewError> {
    if !(1..=12).contains(&month) {
        return Err(ReviewError::InvalidArgument(format!(
            "month must be 1-12, got {month}"
        )));
    }
    check_offset(offset_minutes)?;

    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ReviewError::InvalidArgument(format!("invalid year: {year}")))?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| ReviewError::InvalidArgument(format!("invalid year: {year}")))?;

    let offset = Duration::minutes(i64::from(offset_minutes));
    let local_midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|t| t.and_utc() - offset);
    match (local_midnight(first), local_midnight(next)) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(ReviewError::InvalidArgument(format!(
            "invalid month: {year}-{month:02}"
        ))),
    }
}

/// The learner-local calendar date of an instant.
pub fn local_date(instant: DateTime<Utc>, offset_minutes: i32) -> NaiveDate {
    (instant + Duration::minutes(i64::from(offset_minutes))).date_naive()
}

/// Count instants per local day, keeping only those inside the month.
fn bucket(
    instants: impl IntoIterator<Item = DateTime<Utc>>,
    year: i32,
    month: u32,
    offset_minutes: i32,
) -> BTreeMap<String, u32> {
    let mut days = BTreeMap::new();
    for instant in instants {
        let date = local_date(instant, offset_minutes);
        if date.year() == year && date.month() == month {
            *days.entry(date.format("%Y-%m-%d").to_string()).or_insert(0) += 1;
        }
    }
    days
}

pub struct ActivityAggregator {
    events: Arc<dyn EventLog>,
    store: Arc<dyn ReviewStore>,
}

impl ActivityAggregator {
    pub fn new(events: Arc<dyn EventLog>, store: Arc<dyn ReviewStore>) -> Self {
        Self { events, store }
    }

    /// Review counts per local day for `year`-`month`.
    pub async fn activity_for_month(
        &self,
        learner_id: &str,
        year: i32,
        month: u32,
        offset_minutes: i32,
    ) -> Result<ActivityCalendar, ReviewError> {
        let (start, end) = month_window(year, month, offset_minutes)?;

        let primary = match self.events.query(learner_id, start, end).await {
            Ok(events) => Some(bucket(
                events.into_iter().map(|e| e.reviewed_at),
                year,
                month,
                offset_minutes,
            )),
            Err(e) => {
                tracing::warn!(
                    learner = learner_id,
                    "event log query failed, falling back to review state: {e}"
                );
                None
            }
        };

        if let Some(days) = &primary {
            if !days.is_empty() {
                return Ok(ActivityCalendar {
                    year,
                    month,
                    source: ActivitySource::EventLog,
                    days: days.clone(),
                });
            }
        }

        let fallback = match self.store.review_states(learner_id).await {
            Ok(states) => bucket(
                states
                    .into_iter()
                    .filter_map(|s| s.last_reviewed_at)
                    .filter(|at| *at >= start && *at < end),
                year,
                month,
                offset_minutes,
            ),
            Err(e) => {
                return match primary {
                    // The log answered (with nothing); the fallback is only a cross-check.
                    Some(days) => Ok(ActivityCalendar {
                        year,
                        month,
                        source: ActivitySource::EventLog,
                        days,
                    }),
                    None => Err(ReviewError::Internal(format!(
                        "activity unavailable: event log and review state both failed: {e}"
                    ))),
                };
            }
        };

        match primary {
            Some(days) if fallback.is_empty() => Ok(ActivityCalendar {
                year,
                month,
                source: ActivitySource::EventLog,
                days,
            }),
            _ => {
                tracing::warn!(
                    learner = learner_id,
                    year,
                    month,
                    "activity derived from review state; repeat reviews are not counted"
                );
                Ok(ActivityCalendar {
                    year,
                    month,
                    source: ActivitySource::ReviewStateFallback,
                    days: fallback,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_shifts_by_offset() {
        let (start, end) = month_window(2024, 3, -120).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 4, 1, 2, 0, 0).unwrap());

        let (start, end) = month_window(2023, 12, 330).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 11, 30, 18, 30, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() - Duration::minutes(330));
    }

    #[test]
    fn late_utc_event_stays_on_local_day() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();
        assert_eq!(local_date(at, -120), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(local_date(at, 60), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn bucket_counts_and_drops_out_of_month() {
        let instants = vec![
            Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 1, 0, 0).unwrap(),
        ];
        let days = bucket(instants, 2024, 3, -120);
        assert_eq!(days.get("2024-03-01"), Some(&2));
        assert_eq!(days.get("2024-03-15"), Some(&1));
        // 01:00Z on April 1st is still March 31st at UTC-2.
        assert_eq!(days.get("2024-03-31"), Some(&1));
        assert_eq!(days.len(), 3);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(month_window(2024, 0, 0).is_err());
        assert!(month_window(2024, 13, 0).is_err());
        assert!(month_window(2024, 6, 900).is_err());
        assert!(month_window(2024, 6, -840).is_ok());
    }

    #[test]
    fn extreme_offsets_are_invalid_not_panics() {
        for offset in [i32::MIN, i32::MAX, -841, 841] {
            let err = month_window(2024, 3, offset).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
            assert!(check_offset(offset).is_err());
        }
        assert!(check_offset(840).is_ok());
        assert!(check_offset(-840).is_ok());
    }
}
