use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::time::{hhmm, Span};

/// One bookable window for a provider on a date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilityUnit {
    pub id: String,
    pub provider_id: String,
    /// `None` marks a general (legacy) slot with no duration guarantee.
    pub service_id: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_open: bool,
}

impl AvailabilityUnit {
    pub fn stored_span(&self) -> Span {
        Span::new(self.start_time, self.end_time)
    }

    /// The appointment interval this unit stands for: `start + service duration` when
    /// the unit belongs to a service, otherwise its stored bounds.
    pub fn computed_span(&self, service_duration: Option<u32>) -> Span {
        match service_duration.and_then(|d| Span::starting_at(self.start_time, d)) {
            Some(span) => span,
            None => self.stored_span(),
        }
    }
}

/// Which dates in a range a generation request applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepeatPattern {
    /// Only the start date.
    Once,
    Daily,
    Weekdays,
    Weekends,
    Custom { days: Vec<Weekday> },
}

impl RepeatPattern {
    pub fn includes(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday();
        match self {
            RepeatPattern::Once | RepeatPattern::Daily => true,
            RepeatPattern::Weekdays => !is_weekend(weekday),
            RepeatPattern::Weekends => is_weekend(weekday),
            RepeatPattern::Custom { days } => days.contains(&weekday),
        }
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Unit listing filter.
#[derive(Debug, Clone, Default)]
pub struct UnitFilter {
    pub service_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub open_only: bool,
}

/// Earliest and latest dates that still have an open unit.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AvailabilityRange {
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}
