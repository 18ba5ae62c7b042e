use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::weekday_index;

// ── Input side ────────────────────────────────────────────────────────────────

/// One parsed CSV line: header name → raw cell text.
pub type RawRecord = HashMap<String, String>;

/// Which header names feed each field of a [`NormalizedRow`].
///
/// Header matching is exact (case- and whitespace-sensitive), as exported by
/// the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub date: String,
    pub label: String,
    pub count: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            label: "Object".to_string(),
            count: "Request Count".to_string(),
            category: None,
        }
    }
}

/// The canonical unit every aggregation works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// Calendar date with no time-of-day or timezone attached.
    pub date: NaiveDate,
    /// Entity the count is attributed to (endpoint path, event name, ...).
    pub label: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Why a data row was dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", content = "value", rename_all = "snake_case")]
pub enum SkipCause {
    MissingDate,
    InvalidDate(String),
    MissingCount,
    InvalidCount(String),
}

impl fmt::Display for SkipCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipCause::MissingDate => write!(f, "missing date"),
            SkipCause::InvalidDate(v) => write!(f, "invalid date ({v:?})"),
            SkipCause::MissingCount => write!(f, "missing count"),
            SkipCause::InvalidCount(v) => write!(f, "invalid count ({v:?})"),
        }
    }
}

/// A rejected row: its zero-based index among the data rows plus the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReason {
    pub row: usize,
    /// One-based line in the source document where the record starts.
    pub line: u64,
    pub cause: SkipCause,
}

impl SkipReason {
    /// One-based line number in the source document, header included.
    /// Blank lines and multi-line quoted fields before the row are counted.
    pub fn source_line(&self) -> u64 {
        self.line
    }
}

/// Output of normalization: accepted rows in input order plus skips.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedSet {
    pub rows: Vec<NormalizedRow>,
    pub skipped: Vec<SkipReason>,
}

impl NormalizedSet {
    /// Number of data rows seen (accepted + rejected).
    pub fn total_rows(&self) -> usize {
        self.rows.len() + self.skipped.len()
    }
}

// ── Projections ───────────────────────────────────────────────────────────────

/// Totals for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_count: u64,
    /// Per-label breakdown; only filled when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_label: Option<BTreeMap<String, u64>>,
}

/// One line of a [`Ranking`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub label: String,
    pub count: u64,
    /// Share of the whole day's total (not of the truncated top N), 0-100.
    pub percentage: f64,
}

/// Top-N labels for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub date: NaiveDate,
    /// Sum over every label of the day.
    pub total_count: u64,
    pub entries: Vec<RankingEntry>,
}

/// A single chart point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: u64,
    /// Sunday = 0 … Saturday = 6.
    pub day_of_week: u8,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: u64) -> Self {
        Self {
            date,
            value,
            day_of_week: weekday_index(date),
        }
    }

    /// Sundays are highlighted in the trend charts.
    pub fn is_sunday(&self) -> bool {
        self.day_of_week == 0
    }
}

/// Date-ascending series with at most one point per date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Value recorded on `date`, if any.
    pub fn value_at(&self, date: NaiveDate) -> Option<u64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }
}

/// Change between a date's value and the value 7 days earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delta {
    /// The anchor or the prior point is missing from the series.
    Unavailable,
    Available {
        current: u64,
        previous: u64,
        absolute: i64,
        /// `None` when `previous` is 0.
        percentage: Option<f64>,
    },
}

/// Primary and comparison traces for the day-of-week compare view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayComparison {
    pub primary: TimeSeries,
    /// Empty when no comparison day was requested.
    pub comparison: TimeSeries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_day: Option<Weekday>,
}
