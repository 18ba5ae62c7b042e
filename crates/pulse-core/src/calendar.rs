//! Calendar helpers: strict `YYYY-MM-DD` decomposition, weekday filters,
//! inclusive date ranges and time-frame presets.
//!
//! Nothing in this module consults the host's local timezone. Dates are
//! plain calendar triples and weekdays are derived from the triple alone, so
//! `"2024-01-07"` is a Sunday on every machine.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PulseError;

// ── Strict date parsing ───────────────────────────────────────────────────────

/// Decompose `s` into `(year, month, day)` and build a calendar date.
///
/// The string must split on a literal `-` into exactly three non-empty,
/// all-digit components. Month must be 1-12 and day must exist in that
/// month (leap years honoured). Surrounding whitespace is ignored.
///
/// Returns `None` for anything else; callers decide how to report it.
pub fn parse_ymd(s: &str) -> Option<NaiveDate> {
    let mut parts = s.trim().split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let numeric = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if !(numeric(year) && numeric(month) && numeric(day)) {
        return None;
    }

    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Weekday index of `date` with Sunday = 0 … Saturday = 6.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// English weekday name, as shown in the day selectors.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

/// The date exactly `days` calendar days before `date`, if representable.
pub fn days_before(date: NaiveDate, days: u64) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(days))
}

// ── DayFilter ─────────────────────────────────────────────────────────────────

/// Day-of-week selector: every day, or one specific weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DayFilter {
    #[default]
    All,
    Only(Weekday),
}

impl DayFilter {
    /// `true` when `date` passes the filter.
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            DayFilter::All => true,
            DayFilter::Only(day) => date.weekday() == *day,
        }
    }
}

impl FromStr for DayFilter {
    type Err = PulseError;

    /// Accepts `All` or a weekday as a full English name or three-letter
    /// abbreviation, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let day = match lower.as_str() {
            "all" => return Ok(DayFilter::All),
            "sunday" | "sun" => Weekday::Sun,
            "monday" | "mon" => Weekday::Mon,
            "tuesday" | "tue" => Weekday::Tue,
            "wednesday" | "wed" => Weekday::Wed,
            "thursday" | "thu" => Weekday::Thu,
            "friday" | "fri" => Weekday::Fri,
            "saturday" | "sat" => Weekday::Sat,
            _ => return Err(PulseError::InvalidDayFilter(s.to_string())),
        };
        Ok(DayFilter::Only(day))
    }
}

impl fmt::Display for DayFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayFilter::All => write!(f, "All"),
            DayFilter::Only(day) => write!(f, "{}", weekday_name(*day)),
        }
    }
}

// ── DateRange ─────────────────────────────────────────────────────────────────

/// Inclusive `[start, end]` calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, swapping the bounds if they arrive reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// ── TimeFrame ─────────────────────────────────────────────────────────────────

/// Relative window presets offered by the dashboard selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeFrame {
    #[default]
    AllTime,
    Weekly,
    Monthly,
    SixMonths,
    Yearly,
}

impl TimeFrame {
    /// Resolve the preset against `today`.
    ///
    /// Month arithmetic clamps to the end of shorter months, so a monthly
    /// window ending on 31 March starts on 28/29 February. `AllTime`
    /// yields `None` (no bound).
    pub fn resolve(&self, today: NaiveDate) -> Option<DateRange> {
        let start = match self {
            TimeFrame::AllTime => return None,
            TimeFrame::Weekly => today.checked_sub_days(Days::new(7)),
            TimeFrame::Monthly => today.checked_sub_months(Months::new(1)),
            TimeFrame::SixMonths => today.checked_sub_months(Months::new(6)),
            TimeFrame::Yearly => today.checked_sub_months(Months::new(12)),
        }?;
        Some(DateRange::new(start, today))
    }
}

impl FromStr for TimeFrame {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all-time" | "historic" => Ok(TimeFrame::AllTime),
            "weekly" | "week" => Ok(TimeFrame::Weekly),
            "monthly" | "month" => Ok(TimeFrame::Monthly),
            "six-months" | "6m" => Ok(TimeFrame::SixMonths),
            "yearly" | "year" => Ok(TimeFrame::Yearly),
            _ => Err(PulseError::InvalidTimeFrame(s.to_string())),
        }
    }
}

// ── Timezone resolution ───────────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a configured timezone name. `"auto"` means the system zone;
/// unknown names fall back to UTC with a warning.
pub fn resolve_timezone(name: &str) -> Tz {
    let name = if name.eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        name.to_string()
    };
    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", name);
        Tz::UTC
    })
}

/// Today's calendar date in `tz`. Only used to anchor time-frame presets.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
