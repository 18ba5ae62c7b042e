//! Week-over-week deltas and day-of-week comparison traces.

use chrono::{NaiveDate, Weekday};
use pulse_core::calendar::{days_before, DayFilter};
use pulse_core::models::{Delta, TimeSeries, WeekdayComparison};

/// Calendar distance used for "compared to last week".
const WEEK_DAYS: u64 = 7;

/// Stateless collection of comparisons over a [`TimeSeries`].
pub struct Comparator;

impl Comparator {
    /// Compare the value at `anchor` with the value exactly seven calendar
    /// days earlier.
    ///
    /// Returns [`Delta::Unavailable`] when either point is missing from the
    /// series. A zero previous value still yields the absolute change but
    /// no percentage.
    pub fn week_over_week_delta(series: &TimeSeries, anchor: NaiveDate) -> Delta {
        let Some(current) = series.value_at(anchor) else {
            return Delta::Unavailable;
        };
        let Some(previous) = days_before(anchor, WEEK_DAYS).and_then(|d| series.value_at(d)) else {
            return Delta::Unavailable;
        };

        let absolute = to_i64(current).saturating_sub(to_i64(previous));
        let percentage = if previous == 0 {
            None
        } else {
            Some((current as f64 - previous as f64) / previous as f64 * 100.0)
        };

        Delta::Available {
            current,
            previous,
            absolute,
            percentage,
        }
    }

    /// [`Comparator::week_over_week_delta`] anchored at the series' last point.
    pub fn latest_week_over_week(series: &TimeSeries) -> Delta {
        match series.last() {
            Some(point) => Self::week_over_week_delta(series, point.date),
            None => Delta::Unavailable,
        }
    }

    /// Split a series into the primary trace (filtered by `primary`) and an
    /// optional comparison trace restricted to `compare`.
    pub fn compare_weekdays(
        series: &TimeSeries,
        primary: DayFilter,
        compare: Option<Weekday>,
    ) -> WeekdayComparison {
        let pick = |filter: DayFilter| TimeSeries {
            points: series
                .points
                .iter()
                .filter(|p| filter.matches(p.date))
                .cloned()
                .collect(),
        };

        WeekdayComparison {
            primary: pick(primary),
            comparison: compare
                .map(|day| pick(DayFilter::Only(day)))
                .unwrap_or_default(),
            compare_day: compare,
        }
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::models::SeriesPoint;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_series(points: &[(NaiveDate, u64)]) -> TimeSeries {
        TimeSeries {
            points: points
                .iter()
                .map(|(d, v)| SeriesPoint::new(*d, *v))
                .collect(),
        }
    }

    #[test]
    fn test_single_point_is_unavailable() {
        let series = make_series(&[(ymd(2024, 6, 8), 100)]);
        assert_eq!(
            Comparator::week_over_week_delta(&series, ymd(2024, 6, 8)),
            Delta::Unavailable
        );
        assert_eq!(Comparator::latest_week_over_week(&series), Delta::Unavailable);
    }

    #[test]
    fn test_empty_series_is_unavailable() {
        let series = TimeSeries::default();
        assert_eq!(Comparator::latest_week_over_week(&series), Delta::Unavailable);
    }

    #[test]
    fn test_missing_anchor_is_unavailable() {
        let series = make_series(&[(ymd(2024, 6, 1), 100)]);
        assert_eq!(
            Comparator::week_over_week_delta(&series, ymd(2024, 6, 8)),
            Delta::Unavailable
        );
    }

    #[test]
    fn test_prior_point_must_be_exactly_seven_days_back() {
        let series = make_series(&[(ymd(2024, 6, 2), 100), (ymd(2024, 6, 8), 120)]);
        assert_eq!(
            Comparator::week_over_week_delta(&series, ymd(2024, 6, 8)),
            Delta::Unavailable
        );
    }

    #[test]
    fn test_week_over_week_increase() {
        let series = make_series(&[
            (ymd(2024, 6, 1), 100),
            (ymd(2024, 6, 5), 3),
            (ymd(2024, 6, 8), 125),
        ]);
        let delta = Comparator::week_over_week_delta(&series, ymd(2024, 6, 8));
        assert_eq!(
            delta,
            Delta::Available {
                current: 125,
                previous: 100,
                absolute: 25,
                percentage: Some(25.0),
            }
        );
    }

    #[test]
    fn test_week_over_week_decrease_across_month_boundary() {
        let series = make_series(&[(ymd(2024, 2, 27), 200), (ymd(2024, 3, 5), 150)]);
        match Comparator::latest_week_over_week(&series) {
            Delta::Available {
                absolute,
                percentage,
                ..
            } => {
                assert_eq!(absolute, -50);
                assert!((percentage.unwrap() + 25.0).abs() < 1e-9);
            }
            Delta::Unavailable => panic!("expected a delta"),
        }
    }

    #[test]
    fn test_zero_previous_has_no_percentage() {
        let series = make_series(&[(ymd(2024, 6, 1), 0), (ymd(2024, 6, 8), 40)]);
        assert_eq!(
            Comparator::week_over_week_delta(&series, ymd(2024, 6, 8)),
            Delta::Available {
                current: 40,
                previous: 0,
                absolute: 40,
                percentage: None,
            }
        );
    }

    #[test]
    fn test_compare_weekdays() {
        // 2024-01-06 Sat, 07 Sun, 08 Mon, 13 Sat, 14 Sun
        let series = make_series(&[
            (ymd(2024, 1, 6), 1),
            (ymd(2024, 1, 7), 2),
            (ymd(2024, 1, 8), 3),
            (ymd(2024, 1, 13), 4),
            (ymd(2024, 1, 14), 5),
        ]);

        let sundays = DayFilter::Only(Weekday::Sun);
        let cmp = Comparator::compare_weekdays(&series, sundays, Some(Weekday::Sat));
        let primary: Vec<u64> = cmp.primary.points.iter().map(|p| p.value).collect();
        let comparison: Vec<u64> = cmp.comparison.points.iter().map(|p| p.value).collect();
        assert_eq!(primary, vec![2, 5]);
        assert_eq!(comparison, vec![1, 4]);
        assert_eq!(cmp.compare_day, Some(Weekday::Sat));
    }

    #[test]
    fn test_compare_weekdays_without_comparison() {
        let series = make_series(&[(ymd(2024, 1, 6), 1), (ymd(2024, 1, 7), 2)]);
        let cmp = Comparator::compare_weekdays(&series, DayFilter::All, None);
        assert_eq!(cmp.primary, series);
        assert!(cmp.comparison.is_empty());
        assert!(cmp.compare_day.is_none());
    }
}
