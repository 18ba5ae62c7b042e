//! In-memory view state.
//!
//! A [`Dashboard`] owns the latest normalized dataset together with the
//! active [`ViewFilters`] and recomputes every derived view on demand.
//! Loading a new dataset replaces the old one wholesale, so a slower,
//! superseded fetch that finishes last still leaves a consistent state.

use chrono::NaiveDate;
use pulse_core::calendar::DayFilter;
use pulse_core::models::{
    Delta, NormalizedRow, NormalizedSet, Ranking, SkipReason, TimeSeries, WeekdayComparison,
};
use pulse_core::settings::ViewFilters;
use pulse_data::aggregator::{Aggregator, Step};
use pulse_data::comparison::Comparator;
use serde::Serialize;
use tracing::debug;

/// Headline numbers for the overview panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub latest_date: Option<NaiveDate>,
    /// All labels combined.
    pub total: TimeSeries,
    pub total_delta: Delta,
    pub label: String,
    pub label_series: TimeSeries,
    pub label_delta: Delta,
}

#[derive(Debug, Default)]
pub struct Dashboard {
    loaded: Vec<NormalizedRow>,
    /// `loaded` narrowed to the active category.
    rows: Vec<NormalizedRow>,
    skipped: Vec<SkipReason>,
    filters: ViewFilters,
}

impl Dashboard {
    pub fn new(set: NormalizedSet, filters: ViewFilters) -> Self {
        let mut dashboard = Self {
            filters,
            ..Self::default()
        };
        dashboard.replace(set);
        dashboard
    }

    /// Swap in a freshly loaded dataset, keeping the filters.
    pub fn replace(&mut self, set: NormalizedSet) {
        self.loaded = set.rows;
        self.skipped = set.skipped;
        self.rows = Aggregator::filter_category(&self.loaded, self.filters.category.as_deref());
        debug!(
            "Dashboard holds {} rows ({} skipped)",
            self.rows.len(),
            self.skipped.len()
        );
    }

    pub fn set_filters(&mut self, filters: ViewFilters) {
        if filters.category != self.filters.category {
            self.rows = Aggregator::filter_category(&self.loaded, filters.category.as_deref());
        }
        self.filters = filters;
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn skipped(&self) -> &[SkipReason] {
        &self.skipped
    }

    pub fn available_dates(&self) -> Vec<NaiveDate> {
        Aggregator::available_dates(&self.rows)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        Aggregator::latest_date(&self.rows)
    }

    /// The date before or after `current` that has data.
    pub fn step(&self, current: NaiveDate, step: Step) -> Option<NaiveDate> {
        Aggregator::adjacent_date(&self.available_dates(), current, step)
    }

    /// Ranking for `date`, or for the latest date when `None`.
    /// Returns `None` when there is no data at all.
    pub fn ranking(&self, date: Option<NaiveDate>, n: usize) -> Option<Ranking> {
        let date = date.or_else(|| self.latest_date())?;
        Some(Aggregator::rank_top_n(&self.rows, date, n))
    }

    /// Daily totals under the active range and day filter.
    pub fn series(&self) -> TimeSeries {
        Aggregator::build_time_series(&self.rows, self.filters.range, self.filters.day)
    }

    /// Daily totals of one label under the active range and day filter.
    pub fn entity_series(&self, label: &str) -> TimeSeries {
        self.with_range(Aggregator::build_entity_series(&self.rows, label, self.filters.day))
    }

    /// Week-over-week change for the total and for `label`, both anchored
    /// at the latest date of the whole dataset.
    ///
    /// A label with no row on that date reports [`Delta::Unavailable`].
    /// Deltas use the unfiltered daily series; the returned series follow
    /// the active filters.
    pub fn overview(&self, label: &str) -> Overview {
        let latest_date = self.latest_date();
        let delta_at_latest = |series: &TimeSeries| match latest_date {
            Some(date) => Comparator::week_over_week_delta(series, date),
            None => Delta::Unavailable,
        };

        let full_total = Aggregator::build_time_series(&self.rows, None, DayFilter::All);
        let full_label = Aggregator::build_entity_series(&self.rows, label, DayFilter::All);

        Overview {
            latest_date,
            total: self.series(),
            total_delta: delta_at_latest(&full_total),
            label: label.to_string(),
            label_series: self.entity_series(label),
            label_delta: delta_at_latest(&full_label),
        }
    }

    /// Primary trace under the day filter and the optional comparison weekday.
    pub fn comparison(&self, label: Option<&str>) -> WeekdayComparison {
        let every_day = DayFilter::All;
        let series = match label {
            Some(label) => {
                self.with_range(Aggregator::build_entity_series(&self.rows, label, every_day))
            }
            None => Aggregator::build_time_series(&self.rows, self.filters.range, every_day),
        };
        Comparator::compare_weekdays(&series, self.filters.day, self.filters.compare_day)
    }

    fn with_range(&self, series: TimeSeries) -> TimeSeries {
        match self.filters.range {
            Some(range) => TimeSeries {
                points: series
                    .points
                    .into_iter()
                    .filter(|p| range.contains(p.date))
                    .collect(),
            },
            None => series,
        }
    }
}
