//! Per-day aggregation over normalized rows.
//!
//! Every function here is a pure projection of a row slice plus filter
//! parameters. Nothing is cached; callers re-run them on every filter change.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use pulse_core::calendar::{DateRange, DayFilter};
use pulse_core::formatting::share_of;
use pulse_core::models::{
    DailyAggregate, NormalizedRow, Ranking, RankingEntry, SeriesPoint, TimeSeries,
};

/// Ranking length used by the table view.
pub const DEFAULT_TOP_N: usize = 50;

/// Direction for stepping through the available dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Previous,
    Next,
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Stateless helper that groups rows by date and label.
pub struct Aggregator;

impl Aggregator {
    /// Top `n` labels on `date`, by summed count.
    ///
    /// Percentages are relative to the whole day's total, not to the
    /// truncated list. Equal counts keep the order in which labels were
    /// first seen. A zero total reports every percentage as 0.
    pub fn rank_top_n(rows: &[NormalizedRow], date: NaiveDate, n: usize) -> Ranking {
        let mut order: Vec<(&str, u64)> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();

        for row in rows.iter().filter(|r| r.date == date) {
            let slot = *slots.entry(row.label.as_str()).or_insert_with(|| {
                order.push((row.label.as_str(), 0));
                order.len() - 1
            });
            order[slot].1 = order[slot].1.saturating_add(row.count);
        }

        let total_count = order
            .iter()
            .fold(0u64, |acc, (_, count)| acc.saturating_add(*count));

        // `sort_by` is stable, which gives the first-seen tie-break.
        order.sort_by(|a, b| b.1.cmp(&a.1));
        order.truncate(n);

        let entries = order
            .into_iter()
            .map(|(label, count)| RankingEntry {
                label: label.to_string(),
                count,
                percentage: share_of(count as f64, total_count as f64),
            })
            .collect();

        Ranking {
            date,
            total_count,
            entries,
        }
    }

    /// Daily totals across all labels.
    ///
    /// `range` (inclusive) and `day` drop points after grouping. The result
    /// is ascending by date with one point per date.
    pub fn build_time_series(
        rows: &[NormalizedRow],
        range: Option<DateRange>,
        day: DayFilter,
    ) -> TimeSeries {
        Self::series_from(rows.iter(), range, day)
    }

    /// Daily totals for a single label (exact, case-sensitive match).
    pub fn build_entity_series(rows: &[NormalizedRow], label: &str, day: DayFilter) -> TimeSeries {
        Self::series_from(rows.iter().filter(|r| r.label == label), None, day)
    }

    /// One [`DailyAggregate`] per date, ascending. `with_labels` fills the
    /// per-label breakdown.
    pub fn daily_aggregates(rows: &[NormalizedRow], with_labels: bool) -> Vec<DailyAggregate> {
        let mut map: BTreeMap<NaiveDate, DailyAggregate> = BTreeMap::new();

        for row in rows {
            let agg = map.entry(row.date).or_insert_with(|| DailyAggregate {
                date: row.date,
                total_count: 0,
                by_label: with_labels.then(BTreeMap::new),
            });
            agg.total_count = agg.total_count.saturating_add(row.count);
            if let Some(by_label) = agg.by_label.as_mut() {
                let slot = by_label.entry(row.label.clone()).or_insert(0);
                *slot = slot.saturating_add(row.count);
            }
        }

        map.into_values().collect()
    }

    /// Distinct dates present in `rows`, ascending.
    pub fn available_dates(rows: &[NormalizedRow]) -> Vec<NaiveDate> {
        rows.iter()
            .map(|r| r.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Most recent date in `rows`.
    pub fn latest_date(rows: &[NormalizedRow]) -> Option<NaiveDate> {
        rows.iter().map(|r| r.date).max()
    }

    /// The neighbour of `current` in the ascending `dates`, if there is one.
    pub fn adjacent_date(dates: &[NaiveDate], current: NaiveDate, step: Step) -> Option<NaiveDate> {
        let idx = dates.binary_search(&current).ok()?;
        match step {
            Step::Previous => idx.checked_sub(1).map(|i| dates[i]),
            Step::Next => dates.get(idx + 1).copied(),
        }
    }

    /// Rows of one category. `None` or `"All"` keeps every row.
    pub fn filter_category(rows: &[NormalizedRow], category: Option<&str>) -> Vec<NormalizedRow> {
        match category {
            None | Some("All") => rows.to_vec(),
            Some(wanted) => rows
                .iter()
                .filter(|r| r.category.as_deref() == Some(wanted))
                .cloned()
                .collect(),
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn series_from<'a>(
        rows: impl Iterator<Item = &'a NormalizedRow>,
        range: Option<DateRange>,
        day: DayFilter,
    ) -> TimeSeries {
        let mut totals: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for row in rows {
            let slot = totals.entry(row.date).or_insert(0);
            *slot = slot.saturating_add(row.count);
        }

        let points = totals
            .into_iter()
            .filter(|(date, _)| day.matches(*date))
            .filter(|(date, _)| range.map_or(true, |r| r.contains(*date)))
            .map(|(date, value)| SeriesPoint::new(date, value))
            .collect();

        TimeSeries { points }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
