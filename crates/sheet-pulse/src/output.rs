//! Plain-text rendering of the computed views.

use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};
use pulse_core::calendar::weekday_name;
use pulse_core::formatting::{format_count, format_delta, format_number, format_percentage};
use pulse_core::models::{Delta, Ranking, TimeSeries, WeekdayComparison};
use pulse_data::mix::{EventComparison, EventPoint, EventSummary, MixMetric, MixSummary};
use pulse_runtime::dashboard::Overview;
use serde::Serialize;

/// A ranking together with the neighbouring dates that have data.
#[derive(Debug, Serialize)]
pub struct RankingView {
    #[serde(flatten)]
    pub ranking: Ranking,
    pub previous_date: Option<NaiveDate>,
    pub next_date: Option<NaiveDate>,
}

/// JSON payload of the events view.
#[derive(Debug, Serialize)]
pub struct EventsReport<'a> {
    /// Every category in the link index, before filtering.
    pub categories: Vec<String>,
    pub summary: MixSummary,
    pub metric: MixMetric,
    /// Oldest first.
    pub timeline: Vec<EventPoint>,
    /// Newest first.
    pub events: Vec<&'a EventSummary>,
    pub comparisons: Vec<EventComparison>,
}

pub fn render_ranking(view: &RankingView) -> String {
    let ranking = &view.ranking;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Top {} for {} (total {})",
        ranking.entries.len(),
        ranking.date,
        format_count(ranking.total_count)
    );
    let _ = writeln!(out, "{:>4}  {:<48} {:>14} {:>8}", "#", "Label", "Count", "Share");
    for (i, entry) in ranking.entries.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:<48} {:>14} {:>8}",
            i + 1,
            entry.label,
            format_count(entry.count),
            format_percentage(entry.percentage)
        );
    }
    let nav = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
    let _ = writeln!(
        out,
        "Previous: {}  Next: {}",
        nav(view.previous_date),
        nav(view.next_date)
    );
    out
}

pub fn render_series(title: &str, series: &TimeSeries) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title} ({} days)", series.len());
    for point in &series.points {
        let marker = if point.is_sunday() { " *" } else { "" };
        let _ = writeln!(
            out,
            "{}  {:<9} {:>14}{marker}",
            point.date,
            weekday_name(point.date.weekday()),
            format_count(point.value)
        );
    }
    out
}

pub fn render_comparison(cmp: &WeekdayComparison) -> String {
    let mut out = render_series("Primary", &cmp.primary);
    if let Some(day) = cmp.compare_day {
        out.push('\n');
        out.push_str(&render_series(weekday_name(day), &cmp.comparison));
    }
    out
}

fn change_text(change: Option<f64>) -> String {
    change.map_or_else(|| "N/A".to_string(), |c| format!("{:+.1}%", c))
}

fn metric_name(metric: &MixMetric) -> &str {
    match metric {
        MixMetric::Component(name) => name,
        MixMetric::Subtotal => "SUBTOTAL",
        MixMetric::Total => "TOTAL",
    }
}

fn delta_line(name: &str, delta: &Delta) -> String {
    match delta {
        Delta::Unavailable => format!("{name}: N/A vs last week"),
        Delta::Available { current, .. } => format!(
            "{name}: {} ({} / {} vs last week)",
            format_count(*current),
            format_delta(delta, false),
            format_delta(delta, true)
        ),
    }
}

pub fn render_overview(overview: &Overview) -> String {
    let mut out = String::new();
    match overview.latest_date {
        Some(date) => {
            let _ = writeln!(out, "Latest date: {date}");
        }
        None => {
            let _ = writeln!(out, "No data");
        }
    }
    let _ = writeln!(out, "{}", delta_line("Total", &overview.total_delta));
    let _ = writeln!(out, "{}", delta_line(&overview.label, &overview.label_delta));
    out
}

pub fn render_events(report: &EventsReport<'_>) -> String {
    let mut out = String::new();
    let summary = &report.summary;

    if !report.categories.is_empty() {
        let _ = writeln!(out, "Categories: {}", report.categories.join(", "));
    }
    let _ = writeln!(out, "{} events", summary.event_count);
    let _ = writeln!(
        out,
        "  {:<8} {:>14} avg {:>12}  ({})",
        "SUBTOTAL",
        format_number(summary.subtotal, 0),
        format_number(summary.average_subtotal, 0),
        summary.fields.subtotal.join("+")
    );
    let _ = writeln!(
        out,
        "  {:<8} {:>14} avg {:>12}  ({})",
        "TOTAL",
        format_number(summary.total, 0),
        format_number(summary.average_total, 0),
        summary.fields.total.join("+")
    );
    for comp in &summary.components {
        let share = comp
            .share
            .map(format_percentage)
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<8} {:>14} avg {:>12} {:>8}",
            comp.name,
            format_number(comp.total, 0),
            format_number(comp.average, 0),
            share
        );
    }

    if !report.timeline.is_empty() {
        let _ = writeln!(out, "\n{} over time", metric_name(&report.metric));
        for point in &report.timeline {
            let _ = writeln!(
                out,
                "{}  {:<40} {:>14}",
                point.date,
                point.name,
                format_number(point.value, 0)
            );
        }
    }

    if !report.events.is_empty() {
        out.push('\n');
        for event in &report.events {
            let date = event
                .date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "undated".to_string());
            let _ = writeln!(out, "{date:<10}  {:<40} {}", event.name, event.category);
        }
    }

    if !report.comparisons.is_empty() {
        let _ = writeln!(out, "\nChange vs {}  (subtotal / total)", report.events[0].name);
        for cmp in &report.comparisons {
            let _ = writeln!(
                out,
                "  {:<40} {:>10} {:>10}",
                cmp.name,
                change_text(cmp.subtotal_change),
                change_text(cmp.total_change)
            );
        }
    }
    out
}
