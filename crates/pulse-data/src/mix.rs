//! Event sheets and their component mix.
//!
//! A link index lists one published sheet per event. Each event sheet uses
//! a fixed cell layout: a title cell (`"<name> - <DDMmmYYYY>"`) and a few
//! numeric component cells. This module parses those sheets, totals and
//! averages the components over a category, computes each component's
//! share of a configurable total, and compares events against a base event.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use chrono::NaiveDate;
use pulse_core::formatting::share_of;
use pulse_core::{PulseError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::reader::check_quoting;

// ── Link index ────────────────────────────────────────────────────────────────

/// One row of the link index sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLink {
    pub url: String,
    pub category: String,
    pub detail: String,
    pub original_sheet_url: String,
    /// Shown as `-` when empty.
    pub provisioning: String,
}

/// Parse the link index: `url, category, detail, original sheet, provisioning`.
///
/// The first row is a header and is skipped; rows without a URL are dropped.
pub fn parse_link_index(text: &str) -> Result<Vec<SheetLink>> {
    let grid = parse_grid(text)?;
    let cell = |row: &Vec<String>, i: usize| {
        row.get(i)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    Ok(grid
        .iter()
        .skip(1)
        .filter_map(|row| {
            let url = cell(row, 0);
            if url.is_empty() {
                return None;
            }
            let provisioning = cell(row, 4);
            Some(SheetLink {
                url,
                category: cell(row, 1),
                detail: cell(row, 2),
                original_sheet_url: cell(row, 3),
                provisioning: if provisioning.is_empty() {
                    "-".to_string()
                } else {
                    provisioning
                },
            })
        })
        .collect())
}

// ── Layout ────────────────────────────────────────────────────────────────────

/// Zero-based cell coordinate. Rows count non-blank lines of the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// A named component whose value is the sum of one or more cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCells {
    pub name: String,
    pub cells: Vec<CellRef>,
}

/// Where the title and the component values sit in an event sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSheetLayout {
    pub title: CellRef,
    pub components: Vec<ComponentCells>,
}

impl Default for EventSheetLayout {
    /// Title in A2, `CTV` in B5, `APPS` summed over B6:B9, `SITE` in B10.
    fn default() -> Self {
        Self {
            title: CellRef::new(1, 0),
            components: vec![
                ComponentCells {
                    name: "CTV".to_string(),
                    cells: vec![CellRef::new(4, 1)],
                },
                ComponentCells {
                    name: "APPS".to_string(),
                    cells: (5..=8).map(|r| CellRef::new(r, 1)).collect(),
                },
                ComponentCells {
                    name: "SITE".to_string(),
                    cells: vec![CellRef::new(9, 1)],
                },
            ],
        }
    }
}

impl EventSheetLayout {
    /// Minimum number of rows a sheet needs for every cell to exist.
    pub fn min_rows(&self) -> usize {
        self.components
            .iter()
            .flat_map(|c| c.cells.iter())
            .chain(std::iter::once(&self.title))
            .map(|c| c.row + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn component_names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.name.clone()).collect()
    }
}

// ── EventSummary ──────────────────────────────────────────────────────────────

/// Everything extracted from one event sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub name: String,
    /// `None` when the title's date part could not be read.
    pub date: Option<NaiveDate>,
    pub category: String,
    pub detail: String,
    pub url: String,
    pub original_sheet_url: String,
    pub provisioning: String,
    pub components: BTreeMap<String, f64>,
}

impl EventSummary {
    pub fn component(&self, name: &str) -> f64 {
        self.components.get(name).copied().unwrap_or(0.0)
    }

    /// Sum of the `included` components.
    pub fn total_of(&self, included: &[String]) -> f64 {
        included.iter().map(|name| self.component(name)).sum()
    }
}

/// Parse one event sheet according to `layout`.
///
/// Fails when the sheet is not valid CSV or has fewer rows than the layout
/// needs. Component cells that are blank or non-numeric count as 0.
pub fn parse_event_sheet(
    text: &str,
    layout: &EventSheetLayout,
    link: &SheetLink,
) -> Result<EventSummary> {
    let grid = parse_grid(text)?;
    let needed = layout.min_rows();
    if grid.len() < needed {
        return Err(PulseError::EventSheet(format!(
            "{} has {} rows, layout needs {}",
            link.url,
            grid.len(),
            needed
        )));
    }

    let at = |c: &CellRef| {
        grid.get(c.row)
            .and_then(|row| row.get(c.col))
            .map(|s| s.trim())
            .unwrap_or("")
    };

    let title = at(&layout.title);
    let (name, date_str) = split_title(title);
    let date = parse_event_date(&date_str);

    let components = layout
        .components
        .iter()
        .map(|comp| {
            let value: f64 = comp.cells.iter().map(|c| parse_cell_number(at(c))).sum();
            (comp.name.clone(), value)
        })
        .collect();

    Ok(EventSummary {
        id: format!("{}-{}-{}", name, date_str, link.category),
        name,
        date,
        category: link.category.clone(),
        detail: link.detail.clone(),
        url: link.url.clone(),
        original_sheet_url: link.original_sheet_url.clone(),
        provisioning: link.provisioning.clone(),
        components,
    })
}

/// Split `"Final - 12Ene2024"` into name and date text. A missing title
/// gives `"N/A"`.
pub fn split_title(title: &str) -> (String, String) {
    if title.is_empty() {
        return ("N/A".to_string(), String::new());
    }
    match title.split_once(" - ") {
        Some((name, date)) => (name.trim().to_string(), date.trim().to_string()),
        None => (title.trim().to_string(), String::new()),
    }
}

/// Parse `DDMmmYYYY` dates with Spanish month abbreviations, e.g. `12Ene2024`.
///
/// Impossible days (`31Feb2024`) are rejected rather than rolled over.
pub fn parse_event_date(s: &str) -> Option<NaiveDate> {
    let caps = event_date_re().captures(s.trim())?;
    let day: u32 = caps[1].parse().ok()?;
    let month = spanish_month(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn spanish_month(abbr: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
    ];
    MONTHS
        .iter()
        .position(|m| *m == abbr)
        .map(|i| i as u32 + 1)
}

fn event_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})([A-Za-z]{3})(\d{4})$").expect("valid event date regex")
    })
}

/// Numeric cell value with `,` separators removed; anything unparseable is 0.
fn parse_cell_number(s: &str) -> f64 {
    s.replace(',', "")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Headerless parse into rows of cells, skipping blank lines.
fn parse_grid(text: &str) -> Result<Vec<Vec<String>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    check_quoting(text)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for result in reader.records() {
        let record = result?;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

// ── Collections of events ─────────────────────────────────────────────────────

/// Newest first; undated events go last, keeping their relative order.
pub fn sort_events_desc(events: &mut [EventSummary]) {
    events.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// The first `n` events of an already sorted list.
pub fn recent<T>(events: &[T], n: usize) -> &[T] {
    &events[..n.min(events.len())]
}

/// Events of one category. `None` or `"All"` keeps every event.
pub fn filter_events<'a>(
    events: &'a [EventSummary],
    category: Option<&str>,
) -> Vec<&'a EventSummary> {
    events
        .iter()
        .filter(|e| match category {
            None | Some("All") => true,
            Some(wanted) => e.category == wanted,
        })
        .collect()
}

/// Distinct categories, sorted.
pub fn categories(events: &[EventSummary]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ── Subtotal and total ────────────────────────────────────────────────────────

/// Which components add up to the subtotal and to the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixFields {
    pub subtotal: Vec<String>,
    pub total: Vec<String>,
}

impl Default for MixFields {
    /// `APPS + SITE` for the subtotal, `APPS + SITE + CTV` for the total.
    fn default() -> Self {
        Self {
            subtotal: vec!["APPS".to_string(), "SITE".to_string()],
            total: vec!["APPS".to_string(), "SITE".to_string(), "CTV".to_string()],
        }
    }
}

/// A value that can be read off an event: one component, the subtotal or
/// the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum MixMetric {
    Component(String),
    Subtotal,
    Total,
}

impl From<&str> for MixMetric {
    /// `SUBTOTAL` and `TOTAL` (any case) name the sums; anything else is a
    /// component name.
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("subtotal") {
            MixMetric::Subtotal
        } else if s.eq_ignore_ascii_case("total") {
            MixMetric::Total
        } else {
            MixMetric::Component(s.to_string())
        }
    }
}

impl EventSummary {
    pub fn value_of(&self, metric: &MixMetric, fields: &MixFields) -> f64 {
        match metric {
            MixMetric::Component(name) => self.component(name),
            MixMetric::Subtotal => self.total_of(&fields.subtotal),
            MixMetric::Total => self.total_of(&fields.total),
        }
    }
}

// ── Mix summary ───────────────────────────────────────────────────────────────

/// Totals for one component across the selected events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTotal {
    pub name: String,
    pub total: f64,
    /// Per-event average; 0 when no events are selected.
    pub average: f64,
    /// Share of the configured total, 0-100. `None` when the component is
    /// not part of that total.
    pub share: Option<f64>,
}

/// Distribution view over a set of events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixSummary {
    pub event_count: usize,
    pub components: Vec<ComponentTotal>,
    pub fields: MixFields,
    pub subtotal: f64,
    pub average_subtotal: f64,
    pub total: f64,
    pub average_total: f64,
}

/// Summarise `components` over `events`. Shares are measured against the
/// total.
pub fn summarize_mix(
    events: &[&EventSummary],
    components: &[String],
    fields: &MixFields,
) -> MixSummary {
    let event_count = events.len();
    let average = |sum: f64| if event_count == 0 { 0.0 } else { sum / event_count as f64 };

    let sum_of = |name: &str| events.iter().map(|e| e.component(name)).sum::<f64>();
    let sum_set = |set: &[String]| set.iter().map(|name| sum_of(name)).sum::<f64>();
    let subtotal = sum_set(&fields.subtotal[..]);
    let total = sum_set(&fields.total[..]);

    let components = components
        .iter()
        .map(|name| {
            let component_total = sum_of(name);
            ComponentTotal {
                name: name.clone(),
                total: component_total,
                average: average(component_total),
                share: fields
                    .total
                    .contains(name)
                    .then(|| share_of(component_total, total)),
            }
        })
        .collect();

    MixSummary {
        event_count,
        components,
        fields: fields.clone(),
        subtotal,
        average_subtotal: average(subtotal),
        total,
        average_total: average(total),
    }
}

// ── Events over time ──────────────────────────────────────────────────────────

/// One event on the events-over-time line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPoint {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// `metric` per event, oldest first. Undated events have no place on the
/// time axis and are left out; events on the same date keep their order.
pub fn events_over_time(
    events: &[&EventSummary],
    metric: &MixMetric,
    fields: &MixFields,
) -> Vec<EventPoint> {
    let mut points: Vec<EventPoint> = events
        .iter()
        .filter_map(|event| {
            Some(EventPoint {
                id: event.id.clone(),
                name: event.name.clone(),
                date: event.date?,
                value: event.value_of(metric, fields),
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

// ── Event comparison ──────────────────────────────────────────────────────────

/// Percentage change of one event against the base event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventComparison {
    pub id: String,
    pub name: String,
    pub date: Option<NaiveDate>,
    /// Component name → change in percent; `None` when the base value is 0.
    pub changes: BTreeMap<String, Option<f64>>,
    pub subtotal_change: Option<f64>,
    pub total_change: Option<f64>,
}

/// Compare every event in `others` against `base`.
pub fn compare_events(
    base: &EventSummary,
    others: &[&EventSummary],
    components: &[String],
    fields: &MixFields,
) -> Vec<EventComparison> {
    let change = |now: f64, then: f64| {
        if then == 0.0 {
            None
        } else {
            Some((now - then) / then * 100.0)
        }
    };
    let metric_change = |event: &EventSummary, metric: MixMetric| {
        change(event.value_of(&metric, fields), base.value_of(&metric, fields))
    };

    others
        .iter()
        .map(|&event| EventComparison {
            id: event.id.clone(),
            name: event.name.clone(),
            date: event.date,
            changes: components
                .iter()
                .map(|c| (c.clone(), change(event.component(c), base.component(c))))
                .collect(),
            subtotal_change: metric_change(event, MixMetric::Subtotal),
            total_change: metric_change(event, MixMetric::Total),
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
