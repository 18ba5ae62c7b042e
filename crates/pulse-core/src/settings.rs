use chrono::{NaiveDate, Weekday};
use clap::Parser;

use crate::calendar::{parse_ymd, resolve_timezone, today_in, DateRange, DayFilter, TimeFrame};
use crate::error::{PulseError, Result};
use crate::models::ColumnMap;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Daily analytics over published spreadsheet CSV exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sheet-pulse",
    about = "Daily analytics over published spreadsheet CSV exports",
    version
)]
pub struct Settings {
    /// CSV export URL (the link index for the events view)
    #[arg(long, env = "SHEET_PULSE_URL")]
    pub url: String,

    /// View to produce
    #[arg(
        long,
        default_value = "ranking",
        value_parser = ["ranking", "series", "entity", "overview", "events"]
    )]
    pub view: String,

    /// Header of the date column
    #[arg(long, default_value = "Date")]
    pub date_column: String,

    /// Header of the label column
    #[arg(long, default_value = "Object")]
    pub label_column: String,

    /// Header of the count column
    #[arg(long, default_value = "Request Count")]
    pub count_column: String,

    /// Header of the optional category column
    #[arg(long)]
    pub category_column: Option<String>,

    /// Only keep rows of this category
    #[arg(long)]
    pub category: Option<String>,

    /// Ranking date (YYYY-MM-DD); defaults to the latest date in the data
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<NaiveDate>,

    /// Number of ranking entries
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub top: u16,

    /// Label to drill into for the entity and overview views
    #[arg(long, default_value = "/envivo/query")]
    pub label: String,

    /// Day-of-week filter (All, Sunday … Saturday)
    #[arg(long, default_value = "All")]
    pub day: String,

    /// Second weekday to overlay on the trend
    #[arg(long)]
    pub compare_day: Option<String>,

    /// Range start (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    pub from: Option<NaiveDate>,

    /// Range end (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Option<NaiveDate>,

    /// Relative window, ignored when --from/--to are given
    #[arg(
        long,
        default_value = "all",
        value_parser = ["all", "weekly", "monthly", "six-months", "yearly"]
    )]
    pub time_frame: String,

    /// Timezone used to decide what "today" is (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Components that make up the event-mix total
    #[arg(long, default_value = "APPS,SITE,CTV", value_delimiter = ',')]
    pub mix_fields: Vec<String>,

    /// Components that make up the event-mix subtotal
    #[arg(long, default_value = "APPS,SITE", value_delimiter = ',')]
    pub subtotal_fields: Vec<String>,

    /// Value plotted on the events-over-time line (a component, SUBTOTAL or TOTAL)
    #[arg(long, default_value = "TOTAL")]
    pub mix_metric: String,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Logging level
    #[arg(
        long,
        default_value = "INFO",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    pub log_level: String,
}

/// Filters the host view re-applies on every recomputation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewFilters {
    pub day: DayFilter,
    pub compare_day: Option<Weekday>,
    pub range: Option<DateRange>,
    pub category: Option<String>,
}

impl Settings {
    /// Header names as configured on the command line.
    pub fn column_map(&self) -> ColumnMap {
        ColumnMap {
            date: self.date_column.clone(),
            label: self.label_column.clone(),
            count: self.count_column.clone(),
            category: self.category_column.clone(),
        }
    }

    /// Turn the textual filter flags into [`ViewFilters`].
    ///
    /// An explicit `--from`/`--to` pair wins over `--time-frame`; a single
    /// bound is open-ended on the other side.
    pub fn view_filters(&self) -> Result<ViewFilters> {
        let day: DayFilter = self.day.parse()?;

        let compare_day = match self.compare_day.as_deref() {
            None => None,
            Some(s) => match s.parse::<DayFilter>()? {
                DayFilter::Only(d) => Some(d),
                DayFilter::All => {
                    return Err(PulseError::Config(
                        "--compare-day needs a specific weekday".to_string(),
                    ))
                }
            },
        };

        let range = match (self.from, self.to) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            (Some(start), None) => Some(DateRange::new(start, NaiveDate::MAX)),
            (None, Some(end)) => Some(DateRange::new(NaiveDate::MIN, end)),
            (None, None) => {
                let frame: TimeFrame = self.time_frame.parse()?;
                frame.resolve(today_in(resolve_timezone(&self.timezone)))
            }
        };

        Ok(ViewFilters {
            day,
            compare_day,
            range,
            category: self.category.clone(),
        })
    }

    /// Trimmed, non-empty component names of the mix total.
    pub fn mix_fields(&self) -> Vec<String> {
        clean_fields(&self.mix_fields)
    }

    /// Trimmed, non-empty component names of the mix subtotal.
    pub fn subtotal_fields(&self) -> Vec<String> {
        clean_fields(&self.subtotal_fields)
    }

    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }
}

fn clean_fields(fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

fn parse_date_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    parse_ymd(s).ok_or_else(|| format!("expected a YYYY-MM-DD calendar date, got {s:?}"))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
