mod bootstrap;
mod output;

use anyhow::Result;
use clap::Parser;
use pulse_core::settings::Settings;
use pulse_data::aggregator::Step;
use pulse_data::mix::{
    categories, compare_events, events_over_time, filter_events, recent, summarize_mix,
    EventSheetLayout, MixFields, MixMetric,
};
use pulse_runtime::dashboard::Dashboard;
use pulse_runtime::loader::{SheetLoader, DEFAULT_TIMEOUT_SECS};
use serde::Serialize;

use crate::output::{EventsReport, RankingView};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("sheet-pulse v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("View: {}, Source: {}", settings.view, settings.url);

    let loader = SheetLoader::new(DEFAULT_TIMEOUT_SECS)?;
    let filters = settings.view_filters()?;

    if settings.view == "events" {
        let layout = EventSheetLayout::default();
        let events = loader.load_events(&settings.url, &layout).await?;
        let selected = filter_events(&events, settings.category.as_deref());

        let components = layout.component_names();
        let fields = MixFields {
            subtotal: settings.subtotal_fields(),
            total: settings.mix_fields(),
        };
        let metric = MixMetric::from(settings.mix_metric.as_str());
        let summary = summarize_mix(&selected, &components, &fields);
        let timeline = events_over_time(&selected, &metric, &fields);

        let shown = recent(&selected, usize::from(settings.top)).to_vec();
        let comparisons = match shown.split_first() {
            Some((base, others)) => compare_events(base, others, &components, &fields),
            None => Vec::new(),
        };

        let report = EventsReport {
            categories: categories(&events),
            summary,
            metric,
            timeline,
            events: shown,
            comparisons,
        };
        return emit(&settings, &report, output::render_events);
    }

    let set = loader.load_rows(&settings.url, &settings.column_map()).await?;
    let total_rows = set.total_rows();
    let dashboard = Dashboard::new(set, filters);
    if !dashboard.skipped().is_empty() {
        tracing::warn!(
            "{} of {} data rows were skipped",
            dashboard.skipped().len(),
            total_rows
        );
        for skip in dashboard.skipped() {
            tracing::debug!("line {}: {}", skip.source_line(), skip.cause);
        }
    }

    match settings.view.as_str() {
        "ranking" => match dashboard.ranking(settings.date, usize::from(settings.top)) {
            Some(ranking) => {
                let view = RankingView {
                    previous_date: dashboard.step(ranking.date, Step::Previous),
                    next_date: dashboard.step(ranking.date, Step::Next),
                    ranking,
                };
                emit(&settings, &view, output::render_ranking)?;
            }
            None => tracing::warn!("No rows to rank"),
        },
        "series" => {
            let cmp = dashboard.comparison(None);
            emit(&settings, &cmp, output::render_comparison)?;
        }
        "entity" => {
            let cmp = dashboard.comparison(Some(&settings.label));
            emit(&settings, &cmp, output::render_comparison)?;
        }
        "overview" => {
            let overview = dashboard.overview(&settings.label);
            emit(&settings, &overview, output::render_overview)?;
        }
        unknown => {
            anyhow::bail!("Unknown view: {}", unknown);
        }
    }

    Ok(())
}

/// Print `value` as JSON or through `render`, depending on `--format`.
fn emit<T: Serialize>(settings: &Settings, value: &T, render: fn(&T) -> String) -> Result<()> {
    if settings.wants_json() {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", render(value));
    }
    Ok(())
}
