//! Parsing and aggregation for spreadsheet CSV exports.
//!
//! Turns raw CSV text into validated daily rows, then derives rankings,
//! time series, week-over-week deltas and event-mix summaries from them.

pub mod aggregator;
pub mod comparison;
pub mod mix;
pub mod reader;

pub use pulse_core as core;
