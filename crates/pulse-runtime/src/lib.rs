//! Runtime layer for sheet-pulse.
//!
//! Fetches published CSV exports over HTTP and keeps the current dataset
//! with its view filters.

pub mod dashboard;
pub mod loader;

pub use pulse_core as core;
pub use pulse_data as data;
