//! Shared building blocks for sheet-pulse.
//!
//! Domain models, strict calendar helpers, the error type, display
//! formatting and CLI settings used by the data, runtime and binary crates.

pub mod calendar;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{PulseError, Result};
