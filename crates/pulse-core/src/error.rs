use thiserror::Error;

/// All errors produced by sheet-pulse.
///
/// Only document-level and transport failures live here. Row-level defects
/// are reported through the skip list and undefined derived values through
/// sentinels, so neither ever becomes a `PulseError`.
#[derive(Error, Debug)]
pub enum PulseError {
    /// The CSV reader rejected the document.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A quoted field was never closed or had stray text after its closing quote.
    #[error("Malformed quoting near line {line}")]
    MalformedQuoting { line: u64 },

    /// The document has no header row.
    #[error("CSV document has no header row")]
    MissingHeader,

    /// The HTTP request could not be completed.
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// An event sheet does not match the expected cell layout.
    #[error("Invalid event sheet: {0}")]
    EventSheet(String),

    /// A day-of-week filter string is not `All` or a weekday name.
    #[error("Invalid day filter: {0}")]
    InvalidDayFilter(String),

    /// A time-frame preset name is not recognised.
    #[error("Invalid time frame: {0}")]
    InvalidTimeFrame(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be produced or parsed.
    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Pass-through for raw I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the pulse crates.
pub type Result<T> = std::result::Result<T, PulseError>;
