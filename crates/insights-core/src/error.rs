use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used to decide how a failure is surfaced.
///
/// `DataSource` and `Parse` abort a render, `NotFound` only blanks the
/// affected section, `Enrichment` degrades to a placeholder record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataSource,
    Parse,
    NotFound,
    Enrichment,
    Other,
}

/// All errors produced by Visitor Insights.
#[derive(Error, Debug)]
pub enum InsightsError {
    /// The configured log source does not exist.
    #[error("Data source not found: {0}")]
    SourceNotFound(PathBuf),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source directory contained no `.csv` files.
    #[error("No CSV files found in {0}")]
    NoCsvFiles(PathBuf),

    /// Every row of the source was rejected (or there were none).
    #[error("No usable visit rows in {0}")]
    EmptySource(PathBuf),

    /// Reader-level CSV failure (bad header row, I/O while streaming).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the header row.
    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// A numeric or flag column held a value that could not be parsed.
    #[error("Invalid value '{value}' in column '{column}'")]
    FieldParse { column: String, value: String },

    /// The requested session is not present after filtering.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The requested entity (IP) is not present after filtering.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// The enrichment provider had no record for the IP.
    #[error("Enrichment unavailable for {0}")]
    EnrichmentUnavailable(String),

    /// The enrichment lookup exceeded its time budget.
    #[error("Enrichment lookup for {ip} timed out after {millis} ms")]
    EnrichmentTimeout { ip: String, millis: u64 },

    /// An error originating from the terminal / TUI layer.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be parsed or written.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InsightsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceNotFound(_)
            | Self::FileRead { .. }
            | Self::NoCsvFiles(_)
            | Self::EmptySource(_)
            | Self::Csv(_) => ErrorKind::DataSource,
            Self::MissingColumn { .. } | Self::TimestampParse(_) | Self::FieldParse { .. } => {
                ErrorKind::Parse
            }
            Self::SessionNotFound(_) | Self::EntityNotFound(_) => ErrorKind::NotFound,
            Self::EnrichmentUnavailable(_) | Self::EnrichmentTimeout { .. } => {
                ErrorKind::Enrichment
            }
            Self::Terminal(_)
            | Self::Config(_)
            | Self::JsonParse(_)
            | Self::Io(_)
            | Self::Other(_) => ErrorKind::Other,
        }
    }

    /// `true` for errors that must abort the whole render.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::DataSource | ErrorKind::Parse)
    }
}

/// Convenience alias used throughout the insights crates.
pub type Result<T> = std::result::Result<T, InsightsError>;
