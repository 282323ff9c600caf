use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the URA flow engine.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The detector could not classify the input text.
    #[error("Unrecognized file format: expected key-value session, pipe-delimited log or spreadsheet rows")]
    UnrecognizedFormat,

    /// A key-value session has neither `fluxo_1` nor `ponto_1`.
    #[error("Missing required fields: {0}")]
    MissingRequiredFields(String),

    /// Every parsed step was classified as noise.
    #[error("No valid navigation steps found")]
    NoValidSteps,

    /// A spreadsheet row could not be turned into a journey.
    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    /// A graph cycle longer than two edges survived reciprocal resolution.
    #[error("Ambiguous cycle: {}", .0.join(" -> "))]
    AmbiguousCycle(Vec<String>),

    /// The spreadsheet has no rows at all.
    #[error("Spreadsheet is empty")]
    EmptySpreadsheet,

    /// The spreadsheet header lacks mandatory columns.
    #[error("Missing spreadsheet columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A snapshot breaks a structural guarantee (dangling edge, zero weight...).
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the URA crates.
pub type Result<T> = std::result::Result<T, FlowError>;
