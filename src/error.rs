use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Error type covering the different failure cases that can occur when the
/// tool fetches, flattens, or exports survey data.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a workbook does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Transport-level HTTP failures (connection, timeout, decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Raised when the API answers with a non-success status code.
    #[error("API request to {url} failed with status {status}")]
    Api { status: u16, url: String },

    /// Raised when an endpoint or request URL cannot be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Raised when the authentication token cannot be placed in a header.
    #[error("authentication token contains invalid characters")]
    InvalidToken,

    /// Raised when a field name is used both as a repeating group and as a
    /// plain column within the same table.
    #[error("field '{field}' is both a repeating group and a plain column in table '{table}'")]
    NameCollision { table: String, field: String },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
