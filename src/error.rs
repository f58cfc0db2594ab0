// ⚠️ Error taxonomy
// Store failures, validation failures, insight failures and configuration failures.
//
// None of these reach the end user as structured detail: the access layer turns
// StoreError into an empty list / `false` plus a log line, and InsightError into a
// fallback string.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored identifier is not a canonical UUID: {0:?}")]
    InvalidStoredId(String),

    #[error("Stored date could not be parsed: {0:?}")]
    InvalidStoredDate(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Input rejected before any store call is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("bank name must not be empty")]
    EmptyBankName,

    #[error("loan must reference a bank")]
    MissingBankId,

    #[error("actor identity must not be empty")]
    EmptyActor,

    #[error("amount must be a non-negative number, got {0}")]
    NegativeAmount(String),

    #[error("invalid month {0:?}: expected YYYY-MM")]
    InvalidMonth(String),

    #[error("unknown report type {0:?}: expected bankwise, monthly or daily")]
    InvalidReportMode(String),
}

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("no insight provider configured")]
    Unavailable,

    #[error("insight request failed: {0}")]
    Request(String),

    #[error("insight API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("insight API returned no text")]
    EmptyResponse,
}

#[cfg(feature = "gemini")]
impl From<reqwest::Error> for InsightError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL is never part of the message
        InsightError::Request(err.without_url().to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
