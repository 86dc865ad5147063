//! Error types for lightcurve-dl
//!
//! This module provides error handling for the library, including:
//! - Transport errors (network failures and non-2xx responses)
//! - Schema errors for fetched light-curve tables
//! - The whole-batch poll timeout
//! - Machine-readable error codes for terminal failure reporting

use crate::types::Position;
use thiserror::Error;

/// Result type alias for lightcurve-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lightcurve-dl
///
/// Per-position "no data" outcomes are not errors: they are recorded as null
/// entries in the result set. Every variant here aborts the operation that
/// produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "service.email")
        key: Option<String>,
    },

    /// Network error (connection refused, timeout, TLS, body decoding)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a non-success HTTP status
    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL (without credentials)
        url: String,
        /// Response body, truncated for logging
        body: String,
    },

    /// The job status page could not be parsed into a table of jobs
    #[error("malformed status table: {0}")]
    StatusTable(String),

    /// A fetched light-curve table does not match the expected schema
    #[error("light curve schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Polling gave up before every requested position had a finished job
    #[error("jobs still pending for {pending} positions after {attempts} status queries")]
    PollTimeout {
        /// Number of status queries issued
        attempts: u32,
        /// Number of positions without a finished job at the last query
        pending: usize,
    },

    /// Fetching or normalizing the light curve of one position failed
    #[error("failed to retrieve light curve for ({position}): {source}")]
    Fetch {
        /// The position whose light curve failed
        position: Position,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Every fetch-eligible position failed (partial-result mode only)
    #[error("all {failed} light curve fetches failed")]
    NoSuccessfulFetches {
        /// Number of failed fetches
        failed: usize,
    },

    /// A line of the position list could not be parsed
    #[error("invalid position on line {line}: {reason}")]
    InvalidPosition {
        /// 1-based line number in the input
        line: usize,
        /// Why the line was rejected
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The retrieval was cancelled before it finished
    #[error("retrieval cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Light-curve table schema errors
///
/// These indicate format drift on the service side and are fatal for the
/// position whose table failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The payload contains no header row
    #[error("no header row found")]
    MissingHeader,

    /// One or more required columns are absent
    #[error("missing required columns: {}", missing.join(", "))]
    MissingColumns {
        /// Names of every missing required column
        missing: Vec<String>,
    },

    /// A data row has a different number of fields than the header
    #[error("line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        /// 1-based line number in the payload
        line: usize,
        /// Number of header columns
        expected: usize,
        /// Number of fields on the row
        found: usize,
    },

    /// A numeric column holds a value that is neither a number nor a null sentinel
    #[error("line {line}: column {column} has non-numeric value {value:?}")]
    InvalidValue {
        /// 1-based line number in the payload
        line: usize,
        /// Column name
        column: String,
        /// Offending token
        value: String,
    },
}

impl Error {
    /// Machine-readable code identifying the error kind
    ///
    /// Used to print a distinguishing message for terminal failures.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config",
            Error::Network(_) | Error::HttpStatus { .. } => "transport",
            Error::StatusTable(_) => "status_table",
            Error::Schema(_) => "schema",
            Error::PollTimeout { .. } => "poll_timeout",
            Error::Fetch { source, .. } => source.error_code(),
            Error::NoSuccessfulFetches { .. } => "no_successful_fetches",
            Error::InvalidPosition { .. } => "invalid_position",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Cancelled => "cancelled",
            Error::Other(_) => "other",
        }
    }

    /// Whether this error sends the poll loop back to backoff instead of aborting
    ///
    /// Any transport failure or unparseable status page is treated as "the
    /// service is not ready yet".
    pub fn is_poll_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::HttpStatus { .. } | Error::StatusTable(_)
        )
    }

    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
