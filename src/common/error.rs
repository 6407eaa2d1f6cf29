//! Error types for hurlui
//!
//! Only a missing script and a runner that cannot be started are blocking
//! failures. Everything else is recoverable and ends up as a [`Warning`]
//! attached to an otherwise usable result.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hurlui
#[derive(Error, Debug)]
pub enum Error {
    // === Invocation Errors ===
    #[error("Script '{path}' does not exist or is not readable")]
    InputNotFound { path: String },

    #[error("Failed to start test runner '{binary}': {reason}")]
    InvocationFailed { binary: String, reason: String },

    // === Report Errors ===
    #[error("Failed to parse report '{path}': {reason}")]
    ReportParse { path: String, reason: String },

    #[error("Failed to read response body '{path}': {reason}")]
    BodyRead { path: String, reason: String },

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Cache Errors ===
    #[error("Result cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Result cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of errors, stable across releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InputNotFound,
    InvocationFailed,
    ReportParseError,
    BodyReadError,
    ConfigParseError,
    CacheUnavailable,
    Internal,
}

impl ErrorKind {
    /// Machine-readable code for this kind
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InputNotFound => "INPUT_NOT_FOUND",
            ErrorKind::InvocationFailed => "INVOCATION_FAILED",
            ErrorKind::ReportParseError => "REPORT_PARSE_ERROR",
            ErrorKind::BodyReadError => "BODY_READ_ERROR",
            ErrorKind::ConfigParseError => "CONFIG_PARSE_ERROR",
            ErrorKind::CacheUnavailable => "CACHE_UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether errors of this kind abort the operation that raised them
    pub fn is_blocking(self) -> bool {
        matches!(self, ErrorKind::InputNotFound | ErrorKind::InvocationFailed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Error {
    /// Create an input not found error for a script path
    pub fn input_not_found(path: &std::path::Path) -> Self {
        Self::InputNotFound {
            path: path.display().to_string(),
        }
    }

    /// Create an invocation failed error
    pub fn invocation_failed(binary: &std::path::Path, reason: impl fmt::Display) -> Self {
        Self::InvocationFailed {
            binary: binary.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a report parse error
    pub fn report_parse(path: &std::path::Path, reason: impl fmt::Display) -> Self {
        Self::ReportParse {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InputNotFound { .. } => ErrorKind::InputNotFound,
            Error::InvocationFailed { .. } => ErrorKind::InvocationFailed,
            Error::ReportParse { .. } => ErrorKind::ReportParseError,
            Error::BodyRead { .. } => ErrorKind::BodyReadError,
            Error::ConfigParse(_) => ErrorKind::ConfigParseError,
            Error::CacheUnavailable(_) | Error::Cache(_) => ErrorKind::CacheUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

/// A recovered, non-blocking problem reported next to a result
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Warning {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for Warning {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<Error> for Warning {
    fn from(e: Error) -> Self {
        Warning::from(&e)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
