//! Error types and exit codes for insight.
//!
//! `InsightError` is the single error type rendered by the CLI. Domain
//! errors (`ConfigError`, `FixtureError`, `WorkspaceError`, and the PHP
//! front end's error) bridge into it with `From`.
//!
//! ## Exit Codes
//!
//! - `0`: success, no findings
//! - `1`: `check` reported findings (not an error)
//! - `2`: invalid arguments
//! - `3`: file errors (not found, unreadable)
//! - `4`: configuration errors
//! - `5`: fixture verification failed
//! - `6`: malformed fixture
//! - `10`: internal errors

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::fixture::FixtureError;
use crate::workspace::WorkspaceError;

/// Exit code used by `check` when findings were reported.
pub const FINDINGS_EXIT_CODE: u8 = 1;

/// Stable error codes, shared by exit status and JSON error output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// File not found or unreadable.
    FileError = 3,
    /// Configuration could not be loaded.
    ConfigError = 4,
    /// Fixture findings did not match annotations.
    VerificationFailed = 5,
    /// Fixture markers could not be parsed.
    MalformedFixture = 6,
    /// Bugs and unexpected state.
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("cannot read {path}: {message}")]
    FileError { path: String, message: String },

    #[error("configuration error: {message}")]
    ConfigError { message: String },

    #[error("verification failed: {failed} of {total} fixture(s) did not match")]
    VerificationFailed { failed: usize, total: usize },

    #[error("malformed fixture: {message}")]
    MalformedFixture {
        file: String,
        line: Option<u32>,
        message: String,
    },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl From<&InsightError> for OutputErrorCode {
    fn from(err: &InsightError) -> Self {
        match err {
            InsightError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            InsightError::FileNotFound { .. } => OutputErrorCode::FileError,
            InsightError::FileError { .. } => OutputErrorCode::FileError,
            InsightError::ConfigError { .. } => OutputErrorCode::ConfigError,
            InsightError::VerificationFailed { .. } => OutputErrorCode::VerificationFailed,
            InsightError::MalformedFixture { .. } => OutputErrorCode::MalformedFixture,
            InsightError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl InsightError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        InsightError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        InsightError::FileNotFound { path: path.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        InsightError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<ConfigError> for InsightError {
    fn from(err: ConfigError) -> Self {
        InsightError::ConfigError {
            message: err.to_string(),
        }
    }
}

impl From<WorkspaceError> for InsightError {
    fn from(err: WorkspaceError) -> Self {
        let message = err.to_string();
        match err {
            WorkspaceError::NotFound { path } => InsightError::FileNotFound { path },
            WorkspaceError::Io { path, source } => InsightError::FileError {
                path,
                message: source.to_string(),
            },
            WorkspaceError::InvalidPattern { .. } => InsightError::InvalidArguments { message },
        }
    }
}

impl From<FixtureError> for InsightError {
    fn from(err: FixtureError) -> Self {
        let line = match &err {
            FixtureError::MissingDescr { line, .. }
            | FixtureError::Unclosed { line, .. }
            | FixtureError::Mismatched { line, .. }
            | FixtureError::StrayClose { line, .. }
            | FixtureError::Malformed { line, .. } => Some(*line),
            FixtureError::Analysis { .. } => None,
        };
        InsightError::MalformedFixture {
            file: err.file().to_string(),
            line,
            message: err.to_string(),
        }
    }
}
