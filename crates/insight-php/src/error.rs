//! Errors from the PHP front end.

use insight_core::error::InsightError;
use thiserror::Error;

use crate::lexer::{LexError, LexErrorKind};

/// Errors that can occur while analyzing a PHP file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhpError {
    /// The file could not be tokenized.
    #[error("{file}:{line}: {kind}")]
    Lex {
        file: String,
        line: u32,
        kind: LexErrorKind,
    },
}

impl PhpError {
    /// Build a lexing error, computing the line from `content`.
    pub fn lex(file: &str, content: &str, err: LexError) -> Self {
        PhpError::Lex {
            file: file.to_string(),
            line: insight_core::text::line_of_offset(content, err.offset),
            kind: err.kind,
        }
    }

    /// The file the error refers to.
    pub fn file(&self) -> &str {
        match self {
            PhpError::Lex { file, .. } => file,
        }
    }
}

/// Result type for PHP front end operations.
pub type PhpResult<T> = Result<T, PhpError>;

impl From<PhpError> for InsightError {
    fn from(err: PhpError) -> Self {
        InsightError::FileError {
            path: err.file().to_string(),
            message: err.to_string(),
        }
    }
}
