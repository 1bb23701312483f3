//! Source locations reported in findings, mismatches and errors.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::text::byte_offset_to_position;

/// A position in a workspace file, rendered as `file:line:col`.
///
/// `byte_start` and `byte_end` are present when the location covers a
/// highlighted range, such as the class reference of a finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    /// Workspace-relative path with forward slashes.
    pub file: String,
    pub line: u32,
    pub col: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_end: Option<usize>,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Location {
            file: file.into(),
            line,
            col,
            byte_start: None,
            byte_end: None,
        }
    }

    /// Location of `span` within `content`.
    pub fn from_span(file: impl Into<String>, content: &str, span: Span) -> Self {
        let (line, col) = byte_offset_to_position(content, span.start);
        Location {
            byte_start: Some(span.start),
            byte_end: Some(span.end),
            ..Location::new(file, line, col)
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

// File first, then line and column; byte offsets break ties only.
impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.file
            .cmp(&other.file)
            .then(self.line.cmp(&other.line))
            .then(self.col.cmp(&other.col))
            .then(self.byte_start.cmp(&other.byte_start))
            .then(self.byte_end.cmp(&other.byte_end))
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
