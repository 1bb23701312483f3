//! Byte spans into source text.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Byte offsets into file content.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The span as a `Range<usize>` for slicing.
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_joins_disjoint_spans() {
        let a = Span::new(4, 8);
        let b = Span::new(10, 12);
        assert_eq!(a.cover(&b), Span::new(4, 12));
        assert_eq!(b.cover(&a), Span::new(4, 12));
    }

    #[test]
    fn contains_is_inclusive_of_bounds() {
        let outer = Span::new(0, 10);
        assert!(outer.contains(&Span::new(0, 10)));
        assert!(outer.contains(&Span::new(3, 3)));
        assert!(!outer.contains(&Span::new(5, 11)));
    }

    #[test]
    #[should_panic(expected = "must be <= end")]
    fn inverted_span_panics() {
        let _ = Span::new(5, 2);
    }

    #[test]
    fn display_is_half_open() {
        assert_eq!(Span::new(1, 4).to_string(), "[1, 4)");
    }
}
