//! Source positions and the value-with-location wrapper used by every AST leaf.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in the source text.
///
/// `line` and `column` are 1-based, and `column` counts characters rather
/// than bytes. `offset` is the 0-based byte offset, which lets autofixes
/// slice the original text without recomputing line starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Position of the first character of a document.
    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The span of a construct. `end` is exclusive: it points just past the
/// last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

impl Location {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(start <= end, "location start {start} is after end {end}");
        Self { start, end }
    }

    /// Smallest location that contains both `self` and `other`.
    pub fn cover(self, other: Location) -> Location {
        Location {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, other: &Location) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Byte range of this location, suitable for slicing the source.
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.start.offset..self.end.offset
    }

    /// Text covered by this location in `source`.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.byte_range()]
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A value extracted from source together with where it was written.
///
/// Values the parser fills in on its own (a flag that was never written,
/// `exactly` on a plain assignment) have no location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedElement<T> {
    pub value: T,
    pub location: Option<Location>,
}

impl<T> ParsedElement<T> {
    pub fn new(value: T, location: Location) -> Self {
        Self {
            value,
            location: Some(location),
        }
    }

    pub fn without_location(value: T) -> Self {
        Self {
            value,
            location: None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParsedElement<U> {
        ParsedElement {
            value: f(self.value),
            location: self.location,
        }
    }

    pub fn is_written(&self) -> bool {
        self.location.is_some()
    }
}

impl ParsedElement<String> {
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: fmt::Display> fmt::Display for ParsedElement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} @ {}", self.value, location),
            None => write!(f, "{}", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(a: (usize, usize, usize), b: (usize, usize, usize)) -> Location {
        Location::new(Position::new(a.0, a.1, a.2), Position::new(b.0, b.1, b.2))
    }

    #[test]
    fn positions_order_by_line_then_column() {
        assert!(Position::new(1, 9, 8) < Position::new(2, 1, 10));
        assert!(Position::new(2, 1, 10) < Position::new(2, 4, 13));
    }

    #[test]
    fn cover_spans_both_locations() {
        let a = loc((1, 3, 2), (1, 7, 6));
        let b = loc((1, 9, 8), (2, 2, 14));
        let covered = a.cover(b);
        assert_eq!(covered.start, a.start);
        assert_eq!(covered.end, b.end);
        assert!(covered.contains(&a));
        assert!(covered.contains(&b));
        assert!(!a.contains(&b));
    }

    #[test]
    fn slice_returns_covered_text() {
        let source = "* value = 10.5 'mg'";
        let location = loc((1, 11, 10), (1, 20, 19));
        assert_eq!(location.slice(source), "10.5 'mg'");
    }

    #[test]
    fn unwritten_elements_have_no_location() {
        let element = ParsedElement::without_location(false);
        assert!(!element.is_written());
        assert_eq!(element.to_string(), "false");
    }
}
