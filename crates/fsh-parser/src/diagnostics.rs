//! Syntax diagnostics collected while scanning and parsing.
//!
//! Neither the lexer nor the parser stops at the first problem. Both push
//! into a [`Diagnostics`] collector owned by a single parse call, and the
//! entry point turns whatever was collected into one [`ParseErrors`] value.

use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which stage of the pipeline reported the error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyntaxErrorKind {
    /// Unrecognised or unterminated input found by the lexer
    Lexical,
    /// Token sequence that matches no production
    Syntax,
}

/// A single syntax problem with the location it was found at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub location: Location,
}

impl SyntaxError {
    pub fn lexical(message: impl Into<String>, location: Location) -> Self {
        Self {
            kind: SyntaxErrorKind::Lexical,
            message: message.into(),
            location,
        }
    }

    pub fn syntax(message: impl Into<String>, location: Location) -> Self {
        Self {
            kind: SyntaxErrorKind::Syntax,
            message: message.into(),
            location,
        }
    }

    pub fn line(&self) -> usize {
        self.location.start.line
    }

    pub fn column(&self) -> usize {
        self.location.start.column
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "syntax error on line {}:{} - {}",
            self.line(),
            self.column(),
            self.message
        )
    }
}

/// Call-scoped accumulator for syntax errors.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<SyntaxError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SyntaxError) {
        tracing::trace!(
            line = error.line(),
            column = error.column(),
            "{}",
            error.message
        );
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = SyntaxError>) {
        for error in errors {
            self.push(error);
        }
    }

    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Join everything collected into one aggregate, ordered by source
    /// position. Returns `None` when nothing was recorded.
    ///
    /// With `max_errors` set, only the first `max_errors` errors are kept
    /// and the rest are counted in [`ParseErrors::suppressed`]. At least
    /// one error is always kept.
    pub fn finish(mut self, max_errors: Option<usize>) -> Option<ParseErrors> {
        if self.errors.is_empty() {
            return None;
        }

        // Lexer errors arrive before parser errors; a stable sort
        // interleaves them by position while keeping same-spot order.
        self.errors.sort_by_key(|error| error.location.start);

        let mut suppressed = 0;
        if let Some(max) = max_errors.map(|max| max.max(1))
            && self.errors.len() > max
        {
            suppressed = self.errors.len() - max;
            self.errors.truncate(max);
        }

        Some(ParseErrors {
            errors: self.errors,
            suppressed,
        })
    }
}

/// Every syntax error from one parse call, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseErrors {
    errors: Vec<SyntaxError>,
    suppressed: usize,
}

impl ParseErrors {
    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    /// Number of errors dropped because of `ParserConfig::max_errors`.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SyntaxError> {
        self.errors.iter()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        if self.suppressed > 0 {
            write!(f, "\n... and {} more errors", self.suppressed)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

impl<'a> IntoIterator for &'a ParseErrors {
    type Item = &'a SyntaxError;
    type IntoIter = std::slice::Iter<'a, SyntaxError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
