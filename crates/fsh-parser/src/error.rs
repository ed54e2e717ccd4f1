//! Error types for callers of the parser

use crate::diagnostics::ParseErrors;
use thiserror::Error;

/// Main error type of the crate
#[derive(Debug, Error)]
pub enum FshError {
    /// One or more syntax errors in a FSH document
    #[error("failed to parse FSH document:\n{0}")]
    Parse(ParseErrors),

    /// Parser configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Config,
}

impl FshError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FshError::Parse(_) => ErrorKind::Parse,
            FshError::Config { .. } => ErrorKind::Config,
        }
    }

    /// A parse failure only affects one file, so a caller linting many
    /// files can move on to the next one.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Parse
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Syntax errors behind a parse failure.
    pub fn parse_errors(&self) -> Option<&ParseErrors> {
        match self {
            FshError::Parse(errors) => Some(errors),
            FshError::Config { .. } => None,
        }
    }
}

impl From<ParseErrors> for FshError {
    fn from(errors: ParseErrors) -> Self {
        FshError::Parse(errors)
    }
}

impl From<toml::de::Error> for FshError {
    fn from(err: toml::de::Error) -> Self {
        FshError::config_error(err.to_string())
    }
}

impl From<serde_json::Error> for FshError {
    fn from(err: serde_json::Error) -> Self {
        FshError::config_error(err.to_string())
    }
}
