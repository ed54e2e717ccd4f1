//! FSH Parser
//!
//! Error-tolerant scanner and parser for FHIR Shorthand (FSH) files. The
//! parser always returns a [`FshDocument`] holding every entity it could
//! recover, together with the syntax errors it found on the way. Every
//! value in the tree carries the source location it was read from.
//!
//! ```
//! let result = fsh_parser::parse("Profile: MyPatient\nParent: Patient\n* name MS");
//! assert!(result.is_valid());
//! assert_eq!(result.document.profiles[0].name.value, "MyPatient");
//! ```

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod location;
mod parser;
pub mod result;

pub use ast::{
    Alias, CodeSystem, Concept, DataType, EntityKind, EntityRef, Extension, Flags, FshDocument,
    Instance, Invariant, Logical, Mapping, Profile, Resource, RuleSet, RuleSetRule, ValueSet,
};
pub use config::ParserConfig;
pub use diagnostics::{ParseErrors, SyntaxError, SyntaxErrorKind};
pub use error::{ErrorKind, FshError};
pub use location::{Location, ParsedElement, Position};
pub use result::{Result, ResultExt};

/// Outcome of one parse call
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Everything that could be recovered from the source
    pub document: FshDocument,
    /// Every lexical and syntax error, in source order. `None` when the
    /// source parsed cleanly.
    pub errors: Option<ParseErrors>,
}

impl ParseResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_none()
    }

    /// Treat any syntax error as a failure of the whole file.
    pub fn into_result(self) -> Result<FshDocument> {
        match self.errors {
            None => Ok(self.document),
            Some(errors) => Err(errors.into()),
        }
    }
}

/// Parse a FSH document with the default configuration
pub fn parse(source: &str) -> ParseResult {
    parse_with_config(source, &ParserConfig::default())
}

pub fn parse_with_config(source: &str, config: &ParserConfig) -> ParseResult {
    let (document, errors) = parser::parse_document(source, config);
    ParseResult { document, errors }
}

/// Reusable parser holding a configuration.
///
/// Parsing keeps no state between calls, so one parser can be shared by
/// many threads.
#[derive(Debug, Clone, Default)]
pub struct FshParser {
    config: ParserConfig,
}

impl FshParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse(&self, source: &str) -> ParseResult {
        parse_with_config(source, &self.config)
    }
}

/// Initialize the tracing subscriber for logging
///
/// Does nothing when the application already installed a global
/// subscriber.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fsh_parser=info"));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init();
    if let Err(err) = installed {
        tracing::debug!(%err, "Keeping the existing tracing subscriber");
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_does_not_panic() {
        init_tracing();
        init_tracing();
        assert!(parse("Profile: P\nParent: Patient").is_valid());
    }

    #[test]
    fn zero_max_errors_still_reports_the_failure() {
        let config = ParserConfig {
            max_errors: Some(0),
            ..ParserConfig::default()
        };
        let result = FshParser::with_config(config).parse("Profile: P\n* a b c\n* d e f\n");

        let errors = result.errors.expect("bad rules are reported");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.suppressed(), 1);
        assert!(errors.to_string().starts_with("syntax error on line 2"));
    }
}
