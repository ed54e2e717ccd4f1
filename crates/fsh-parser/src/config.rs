//! Parser configuration
//!
//! The parser works without any configuration. Tools that embed it can
//! tune error reporting and indentation checks, usually from a section of
//! their own config file:
//!
//! ```toml
//! maxErrors = 50
//! indentWidth = 2
//! strictIndentation = true
//! ```

use crate::error::FshError;
use crate::result::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Keep at most this many diagnostics per document. The rest are
    /// counted but not stored.
    pub max_errors: Option<usize>,

    /// Number of spaces per nesting level of indented rules
    pub indent_width: usize,

    /// Report rule lines whose indentation is not a multiple of
    /// `indent_width`. The rules are parsed either way.
    pub strict_indentation: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_errors: None,
            indent_width: 2,
            strict_indentation: false,
        }
    }
}

impl ParserConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.indent_width == 0 {
            return Err(FshError::config_error("indentWidth must be at least 1"));
        }
        if self.max_errors == Some(0) {
            return Err(FshError::config_error(
                "maxErrors must be at least 1; leave it unset for no limit",
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.max_errors, None);
        assert_eq!(config.indent_width, 2);
        assert!(!config.strict_indentation);
    }

    #[test]
    fn load_from_toml() {
        let config = ParserConfig::from_toml_str(
            r#"
            maxErrors = 10
            strictIndentation = true
            "#,
        )
        .unwrap();
        assert_eq!(config.max_errors, Some(10));
        assert_eq!(config.indent_width, 2);
        assert!(config.strict_indentation);
    }

    #[test]
    fn load_from_json() {
        let config = ParserConfig::from_json_str(r#"{ "indentWidth": 4 }"#).unwrap();
        assert_eq!(config.indent_width, 4);
        assert_eq!(config.max_errors, None);
    }

    #[test]
    fn reject_unknown_fields() {
        let err = ParserConfig::from_json_str(r#"{ "indent": 4 }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn reject_zero_indent_width() {
        let err = ParserConfig::from_toml_str("indentWidth = 0").unwrap_err();
        assert!(err.to_string().contains("indentWidth"));
    }
}
