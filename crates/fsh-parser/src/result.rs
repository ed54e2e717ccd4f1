//! Result type alias for parser operations

use crate::error::FshError;

/// Standard Result type for parser operations
pub type Result<T> = std::result::Result<T, FshError>;

/// Extension trait for Result to provide additional convenience methods
pub trait ResultExt<T> {
    /// Turn a recoverable error into `Ok(None)`
    fn recoverable(self) -> Result<Option<T>>;

    /// Log the error and continue with None
    fn log_and_continue(self) -> Option<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn recoverable(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() => {
                tracing::warn!("Recoverable error: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn log_and_continue(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                if err.is_recoverable() {
                    tracing::warn!("Continuing after error: {}", err);
                } else {
                    tracing::error!("Fatal error: {}", err);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn parse_failure_is_recoverable() {
        let result = parse("* ^abstract = true").into_result();
        assert!(matches!(result.recoverable(), Ok(None)));
    }

    #[test]
    fn config_failure_is_not_recoverable() {
        let result: Result<()> = Err(FshError::config_error("bad"));
        assert!(result.recoverable().is_err());
    }

    #[test]
    fn log_and_continue_keeps_values() {
        let document = parse("Profile: A\nParent: Patient").into_result();
        assert!(document.log_and_continue().is_some());
    }
}
