//! Error types for stress-bench-core

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced to callers of the controller's control operations
///
/// These are the only errors that ever leave the engine. Per-attempt probe
/// failures are recorded in the run counters instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// `start` was called while a run is in progress (or still draining)
    #[error("a run is already in progress")]
    AlreadyRunning,

    /// `stop` was called with no active run, or after the run was already told to stop
    #[error("no run is in progress")]
    NotRunning,

    /// The supplied run configuration was rejected before any state changed
    #[error("invalid run configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Engine construction and configuration-loading errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// A required builder field was not provided
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// The controller was built outside of a Tokio runtime
    #[error("no Tokio runtime available: {0}")]
    NoRuntime(String),

    /// A config file could not be parsed
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path of the offending file
        path: String,
        /// Parser error message
        message: String,
    },

    /// A control operation was rejected
    #[error(transparent)]
    Control(#[from] ControlError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Shorthand for [`EngineError::MissingConfig`]
    pub fn missing_config(field: &'static str) -> Self {
        Self::MissingConfig(field)
    }

    /// Build a parse error for `path`
    pub fn parse(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_message() {
        let err = EngineError::missing_config("probe");
        assert_eq!(err.to_string(), "missing required configuration: probe");
    }

    #[test]
    fn test_control_error_from_config_error() {
        let err: ControlError = ConfigError::EmptyUrl.into();
        assert!(matches!(err, ControlError::InvalidConfig(ConfigError::EmptyUrl)));
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_control_error_is_transparent_in_engine_error() {
        let err: EngineError = ControlError::AlreadyRunning.into();
        assert_eq!(err.to_string(), "a run is already in progress");
    }
}
