//! Error types for the Loadwise advisor engine.
//!
//! Uses `thiserror` for public API error types. Invalid input is always reported
//! with the offending field so callers can surface it as a form-validation message.

/// Top-level error type for the advisor engine.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Agent collection is empty, a single-agent estimate needs at least one agent")]
    EmptyAgents,

    #[error("Unknown execution mode: '{value}' (expected 'sequential' or 'parallel')")]
    UnknownExecutionMode { value: String },

    #[error("Change '{change}' does not apply to a {task} task")]
    InapplicableChange { change: String, task: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AdvisorError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

impl From<Box<figment::Error>> for ConfigError {
    fn from(err: Box<figment::Error>) -> Self {
        ConfigError::ParseError {
            message: err.to_string(),
        }
    }
}

/// A type alias for results using the top-level `AdvisorError`.
pub type Result<T> = std::result::Result<T, AdvisorError>;
