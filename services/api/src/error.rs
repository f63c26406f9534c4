//! services/api/src/error.rs
//!
//! Errors that stop the server from starting or serving. Per-request failures
//! never reach this type; handlers map them to status codes themselves.

use crate::config::ConfigError;
use report_interpreter_core::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required variable is missing or one has an unusable value.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The credential file could not be prepared.
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),

    /// Binding the listener or serving connections failed.
    #[error("Server I/O error: {0}")]
    Server(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_names_the_variable() {
        let err: ApiError = ConfigError::MissingVar("OPENAI_API_KEY".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing the environment variable OPENAI_API_KEY"
        );
    }
}
