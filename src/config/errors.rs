//! Configuration error types
//!
//! Error codes:
//! - DOCSQL_CONFIG_IO
//! - DOCSQL_CONFIG_MALFORMED
//! - DOCSQL_CONFIG_INVALID

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid JSON for `CompilerConfig`
    #[error("Malformed config: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Config parsed but a value is out of range
    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "DOCSQL_CONFIG_IO",
            ConfigError::Malformed(_) => "DOCSQL_CONFIG_MALFORMED",
            ConfigError::Invalid { .. } => "DOCSQL_CONFIG_INVALID",
        }
    }
}
