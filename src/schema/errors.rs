//! Schema error types
//!
//! Error codes:
//! - DOCSQL_SCHEMA_IO
//! - DOCSQL_SCHEMA_MALFORMED
//! - DOCSQL_SCHEMA_INVALID
//! - DOCSQL_SCHEMA_IMMUTABLE
//!
//! These only surface while loading or registering schemas. The compiler
//! itself never fails on a schema it was handed.

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema loading and validation errors
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Schema file could not be read
    #[error("Failed to read schema at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Schema text is not a valid schema document
    #[error("Malformed schema at {location}: {reason}")]
    Malformed { location: String, reason: String },

    /// Schema parsed but is structurally invalid
    #[error("Invalid schema: {0}")]
    Invalid(String),

    /// A schema with the same version is already registered
    #[error("Schema for '{collection}' is already registered at version {version}")]
    Immutable { collection: String, version: u64 },
}

impl SchemaError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    pub fn immutable(collection: impl Into<String>, version: u64) -> Self {
        Self::Immutable {
            collection: collection.into(),
            version,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::Io { .. } => "DOCSQL_SCHEMA_IO",
            SchemaError::Malformed { .. } => "DOCSQL_SCHEMA_MALFORMED",
            SchemaError::Invalid(_) => "DOCSQL_SCHEMA_INVALID",
            SchemaError::Immutable { .. } => "DOCSQL_SCHEMA_IMMUTABLE",
        }
    }
}
