//! Compiler configuration
//!
//! Loaded once at startup from a JSON file or built in code. Every field has
//! a default, so `{}` is a complete configuration:
//!
//! ```json
//! {
//!   "query_cache_capacity": 1000,
//!   "regex_cache_capacity": 500,
//!   "layout": { "kind": "json_column", "column": "data" },
//!   "log_level": "info"
//! }
//! ```

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_QUERY_CACHE_CAPACITY;
use crate::observability::{log_event, Event, Logger, Severity};
use crate::sql::{DocumentLayout, DEFAULT_REGEX_CACHE_CAPACITY};

/// Configuration for the selector compiler and its caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compiled queries kept in the query cache (0 disables caching)
    pub query_cache_capacity: usize,
    /// Regex classifications kept (0 disables caching)
    pub regex_cache_capacity: usize,
    /// How documents are stored
    pub layout: DocumentLayout,
    /// Minimum severity written by the logger.
    ///
    /// The logger threshold is process-wide; it only takes effect through
    /// `init_logging`, never by building a compiler.
    pub log_level: Severity,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            query_cache_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
            regex_cache_capacity: DEFAULT_REGEX_CACHE_CAPACITY,
            layout: DocumentLayout::default(),
            log_level: Severity::Info,
        }
    }
}

impl CompilerConfig {
    /// Create config with both caches disabled.
    pub fn uncached() -> Self {
        Self {
            query_cache_capacity: 0,
            regex_cache_capacity: 0,
            ..Self::default()
        }
    }

    /// Create config for the column layout with the document in `document_column`.
    pub fn columns(document_column: impl Into<String>) -> Self {
        Self {
            layout: DocumentLayout::columns(document_column),
            ..Self::default()
        }
    }

    pub fn with_layout(mut self, layout: DocumentLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_log_level(mut self, level: Severity) -> Self {
        self.log_level = level;
        self
    }

    /// Applies `log_level` to the process-wide logger. Call once at startup.
    pub fn init_logging(&self) {
        Logger::set_min_severity(self.log_level);
    }

    /// Parses and validates a JSON config.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: CompilerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        let config = Self::from_json_str(&text)?;
        let shown = path.display().to_string();
        let capacity = config.query_cache_capacity.to_string();
        log_event(
            Event::ConfigLoaded,
            &[("path", shown.as_str()), ("query_cache_capacity", capacity.as_str())],
        );
        Ok(config)
    }

    /// The document column is interpolated into SQL unquoted, so it must be
    /// a plain identifier.
    pub fn validate(&self) -> ConfigResult<()> {
        let column = self.layout.document_column();
        let mut chars = column.chars();
        let plain = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !plain {
            return Err(ConfigError::invalid(
                "layout",
                format!("document column '{}' is not a plain identifier", column),
            ));
        }
        Ok(())
    }
}
