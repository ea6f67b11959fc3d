//! Observable compiler events
//!
//! Events are explicit and typed. Each carries its default severity: the
//! per-compile events are Trace, lifecycle events are Info.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Compilation
    /// Selector compiled (cache miss or uncached compile)
    SelectorCompiled,
    /// Compiled query kept a residual predicate
    ResidualFallback,
    /// Compiled query served from the cache
    QueryCacheHit,
    /// Compiled query not in the cache
    QueryCacheMiss,
    /// Query planned with pagination and count placement
    QueryPlanned,

    // Lifecycle
    /// Caches cleared after a schema migration
    CachesCleared,
    /// Configuration loaded from a file
    ConfigLoaded,
    /// Schemas loaded from a directory
    SchemasLoaded,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SelectorCompiled => "SELECTOR_COMPILED",
            Event::ResidualFallback => "RESIDUAL_FALLBACK",
            Event::QueryCacheHit => "QUERY_CACHE_HIT",
            Event::QueryCacheMiss => "QUERY_CACHE_MISS",
            Event::QueryPlanned => "QUERY_PLANNED",
            Event::CachesCleared => "CACHES_CLEARED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemasLoaded => "SCHEMAS_LOADED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::SelectorCompiled
            | Event::ResidualFallback
            | Event::QueryCacheHit
            | Event::QueryCacheMiss
            | Event::QueryPlanned => Severity::Trace,
            Event::CachesCleared | Event::ConfigLoaded | Event::SchemasLoaded => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
