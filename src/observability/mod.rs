//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Compiler and cache counters
//! - Typed events
//!
//! Observability is read-only: nothing here changes what the compiler
//! produces.
//!
//! # Usage
//!
//! ```ignore
//! use docsql::observability::{log_event, CompilerMetrics, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Trace);
//! log_event(Event::SelectorCompiled, &[("collection", "users")]);
//!
//! let metrics = CompilerMetrics::new();
//! metrics.increment_selectors_compiled();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{CompilerMetrics, MetricsSnapshot};

/// Logs an event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
