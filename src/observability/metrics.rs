//! Compiler metrics
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the selector compiler and its caches.
///
/// # Thread Safety
///
/// All counters use atomic operations with Relaxed ordering; a snapshot is
/// not a consistent cut across counters.
#[derive(Debug, Default)]
pub struct CompilerMetrics {
    /// Selectors compiled (cache misses and uncached compiles)
    selectors_compiled: AtomicU64,
    query_cache_hits: AtomicU64,
    query_cache_misses: AtomicU64,
    regex_cache_hits: AtomicU64,
    regex_cache_misses: AtomicU64,
    /// Compiled queries that kept a residual predicate
    residual_fallbacks: AtomicU64,
    /// Top-level conjuncts moved to the residual
    declined_leaves: AtomicU64,
}

impl CompilerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_selectors_compiled(&self) {
        self.selectors_compiled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_query_cache_hits(&self) {
        self.query_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_query_cache_misses(&self) {
        self.query_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_regex_cache_hits(&self) {
        self.regex_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_regex_cache_misses(&self) {
        self.regex_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_residual_fallbacks(&self) {
        self.residual_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds declined conjuncts from one compile
    pub fn add_declined_leaves(&self, count: u64) {
        self.declined_leaves.fetch_add(count, Ordering::Relaxed);
    }

    /// Current values as JSON
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"declined_leaves":{},"query_cache_hits":{},"query_cache_misses":{},"regex_cache_hits":{},"regex_cache_misses":{},"residual_fallbacks":{},"selectors_compiled":{}}}"#,
            s.declined_leaves,
            s.query_cache_hits,
            s.query_cache_misses,
            s.regex_cache_hits,
            s.regex_cache_misses,
            s.residual_fallbacks,
            s.selectors_compiled,
        )
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            selectors_compiled: self.selectors_compiled.load(Ordering::Relaxed),
            query_cache_hits: self.query_cache_hits.load(Ordering::Relaxed),
            query_cache_misses: self.query_cache_misses.load(Ordering::Relaxed),
            regex_cache_hits: self.regex_cache_hits.load(Ordering::Relaxed),
            regex_cache_misses: self.regex_cache_misses.load(Ordering::Relaxed),
            residual_fallbacks: self.residual_fallbacks.load(Ordering::Relaxed),
            declined_leaves: self.declined_leaves.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub selectors_compiled: u64,
    pub query_cache_hits: u64,
    pub query_cache_misses: u64,
    pub regex_cache_hits: u64,
    pub regex_cache_misses: u64,
    pub residual_fallbacks: u64,
    pub declined_leaves: u64,
}

impl MetricsSnapshot {
    /// Fraction of query-cache lookups that hit, 0.0 when none happened
    pub fn query_cache_hit_ratio(&self) -> f64 {
        let total = self.query_cache_hits + self.query_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.query_cache_hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        assert_eq!(CompilerMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let metrics = CompilerMetrics::new();

        metrics.increment_selectors_compiled();
        metrics.increment_selectors_compiled();
        metrics.increment_query_cache_hits();
        metrics.increment_query_cache_misses();
        metrics.increment_regex_cache_hits();
        metrics.increment_regex_cache_misses();
        metrics.increment_residual_fallbacks();
        metrics.add_declined_leaves(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.selectors_compiled, 2);
        assert_eq!(snapshot.query_cache_hits, 1);
        assert_eq!(snapshot.query_cache_misses, 1);
        assert_eq!(snapshot.regex_cache_hits, 1);
        assert_eq!(snapshot.regex_cache_misses, 1);
        assert_eq!(snapshot.residual_fallbacks, 1);
        assert_eq!(snapshot.declined_leaves, 3);
    }

    #[test]
    fn test_hit_ratio() {
        let metrics = CompilerMetrics::new();
        assert_eq!(metrics.snapshot().query_cache_hit_ratio(), 0.0);

        metrics.increment_query_cache_hits();
        metrics.increment_query_cache_hits();
        metrics.increment_query_cache_hits();
        metrics.increment_query_cache_misses();
        assert_eq!(metrics.snapshot().query_cache_hit_ratio(), 0.75);
    }

    #[test]
    fn test_to_json() {
        let metrics = CompilerMetrics::new();
        metrics.increment_selectors_compiled();
        metrics.add_declined_leaves(2);

        let parsed: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(parsed["selectors_compiled"], 1);
        assert_eq!(parsed["declined_leaves"], 2);
        assert_eq!(parsed["query_cache_hits"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(CompilerMetrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let m = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.increment_query_cache_hits();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().query_cache_hits, 1000);
    }
}
