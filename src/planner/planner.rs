//! Selector compiler facade
//!
//! Ties the parser, the SQL compiler, the caches and the metrics together:
//!
//! 1. Look up `(schema version, collection, layout, canonical selector)` in
//!    the query cache
//! 2. On a miss, parse and split the selector, sharing the regex cache
//! 3. Insert the immutable result and hand out `Arc` clones
//!
//! Compilation is synchronous and never fails. Caches are owned outside the
//! facade and can be shared between compilers.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{QueryCache, QueryKey};
use crate::config::CompilerConfig;
use crate::observability::{log_event, CompilerMetrics, Event, Logger, Severity};
use crate::schema::SchemaInfo;
use crate::selector::{canonical_key, parse_selector};
use crate::sql::{CompiledQuery, Compiler, RegexCache};

use super::ast::Query;
use super::explain::ExplainPlan;
use super::plan::QueryPlan;

/// Compiles selectors and plans queries with shared caches
pub struct SelectorCompiler {
    config: CompilerConfig,
    query_cache: Arc<QueryCache>,
    regex_cache: Arc<RegexCache>,
    metrics: Arc<CompilerMetrics>,
}

impl SelectorCompiler {
    /// Creates a compiler with caches sized from the config
    pub fn new(config: CompilerConfig) -> Self {
        let query_cache = Arc::new(QueryCache::new(config.query_cache_capacity));
        let regex_cache = Arc::new(RegexCache::new(config.regex_cache_capacity));
        Self::with_caches(config, query_cache, regex_cache, Arc::new(CompilerMetrics::new()))
    }

    /// Creates a compiler over externally owned caches and metrics
    pub fn with_caches(
        config: CompilerConfig,
        query_cache: Arc<QueryCache>,
        regex_cache: Arc<RegexCache>,
        metrics: Arc<CompilerMetrics>,
    ) -> Self {
        Self {
            config,
            query_cache,
            regex_cache,
            metrics,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<CompilerMetrics> {
        &self.metrics
    }

    pub fn query_cache(&self) -> &Arc<QueryCache> {
        &self.query_cache
    }

    pub fn regex_cache(&self) -> &Arc<RegexCache> {
        &self.regex_cache
    }

    /// Compiles a selector for a collection, serving repeats from the cache
    pub fn compile(&self, selector: &Value, schema: &SchemaInfo, collection: &str) -> Arc<CompiledQuery> {
        let key = QueryKey::new(schema.version, collection, canonical_key(selector))
            .with_layout(&self.config.layout);
        let (compiled, hit) = self
            .query_cache
            .get_or_insert_with(key, || self.compile_uncached(selector, schema, collection));

        if hit {
            self.metrics.increment_query_cache_hits();
            log_event(Event::QueryCacheHit, &[("collection", collection)]);
        } else if self.query_cache.is_enabled() {
            self.metrics.increment_query_cache_misses();
            log_event(Event::QueryCacheMiss, &[("collection", collection)]);
        }
        compiled
    }

    fn compile_uncached(&self, selector: &Value, schema: &SchemaInfo, collection: &str) -> CompiledQuery {
        let compiled = Compiler::new(schema, &self.config.layout)
            .with_regex_cache(&self.regex_cache)
            .with_metrics(&self.metrics)
            .split(&parse_selector(selector));

        self.metrics.increment_selectors_compiled();
        self.metrics.add_declined_leaves(compiled.declined as u64);
        if compiled.has_residual() {
            self.metrics.increment_residual_fallbacks();
        }

        if Logger::enabled(Severity::Trace) {
            let version = schema.version.to_string();
            log_event(
                Event::SelectorCompiled,
                &[
                    ("collection", collection),
                    ("schema_version", version.as_str()),
                    ("sql", compiled.sql.where_sql()),
                ],
            );
            if let Some(residual) = compiled.residual_json() {
                let residual = residual.to_string();
                let declined = compiled.declined.to_string();
                log_event(
                    Event::ResidualFallback,
                    &[
                        ("collection", collection),
                        ("declined", declined.as_str()),
                        ("residual", residual.as_str()),
                    ],
                );
            }
        }
        compiled
    }

    /// Plans a query: compiled selector plus sort, pagination and count
    /// placement
    pub fn plan(&self, query: &Query, schema: &SchemaInfo) -> QueryPlan {
        let compiled = self.compile(&query.selector, schema, &query.collection);
        let plan = QueryPlan::new(query, compiled, schema, &self.config.layout);
        log_event(
            Event::QueryPlanned,
            &[
                ("collection", query.collection.as_str()),
                ("count", plan.count.as_str()),
                ("pagination", plan.pagination.placement()),
            ],
        );
        plan
    }

    pub fn explain(&self, query: &Query, schema: &SchemaInfo) -> ExplainPlan {
        ExplainPlan::from_plan(&self.plan(query, schema))
    }

    /// Drops every cached entry after a schema change.
    ///
    /// Entries for older versions can no longer be served anyway, since the
    /// version is part of the key; clearing frees their memory.
    pub fn on_schema_migration(&self, collection: &str, new_version: u64) {
        self.query_cache.clear();
        self.regex_cache.clear();
        let version = new_version.to_string();
        log_event(
            Event::CachesCleared,
            &[("collection", collection), ("schema_version", version.as_str())],
        );
    }
}

impl Default for SelectorCompiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{CountStrategy, SortSpec};
    use crate::schema::FieldDef;
    use serde_json::json;

    fn schema(version: u64) -> SchemaInfo {
        SchemaInfo::new(version)
            .with_field("age", FieldDef::optional_number())
            .with_field("name", FieldDef::optional_string())
    }

    #[test]
    fn test_compile_caches_by_shape() {
        let compiler = SelectorCompiler::default();
        let a: Value = serde_json::from_str(r#"{"age": 1, "name": "x"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"name": "x", "age": 1}"#).unwrap();

        let first = compiler.compile(&a, &schema(1), "users");
        let second = compiler.compile(&b, &schema(1), "users");
        assert!(Arc::ptr_eq(&first, &second));

        let snapshot = compiler.metrics().snapshot();
        assert_eq!(snapshot.selectors_compiled, 1);
        assert_eq!(snapshot.query_cache_hits, 1);
        assert_eq!(snapshot.query_cache_misses, 1);
    }

    #[test]
    fn test_collections_do_not_share_entries() {
        let compiler = SelectorCompiler::default();
        let sel = json!({"age": 1});
        let a = compiler.compile(&sel, &schema(1), "users");
        let b = compiler.compile(&sel, &schema(1), "admins");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn test_version_bump_recompiles() {
        let compiler = SelectorCompiler::default();
        let sel = json!({"age": {"$gt": 1}});
        let v1 = compiler.compile(&sel, &schema(1), "users");

        // Version 2 no longer declares age
        let v2_schema = SchemaInfo::new(2);
        let v2 = compiler.compile(&sel, &v2_schema, "users");
        assert!(!Arc::ptr_eq(&v1, &v2));
        assert_ne!(v1.sql, v2.sql);
    }

    #[test]
    fn test_schema_migration_clears_caches() {
        let compiler = SelectorCompiler::default();
        compiler.compile(&json!({"name": {"$regex": "^a"}}), &schema(1), "users");
        assert_eq!(compiler.query_cache().len(), 1);
        assert_eq!(compiler.regex_cache().len(), 1);

        compiler.on_schema_migration("users", 2);
        assert!(compiler.query_cache().is_empty());
        assert!(compiler.regex_cache().is_empty());
    }

    #[test]
    fn test_uncached_compiler_counts_no_misses() {
        let compiler = SelectorCompiler::new(CompilerConfig::uncached());
        let sel = json!({"age": 1});
        compiler.compile(&sel, &schema(1), "users");
        compiler.compile(&sel, &schema(1), "users");

        let snapshot = compiler.metrics().snapshot();
        assert_eq!(snapshot.selectors_compiled, 2);
        assert_eq!(snapshot.query_cache_hits, 0);
        assert_eq!(snapshot.query_cache_misses, 0);
    }

    #[test]
    fn test_residual_metrics() {
        let compiler = SelectorCompiler::default();
        compiler.compile(
            &json!({"name": {"$regex": "a+"}, "age": {"$mod": [2, 0]}}),
            &schema(1),
            "users",
        );
        let snapshot = compiler.metrics().snapshot();
        assert_eq!(snapshot.residual_fallbacks, 1);
        assert_eq!(snapshot.declined_leaves, 1);
        assert_eq!(snapshot.regex_cache_misses, 1);
    }

    #[test]
    fn test_plan_and_explain() {
        let compiler = SelectorCompiler::default();
        let query = Query::new("users", json!({"age": {"$gte": 18}}))
            .with_sort(SortSpec::desc("age"))
            .with_limit(10);

        let plan = compiler.plan(&query, &schema(1));
        assert_eq!(plan.count, CountStrategy::Sql);
        assert_eq!(plan.pagination.sql_limit, Some(10));

        let explain = compiler.explain(&query, &schema(1));
        assert_eq!(explain.sort_placement, Some("sql"));
    }

    #[test]
    fn test_shared_caches() {
        let query_cache = Arc::new(QueryCache::new(8));
        let regex_cache = Arc::new(RegexCache::new(8));
        let metrics = Arc::new(CompilerMetrics::new());
        let a = SelectorCompiler::with_caches(
            CompilerConfig::default(),
            Arc::clone(&query_cache),
            Arc::clone(&regex_cache),
            Arc::clone(&metrics),
        );
        let b = SelectorCompiler::with_caches(
            CompilerConfig::default(),
            query_cache,
            regex_cache,
            Arc::clone(&metrics),
        );

        let sel = json!({"age": 4});
        let first = a.compile(&sel, &schema(1), "users");
        let second = b.compile(&sel, &schema(1), "users");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(metrics.snapshot().query_cache_hits, 1);
    }
}
