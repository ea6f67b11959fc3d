//! Recursive selector compiler
//!
//! Walks a normalized `Selector` and builds an `SqlExpr` for it. A subtree
//! that cannot be expressed in SQL yields `None` (decline); the splitter
//! decides what to push and what to keep in memory.

use crate::observability::CompilerMetrics;
use crate::schema::SchemaInfo;
use crate::selector::{FieldOp, FieldPath, Selector};

use super::fragment::SqlExpr;
use super::location::{DocumentLayout, Scope, Target};
use super::regex::RegexCache;
use super::value::CompiledFragment;

/// Outcome of translating a selector or a single operator
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Sql(CompiledFragment),
    AlwaysTrue,
    AlwaysFalse,
    /// Not representable in SQL; must be evaluated in memory
    Decline,
}

impl Translation {
    fn from_expr(expr: Option<SqlExpr>) -> Self {
        match expr {
            None => Translation::Decline,
            Some(SqlExpr::Const(true)) => Translation::AlwaysTrue,
            Some(SqlExpr::Const(false)) => Translation::AlwaysFalse,
            Some(expr) => Translation::Sql(expr.compile()),
        }
    }

    pub fn is_decline(&self) -> bool {
        matches!(self, Translation::Decline)
    }

    /// The fragment, when the translation produced SQL text
    pub fn fragment(&self) -> Option<&CompiledFragment> {
        match self {
            Translation::Sql(fragment) => Some(fragment),
            _ => None,
        }
    }
}

/// Per-compilation state.
///
/// Holds the schema and layout for one compile and the counter that names
/// `json_each` aliases (`j1`, `j2`, ...), so aliases are unique within one
/// statement and deterministic across compiles.
pub struct Compiler<'a> {
    pub(crate) schema: &'a SchemaInfo,
    pub(crate) layout: &'a DocumentLayout,
    pub(crate) regex_cache: Option<&'a RegexCache>,
    pub(crate) metrics: Option<&'a CompilerMetrics>,
    next_alias: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(schema: &'a SchemaInfo, layout: &'a DocumentLayout) -> Self {
        Self {
            schema,
            layout,
            regex_cache: None,
            metrics: None,
            next_alias: 0,
        }
    }

    pub fn with_regex_cache(mut self, cache: &'a RegexCache) -> Self {
        self.regex_cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: &'a CompilerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Translates a whole selector
    pub fn translate(&mut self, selector: &Selector) -> Translation {
        Translation::from_expr(self.selector(selector, &Scope::Root))
    }

    /// Translates one operator on one field
    pub fn translate_operator(&mut self, path: &str, op: &FieldOp) -> Translation {
        let segments = FieldPath::parse(path);
        let expr = Target::resolve(self.schema, self.layout, &Scope::Root, segments.segments())
            .and_then(|target| self.op(&target, op));
        Translation::from_expr(expr)
    }

    pub(crate) fn next_alias(&mut self) -> String {
        self.next_alias += 1;
        format!("j{}", self.next_alias)
    }

    pub(crate) fn selector(&mut self, selector: &Selector, scope: &Scope<'a>) -> Option<SqlExpr> {
        match selector {
            Selector::Const(b) => Some(SqlExpr::Const(*b)),
            Selector::And(children) => Some(SqlExpr::and(self.children(children, scope)?)),
            Selector::Or(children) => Some(SqlExpr::or(self.children(children, scope)?)),
            Selector::Nor(children) => Some(SqlExpr::not(SqlExpr::or(
                self.children(children, scope)?,
            ))),
            Selector::Field { path, ops } => {
                let target = Target::resolve(self.schema, self.layout, scope, path.segments())?;
                self.ops(&target, ops)
            }
        }
    }

    fn children(&mut self, children: &[Selector], scope: &Scope<'a>) -> Option<Vec<SqlExpr>> {
        children
            .iter()
            .map(|child| self.selector(child, scope))
            .collect()
    }

    /// AND of several operators on one target
    pub(crate) fn ops(&mut self, target: &Target<'a>, ops: &[FieldOp]) -> Option<SqlExpr> {
        let parts = ops
            .iter()
            .map(|op| self.op(target, op))
            .collect::<Option<Vec<_>>>()?;
        Some(SqlExpr::and(parts))
    }
}

/// Translates a selector without caches.
pub fn translate(selector: &Selector, schema: &SchemaInfo, layout: &DocumentLayout) -> Translation {
    Compiler::new(schema, layout).translate(selector)
}

/// Translates a single operator on a dotted path without caches.
pub fn translate_operator(
    path: &str,
    op: &FieldOp,
    schema: &SchemaInfo,
    layout: &DocumentLayout,
) -> Translation {
    Compiler::new(schema, layout).translate_operator(path, op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};
    use crate::selector::parse_selector;
    use serde_json::json;

    fn schema() -> SchemaInfo {
        SchemaInfo::new(1)
            .with_field("age", FieldDef::optional_number())
            .with_field("name", FieldDef::required_string())
            .with_field("tags", FieldDef::optional_array(FieldType::String))
    }

    fn sql(selector: serde_json::Value) -> Translation {
        translate(
            &parse_selector(&selector),
            &schema(),
            &DocumentLayout::default(),
        )
    }

    #[test]
    fn test_constant_selectors() {
        assert_eq!(sql(json!({})), Translation::AlwaysTrue);
        assert_eq!(sql(json!({"$or": []})), Translation::AlwaysFalse);
        assert_eq!(sql(json!({"age": {}})), Translation::AlwaysFalse);
    }

    #[test]
    fn test_and_of_fields() {
        let out = sql(json!({"age": {"$gt": 3}, "name": "bob"}));
        let fragment = out.fragment().unwrap();
        assert_eq!(
            fragment.sql,
            "json_extract(data, '$.age') > ? AND json_extract(data, '$.name') = ?"
        );
        assert_eq!(fragment.args.len(), 2);
    }

    #[test]
    fn test_or_declines_as_a_whole() {
        let out = sql(json!({"$or": [{"age": 1}, {"name": {"$regex": "a.c"}}]}));
        assert!(out.is_decline());
    }

    #[test]
    fn test_nor_is_negated_or() {
        let out = sql(json!({"$nor": [{"age": 1}, {"age": 2}]}));
        assert_eq!(
            out.fragment().unwrap().sql,
            "NOT COALESCE(((json_extract(data, '$.age') = ?) OR (json_extract(data, '$.age') = ?)), 0)"
        );
    }

    #[test]
    fn test_aliases_are_unique() {
        let out = sql(json!({"tags": "a", "other": {"$elemMatch": {"$gt": 1}}}));
        let text = &out.fragment().unwrap().sql;
        assert!(text.contains("AS j1"));
        assert!(text.contains("AS j2"));
    }

    #[test]
    fn test_translate_operator() {
        let out = translate_operator(
            "age",
            &FieldOp::Exists(true),
            &schema(),
            &DocumentLayout::default(),
        );
        assert_eq!(
            out.fragment().unwrap().sql,
            "json_type(data, '$.age') IS NOT NULL"
        );
    }
}
