//! Query plans
//!
//! A plan places every part of a query on one side of the SQL boundary:
//!
//! - the selector is split by the compiler into pushed SQL and a residual
//! - sort goes to `ORDER BY` when every key can be addressed in SQL
//! - skip and limit go to SQL only when nothing is filtered or sorted after
//!   the rows come back, since otherwise SQL would count rows the residual
//!   later drops
//! - counting uses `COUNT(*)` only without a residual

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;

use crate::matcher::{compare_numbers, lookup};
use crate::schema::SchemaInfo;
use crate::sql::{quote_identifier, CompiledFragment, CompiledQuery, DocumentLayout, Scope, SqlValue, Target};

use super::ast::{Query, SortDirection, SortSpec};

/// Where skip and limit are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub sql_limit: Option<u64>,
    pub sql_offset: Option<u64>,
    pub memory_skip: u64,
    pub memory_limit: Option<u64>,
}

impl Pagination {
    fn in_sql(skip: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            sql_limit: limit,
            sql_offset: skip.filter(|s| *s > 0),
            ..Self::default()
        }
    }

    fn in_memory(skip: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            memory_skip: skip.unwrap_or(0),
            memory_limit: limit,
            ..Self::default()
        }
    }

    /// `sql`, `memory` or `none`
    pub fn placement(&self) -> &'static str {
        if self.sql_limit.is_some() || self.sql_offset.is_some() {
            "sql"
        } else if self.memory_skip > 0 || self.memory_limit.is_some() {
            "memory"
        } else {
            "none"
        }
    }
}

/// How a count is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountStrategy {
    /// `SELECT COUNT(*)` with the pushed predicate
    Sql,
    /// Fetch matching rows and count those the residual accepts
    Materialize,
}

impl CountStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountStrategy::Sql => "SQL_COUNT",
            CountStrategy::Materialize => "MATERIALIZE",
        }
    }
}

/// Immutable plan for one query
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub collection: String,
    pub compiled: Arc<CompiledQuery>,
    pub sort: Vec<SortSpec>,
    /// `ORDER BY` terms; `None` when the sort runs in memory
    pub order_by: Option<Vec<String>>,
    pub pagination: Pagination,
    pub count: CountStrategy,
    document_column: String,
}

impl QueryPlan {
    pub fn new(
        query: &Query,
        compiled: Arc<CompiledQuery>,
        schema: &SchemaInfo,
        layout: &DocumentLayout,
    ) -> Self {
        let order_by = order_by_terms(&query.sort, schema, layout);
        let post_filtered = compiled.has_residual() || order_by.is_none();

        let pagination = if post_filtered {
            Pagination::in_memory(query.skip, query.limit)
        } else {
            Pagination::in_sql(query.skip, query.limit)
        };
        let count = if compiled.has_residual() {
            CountStrategy::Materialize
        } else {
            CountStrategy::Sql
        };

        Self {
            collection: query.collection.clone(),
            compiled,
            sort: query.sort.clone(),
            order_by,
            pagination,
            count,
            document_column: layout.document_column().to_string(),
        }
    }

    /// True when sorting happens after fetch
    pub fn sorts_in_memory(&self) -> bool {
        !self.sort.is_empty() && self.order_by.is_none()
    }

    /// Full SELECT statement returning the document column
    pub fn select_statement(&self, table: &str) -> CompiledFragment {
        let (mut sql, mut args) = self.filtered_select(table, &self.document_column);

        if let Some(terms) = self.order_by.as_ref().filter(|t| !t.is_empty()) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        match (self.pagination.sql_limit, self.pagination.sql_offset) {
            (None, None) => {}
            (limit, offset) => {
                sql.push_str(" LIMIT ?");
                args.push(SqlValue::Integer(limit.map_or(-1, to_i64)));
                if let Some(offset) = offset {
                    sql.push_str(" OFFSET ?");
                    args.push(SqlValue::Integer(to_i64(offset)));
                }
            }
        }
        CompiledFragment::new(sql, args)
    }

    /// Statement for counting matches.
    ///
    /// With `CountStrategy::Sql` this is `SELECT COUNT(*)`; otherwise it
    /// fetches the candidate documents for `count_rows`. Skip and limit do
    /// not apply to counts.
    pub fn count_statement(&self, table: &str) -> CompiledFragment {
        let (sql, args) = match self.count {
            CountStrategy::Sql => self.filtered_select(table, "COUNT(*)"),
            CountStrategy::Materialize => self.filtered_select(table, &self.document_column),
        };
        CompiledFragment::new(sql, args)
    }

    fn filtered_select(&self, table: &str, projection: &str) -> (String, Vec<SqlValue>) {
        let mut sql = format!("SELECT {} FROM {}", projection, quote_identifier(table));
        let mut args = Vec::new();
        if let Some(fragment) = self.compiled.sql.fragment() {
            sql.push_str(" WHERE ");
            sql.push_str(&fragment.sql);
            args.extend(fragment.args.iter().cloned());
        }
        (sql, args)
    }

    /// Applies the residual, in-memory sort and in-memory pagination to
    /// fetched documents.
    pub fn apply_residual(&self, rows: Vec<Value>) -> Vec<Value> {
        let mut rows: Vec<Value> = rows
            .into_iter()
            .filter(|row| self.compiled.residual_matches(row))
            .collect();

        if self.sorts_in_memory() {
            sort_documents(&mut rows, &self.sort);
        }

        let skip = usize::try_from(self.pagination.memory_skip).unwrap_or(usize::MAX);
        let limit = self
            .pagination
            .memory_limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        rows.into_iter().skip(skip).take(limit).collect()
    }

    /// Counts fetched documents the residual accepts
    pub fn count_rows(&self, rows: &[Value]) -> usize {
        rows.iter()
            .filter(|row| self.compiled.residual_matches(row))
            .count()
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn order_by_terms(sort: &[SortSpec], schema: &SchemaInfo, layout: &DocumentLayout) -> Option<Vec<String>> {
    sort.iter()
        .map(|spec| {
            let path = spec.path();
            Target::resolve(schema, layout, &Scope::Root, path.segments())
                .map(|target| format!("{} {}", target.value(), spec.direction.sql()))
        })
        .collect()
}

/// Sorts documents the way the store orders extracted values: missing and
/// null first, then numbers (booleans as 0 and 1), then text. Arrays and
/// objects extract as JSON text.
pub fn sort_documents(rows: &mut [Value], sort: &[SortSpec]) {
    let paths: Vec<_> = sort.iter().map(SortSpec::path).collect();
    rows.sort_by(|a, b| {
        for (spec, path) in sort.iter().zip(&paths) {
            let ordering = compare_sort_keys(lookup(a, path.segments()), lookup(b, path.segments()));
            let ordering = match spec.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

enum SortKey<'v> {
    Null,
    Number(serde_json::Number),
    Text(std::borrow::Cow<'v, str>),
}

fn sort_key(value: Option<&Value>) -> SortKey<'_> {
    match value {
        None | Some(Value::Null) => SortKey::Null,
        Some(Value::Bool(b)) => SortKey::Number(serde_json::Number::from(u8::from(*b))),
        Some(Value::Number(n)) => SortKey::Number(n.clone()),
        Some(Value::String(s)) => SortKey::Text(std::borrow::Cow::Borrowed(s)),
        Some(other) => SortKey::Text(std::borrow::Cow::Owned(other.to_string())),
    }
}

fn compare_sort_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (sort_key(a), sort_key(b)) {
        (SortKey::Null, SortKey::Null) => Ordering::Equal,
        (SortKey::Null, _) => Ordering::Less,
        (_, SortKey::Null) => Ordering::Greater,
        (SortKey::Number(x), SortKey::Number(y)) => compare_numbers(&x, &y).unwrap_or(Ordering::Equal),
        (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        (SortKey::Text(x), SortKey::Text(y)) => x.as_bytes().cmp(y.as_bytes()),
    }
}
