//! Partial pushdown splitter
//!
//! Splits a selector into the largest conjunction SQL can evaluate and a
//! residual selector for the in-memory matcher:
//!
//! - top-level conjuncts (and the operators of a multi-operator field) are
//!   pushed one by one; a declining conjunct moves to the residual
//! - `$or` and `$nor` are pushed whole or moved whole, never split
//! - when the pushed part is always false, the residual is dropped
//!
//! Running the SQL and then the residual matches exactly the documents the
//! matcher would accept for the full selector.

use serde::Serialize;
use serde_json::Value;

use crate::matcher;
use crate::schema::SchemaInfo;
use crate::selector::{parse_selector, Selector};

use super::compiler::Compiler;
use super::fragment::SqlExpr;
use super::location::{DocumentLayout, Scope};
use super::value::CompiledFragment;

/// The SQL side of a compiled query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SqlPredicate {
    /// No SQL filter; every row is fetched
    MatchAll,
    Fragment(CompiledFragment),
}

impl SqlPredicate {
    pub fn fragment(&self) -> Option<&CompiledFragment> {
        match self {
            SqlPredicate::MatchAll => None,
            SqlPredicate::Fragment(fragment) => Some(fragment),
        }
    }

    /// WHERE-clause text (`1=1` for match-all)
    pub fn where_sql(&self) -> &str {
        match self {
            SqlPredicate::MatchAll => "1=1",
            SqlPredicate::Fragment(fragment) => &fragment.sql,
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, SqlPredicate::MatchAll)
    }
}

/// A selector split into SQL and residual parts
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: SqlPredicate,
    pub residual: Option<Selector>,
    /// Number of top-level conjuncts that declined
    pub declined: usize,
}

impl CompiledQuery {
    pub fn has_residual(&self) -> bool {
        self.residual.is_some()
    }

    /// True when the SQL side can never match
    pub fn matches_nothing(&self) -> bool {
        matches!(&self.sql, SqlPredicate::Fragment(f) if f.sql == "1=0")
    }

    /// Applies the residual to a fetched document
    pub fn residual_matches(&self, document: &Value) -> bool {
        self.residual
            .as_ref()
            .map_or(true, |residual| matcher::matches(residual, document))
    }

    /// Residual rendered as selector JSON, for explain output and logs
    pub fn residual_json(&self) -> Option<Value> {
        self.residual.as_ref().map(Selector::to_value)
    }
}

impl<'a> Compiler<'a> {
    /// Splits a selector into pushed SQL and a residual
    pub fn split(&mut self, selector: &Selector) -> CompiledQuery {
        let mut pushed = Vec::new();
        let mut residual = Vec::new();

        for conjunct in conjuncts(selector) {
            match self.selector(&conjunct, &Scope::Root) {
                Some(expr) => pushed.push(expr),
                None => residual.push(conjunct),
            }
        }

        let declined = residual.len();
        let pushed = SqlExpr::and(pushed);
        if pushed == SqlExpr::Const(false) {
            residual.clear();
        }

        let sql = match pushed {
            SqlExpr::Const(true) => SqlPredicate::MatchAll,
            other => SqlPredicate::Fragment(other.compile()),
        };
        let residual = match residual.len() {
            0 => None,
            _ => Some(Selector::and(residual)),
        };

        CompiledQuery {
            sql,
            residual,
            declined,
        }
    }
}

/// Top-level conjuncts, with multi-operator fields split per operator
fn conjuncts(selector: &Selector) -> Vec<Selector> {
    match selector {
        Selector::And(children) => children.iter().flat_map(conjuncts).collect(),
        Selector::Field { path, ops } if ops.len() > 1 => ops
            .iter()
            .map(|op| Selector::Field {
                path: path.clone(),
                ops: vec![op.clone()],
            })
            .collect(),
        other => vec![other.clone()],
    }
}

/// Parses and splits a selector without caches
pub fn compile_selector(selector: &Value, schema: &SchemaInfo, layout: &DocumentLayout) -> CompiledQuery {
    Compiler::new(schema, layout).split(&parse_selector(selector))
}
