//! SQL fragment algebra
//!
//! Translators build `SqlExpr` trees instead of concatenating strings. The
//! tree is flattened to text once, at the end, and the renderer owns every
//! parenthesization decision:
//!
//! - `And` joins children with ` AND `
//! - `Or` wraps each child and the whole group: `((a) OR (b))`
//! - `Not` renders `NOT (x)`, or `NOT COALESCE(x, 0)` when `x` may be NULL
//!
//! A leaf is nullable when SQL may evaluate it to NULL (a comparison against
//! a missing path). Under `WHERE`, NULL filters like false, but `NOT NULL` is
//! still NULL, so negations coalesce nullable operands to keep two-valued
//! semantics.

use super::value::{CompiledFragment, SqlValue};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    Const(bool),
    Leaf {
        sql: String,
        args: Vec<SqlValue>,
        nullable: bool,
    },
    And(Vec<SqlExpr>),
    Or(Vec<SqlExpr>),
    Not(Box<SqlExpr>),
}

impl SqlExpr {
    /// Leaf that may evaluate to NULL
    pub fn leaf(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        SqlExpr::Leaf {
            sql: sql.into(),
            args,
            nullable: true,
        }
    }

    /// Leaf that always evaluates to 0 or 1
    pub fn strict(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        SqlExpr::Leaf {
            sql: sql.into(),
            args,
            nullable: false,
        }
    }

    pub fn and(children: Vec<SqlExpr>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                SqlExpr::Const(true) => {}
                SqlExpr::Const(false) => return SqlExpr::Const(false),
                SqlExpr::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => SqlExpr::Const(true),
            1 => flat.swap_remove(0),
            _ => SqlExpr::And(flat),
        }
    }

    pub fn or(children: Vec<SqlExpr>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                SqlExpr::Const(false) => {}
                SqlExpr::Const(true) => return SqlExpr::Const(true),
                SqlExpr::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => SqlExpr::Const(false),
            1 => flat.swap_remove(0),
            _ => SqlExpr::Or(flat),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: SqlExpr) -> Self {
        match inner {
            SqlExpr::Const(b) => SqlExpr::Const(!b),
            SqlExpr::Not(inner) => *inner,
            other => SqlExpr::Not(Box::new(other)),
        }
    }

    /// `EXISTS` over a correlated `json_each` scan.
    ///
    /// `source` is the table-valued function call and must not bind
    /// arguments of its own.
    pub fn exists(source: &str, alias: &str, inner: SqlExpr) -> Self {
        match inner {
            SqlExpr::Const(false) => SqlExpr::Const(false),
            SqlExpr::Const(true) => {
                SqlExpr::strict(format!("EXISTS(SELECT 1 FROM {} AS {})", source, alias), vec![])
            }
            inner => {
                let body = inner.compile();
                SqlExpr::strict(
                    format!(
                        "EXISTS(SELECT 1 FROM {} AS {} WHERE {})",
                        source, alias, body.sql
                    ),
                    body.args,
                )
            }
        }
    }

    /// Whether SQL may evaluate this expression to NULL
    pub fn nullable(&self) -> bool {
        match self {
            SqlExpr::Const(_) | SqlExpr::Not(_) => false,
            SqlExpr::Leaf { nullable, .. } => *nullable,
            SqlExpr::And(children) | SqlExpr::Or(children) => {
                children.iter().any(SqlExpr::nullable)
            }
        }
    }

    pub fn is_const(&self) -> Option<bool> {
        match self {
            SqlExpr::Const(b) => Some(*b),
            _ => None,
        }
    }

    /// Flattens the tree into WHERE-clause text and ordered arguments
    pub fn compile(&self) -> CompiledFragment {
        let mut sql = String::new();
        let mut args = Vec::new();
        self.render(&mut sql, &mut args);
        CompiledFragment { sql, args }
    }

    fn render(&self, sql: &mut String, args: &mut Vec<SqlValue>) {
        match self {
            SqlExpr::Const(true) => sql.push_str("1=1"),
            SqlExpr::Const(false) => sql.push_str("1=0"),
            SqlExpr::Leaf { sql: text, args: leaf_args, .. } => {
                sql.push_str(text);
                args.extend(leaf_args.iter().cloned());
            }
            SqlExpr::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" AND ");
                    }
                    child.render(sql, args);
                }
            }
            SqlExpr::Or(children) => {
                sql.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" OR ");
                    }
                    sql.push('(');
                    child.render(sql, args);
                    sql.push(')');
                }
                sql.push(')');
            }
            SqlExpr::Not(inner) => {
                if inner.nullable() {
                    sql.push_str("NOT COALESCE(");
                    inner.render(sql, args);
                    sql.push_str(", 0)");
                } else {
                    sql.push_str("NOT (");
                    inner.render(sql, args);
                    sql.push(')');
                }
            }
        }
    }
}
