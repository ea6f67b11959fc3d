//! Bound SQL values and compiled fragments

use std::fmt;

use serde::Serialize;
use serde_json::{Number, Value};

/// A positional argument bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Converts a JSON number, keeping integers exact when they fit in i64
    pub fn from_number(n: &Number) -> Self {
        match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        SqlValue::Text(s.into())
    }

    /// JSON form of the value (used for explain output)
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::from(*i),
            SqlValue::Real(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            SqlValue::Text(s) => Value::from(s.clone()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// WHERE-clause text with its positional arguments.
///
/// `args.len()` always equals the number of `?` placeholders in `sql`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledFragment {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl CompiledFragment {
    pub fn new(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Number of placeholders in the SQL text
    pub fn placeholder_count(&self) -> usize {
        placeholder_count(&self.sql)
    }
}

/// Counts `?` placeholders outside of single-quoted literals
pub fn placeholder_count(sql: &str) -> usize {
    let mut in_literal = false;
    let mut count = 0;
    for c in sql.chars() {
        match c {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }
    count
}
