//! Selector-to-SQL compilation
//!
//! Target dialect: SQLite with the JSON functions (`json_extract`,
//! `json_type`, `json_each`, `json_array_length`), `?` placeholders and
//! `PRAGMA case_sensitive_like = ON`.
//!
//! Pipeline: `Selector` → `Compiler` (operator translators, regex
//! optimizer) → `SqlExpr` → splitter → `CompiledQuery`.

mod compiler;
mod fragment;
mod location;
mod regex;
mod splitter;
mod translate;
mod value;

pub use compiler::{translate, translate_operator, Compiler, Translation};
pub use fragment::SqlExpr;
pub use location::DocumentLayout;
pub use regex::{
    classify, like_escape, plan_regex, PatternClass, RegexCache, DEFAULT_REGEX_CACHE_CAPACITY,
};
pub use splitter::{compile_selector, CompiledQuery, SqlPredicate};
pub use value::{placeholder_count, CompiledFragment, SqlValue};

pub(crate) use location::{quote_identifier, Scope, Target};
