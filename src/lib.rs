//! docsql - MongoDB-style selectors compiled to SQL
//!
//! Translates a selector over JSON documents into a WHERE clause for a store
//! that keeps each document as JSON in one column, plus a residual selector
//! for whatever SQL cannot express. Running the SQL and then the residual
//! returns exactly the documents the in-memory matcher accepts.
//!
//! ```ignore
//! use docsql::planner::SelectorCompiler;
//! use docsql::schema::{FieldDef, SchemaInfo};
//! use serde_json::json;
//!
//! let schema = SchemaInfo::new(1).with_field("age", FieldDef::optional_number());
//! let compiler = SelectorCompiler::default();
//! let compiled = compiler.compile(&json!({"age": {"$gt": 30}}), &schema, "users");
//! assert_eq!(compiled.sql.where_sql(), "json_extract(data, '$.age') > ?");
//! ```

pub mod cache;
pub mod config;
pub mod matcher;
pub mod observability;
pub mod planner;
pub mod schema;
pub mod selector;
pub mod sql;
