//! Selector subsystem
//!
//! Parses MongoDB-style selector documents into a normalized tree that the
//! SQL compiler and the in-memory matcher share.

mod ast;
mod parse;

pub use ast::{CmpOp, ElemMatch, FieldOp, FieldPath, RegexSpec, Selector, TypeTag};
pub use parse::{is_operator_map, parse_field_operand, parse_selector};

use serde_json::Value;

/// Canonical cache key of a selector document.
///
/// Object keys serialize in sorted order, so selectors that differ only in
/// key order share a key.
pub fn canonical_key(selector: &Value) -> String {
    serde_json::to_string(selector).unwrap_or_default()
}
