//! In-memory selector matcher
//!
//! Evaluates a `Selector` directly over a JSON document with the same
//! operator semantics the SQL compiler encodes. Used for residual predicates
//! after SQL filtering, and as the reference for differential tests.
//!
//! Deterministic and side-effect free: the same document and selector always
//! give the same answer.

mod compare;
mod filter;

pub use compare::{compare_numbers, compare_values, lookup, values_equal};
pub use filter::DocumentFilter;

use serde_json::Value;

use crate::selector::{parse_selector, Selector};

/// Checks if a document matches a parsed selector
pub fn matches(selector: &Selector, document: &Value) -> bool {
    DocumentFilter::matches(document, selector)
}

/// Parses a selector document and checks a document against it
pub fn matches_json(selector: &Value, document: &Value) -> bool {
    matches(&parse_selector(selector), document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_json() {
        let doc = json!({"name": "Alice", "age": 30});
        assert!(matches_json(&json!({"age": {"$gte": 18}}), &doc));
        assert!(!matches_json(&json!({"age": {"$gte": 31}}), &doc));
    }

    #[test]
    fn test_filter_many_documents() {
        let docs = vec![
            json!({"status": "active", "age": 20}),
            json!({"status": "inactive", "age": 40}),
            json!({"status": "active", "age": 50}),
        ];
        let selector = parse_selector(&json!({"status": "active", "age": {"$gt": 30}}));
        let hits: Vec<_> = docs.iter().filter(|d| matches(&selector, d)).collect();
        assert_eq!(hits, vec![&docs[2]]);
    }
}
