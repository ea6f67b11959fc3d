//! Query structures
//!
//! A query is a selector plus the result shaping the caller asked for:
//! sort keys, skip and limit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::selector::FieldPath;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Dotted field path
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn path(&self) -> FieldPath {
        FieldPath::parse(&self.field)
    }
}

/// A find request against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Target collection name
    pub collection: String,
    /// Selector document
    pub selector: Value,
    /// Sort keys, most significant first
    pub sort: Vec<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new(collection: impl Into<String>, selector: Value) -> Self {
        Self {
            collection: collection.into(),
            selector,
            sort: Vec::new(),
            skip: None,
            limit: None,
        }
    }

    /// Adds a sort key
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when skip or limit is set
    pub fn is_paginated(&self) -> bool {
        self.skip.is_some() || self.limit.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_builder() {
        let query = Query::new("users", json!({"age": {"$gt": 30}}))
            .with_sort(SortSpec::desc("age"))
            .with_sort(SortSpec::asc("name"))
            .with_skip(10)
            .with_limit(5);

        assert_eq!(query.collection, "users");
        assert_eq!(query.sort.len(), 2);
        assert_eq!(query.sort[0].direction, SortDirection::Desc);
        assert_eq!(query.skip, Some(10));
        assert_eq!(query.limit, Some(5));
        assert!(query.is_paginated());
    }

    #[test]
    fn test_unpaginated() {
        assert!(!Query::new("users", json!({})).is_paginated());
    }

    #[test]
    fn test_sort_spec() {
        let asc = SortSpec::asc("address.city");
        assert_eq!(asc.direction.sql(), "ASC");
        assert_eq!(asc.path().segments(), &["address".to_string(), "city".to_string()]);
    }
}
