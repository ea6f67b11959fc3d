//! Schema type definitions and the schema inspector
//!
//! Supported declared types:
//! - string, number, boolean, null: scalar leaves
//! - object: nested object with its own field schema
//! - array: array with a declared item type
//! - unknown: no type information (the compiler adds runtime type guards)
//!
//! A `SchemaInfo` is read-only input to the compiler. Its `version` is part of
//! every cache key, so a migration must produce a new version instead of
//! mutating a schema in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::errors::{SchemaError, SchemaResult};

/// Declared field types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 string
    String,
    /// Integer or floating point number
    Number,
    /// Boolean
    Boolean,
    /// Always null
    Null,
    /// No declared type
    Unknown,
    /// Nested object with its own field schema
    Object {
        /// Nested field definitions
        #[serde(default)]
        fields: BTreeMap<String, FieldDef>,
    },
    /// Array with a single declared item type
    Array {
        /// Item type (boxed to allow recursive types)
        #[serde(default = "unknown_items")]
        items: Box<FieldType>,
    },
}

fn unknown_items() -> Box<FieldType> {
    Box::new(FieldType::Unknown)
}

impl FieldType {
    /// Returns the type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Null => "null",
            FieldType::Unknown => "unknown",
            FieldType::Object { .. } => "object",
            FieldType::Array { .. } => "array",
        }
    }

    /// Array type with the given item type
    pub fn array_of(items: FieldType) -> Self {
        FieldType::Array {
            items: Box::new(items),
        }
    }

    /// Object type with the given nested fields
    pub fn object_of(fields: impl IntoIterator<Item = (impl Into<String>, FieldDef)>) -> Self {
        FieldType::Object {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array { .. })
    }

    /// Item type when this is an array
    pub fn items(&self) -> Option<&FieldType> {
        match self {
            FieldType::Array { items } => Some(items),
            _ => None,
        }
    }

    /// Checks whether a value conforms to this type.
    ///
    /// Null is accepted for every type; requiredness is checked by the owner.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match (self, value) {
            (FieldType::Unknown, _) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Object { fields }, Value::Object(map)) => fields_accept(fields, map),
            (FieldType::Array { items }, Value::Array(values)) => values
                .iter()
                .all(|v| !v.is_null() || matches!(**items, FieldType::Null | FieldType::Unknown))
                && values.iter().all(|v| items.accepts(v)),
            _ => false,
        }
    }
}

fn fields_accept(fields: &BTreeMap<String, FieldDef>, map: &serde_json::Map<String, Value>) -> bool {
    fields.iter().all(|(name, def)| match map.get(name) {
        Some(v) => def.field_type.accepts(v),
        None => !def.required,
    })
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field data type
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Whether field must be present
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
        }
    }

    pub fn required_string() -> Self {
        Self::required(FieldType::String)
    }

    pub fn optional_string() -> Self {
        Self::optional(FieldType::String)
    }

    pub fn required_number() -> Self {
        Self::required(FieldType::Number)
    }

    pub fn optional_number() -> Self {
        Self::optional(FieldType::Number)
    }

    pub fn optional_boolean() -> Self {
        Self::optional(FieldType::Boolean)
    }

    pub fn optional_array(items: FieldType) -> Self {
        Self::optional(FieldType::array_of(items))
    }
}

/// Kind of index available on a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Plain index over the raw value
    #[default]
    Plain,
    /// Expression index over `lower(value)`
    Lowercase,
}

/// An index over a single (possibly dotted) field path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub field: String,
    #[serde(default)]
    pub kind: IndexKind,
}

impl IndexDef {
    pub fn plain(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IndexKind::Plain,
        }
    }

    pub fn lowercase(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IndexKind::Lowercase,
        }
    }
}

/// Schema information for one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    /// Monotonic schema version
    #[serde(default)]
    pub version: u64,
    /// Top-level field definitions
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
    /// Indexes available to the store
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
}

impl SchemaInfo {
    /// Creates an empty schema at the given version
    pub fn new(version: u64) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Adds a field definition
    pub fn with_field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    /// Adds an index
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Parses a schema from JSON text and validates its structure
    pub fn from_json_str(text: &str) -> SchemaResult<Self> {
        let schema: SchemaInfo = serde_json::from_str(text)
            .map_err(|e| SchemaError::malformed("<inline>", format!("Invalid JSON: {}", e)))?;
        schema.validate_structure()?;
        Ok(schema)
    }

    /// Returns the same schema at the next version.
    pub fn migrated(&self) -> Self {
        Self {
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Resolves the declared type of a field path.
    ///
    /// Object types are entered by key; array types are entered only by a
    /// numeric segment. Anything else is undeclared (`None`).
    pub(crate) fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Option<&FieldType> {
        let (first, rest) = path.split_first()?;
        let mut current = &self.fields.get(first.as_ref())?.field_type;
        for segment in rest {
            let segment = segment.as_ref();
            current = match current {
                FieldType::Object { fields } => &fields.get(segment)?.field_type,
                FieldType::Array { items } if is_index_segment(segment) => items,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Checks whether a top-level field is declared required
    pub fn is_required<S: AsRef<str>>(&self, path: &[S]) -> bool {
        match path {
            [only] => self
                .fields
                .get(only.as_ref())
                .map_or(false, |def| def.required),
            _ => false,
        }
    }

    /// Checks whether an index of the given kind covers the dotted path
    pub fn has_index(&self, dotted: &str, kind: IndexKind) -> bool {
        self.indexes
            .iter()
            .any(|idx| idx.kind == kind && idx.field == dotted)
    }

    /// Validates the schema structure itself (not a document)
    pub fn validate_structure(&self) -> SchemaResult<()> {
        for index in &self.indexes {
            let path: Vec<&str> = index.field.split('.').collect();
            let declared = self.resolve(&path).ok_or_else(|| {
                SchemaError::invalid(format!(
                    "Index on undeclared field '{}'",
                    index.field
                ))
            })?;
            if index.kind == IndexKind::Lowercase && *declared != FieldType::String {
                return Err(SchemaError::invalid(format!(
                    "Lowercase index on non-string field '{}' ({})",
                    index.field,
                    declared.type_name()
                )));
            }
        }
        Ok(())
    }

    /// Checks a document against the declared fields.
    ///
    /// Undeclared fields are allowed; declared fields must match their type
    /// and required fields must be present.
    pub fn conforms(&self, document: &Value) -> bool {
        match document.as_object() {
            Some(map) => fields_accept(&self.fields, map),
            None => false,
        }
    }
}

/// Returns true for path segments that address an array position
pub fn is_index_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.len() <= 9 && segment.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> SchemaInfo {
        SchemaInfo::new(1)
            .with_field("name", FieldDef::required_string())
            .with_field("age", FieldDef::optional_number())
            .with_field("tags", FieldDef::optional_array(FieldType::String))
            .with_field(
                "address",
                FieldDef::optional(FieldType::object_of([(
                    "city",
                    FieldDef::optional_string(),
                )])),
            )
            .with_index(IndexDef::lowercase("name"))
    }

    #[test]
    fn test_resolve_nested_paths() {
        let schema = sample_schema();
        assert_eq!(schema.resolve(&["age"]), Some(&FieldType::Number));
        assert_eq!(schema.resolve(&["address", "city"]), Some(&FieldType::String));
        assert_eq!(schema.resolve(&["tags", "0"]), Some(&FieldType::String));
        assert_eq!(schema.resolve(&["tags", "first"]), None);
        assert_eq!(schema.resolve(&["missing"]), None);
    }

    #[test]
    fn test_array_and_required() {
        let schema = sample_schema();
        assert!(schema.resolve(&["tags"]).map_or(false, FieldType::is_array));
        assert!(!schema.resolve(&["name"]).map_or(false, FieldType::is_array));
        assert!(schema.is_required(&["name"]));
        assert!(!schema.is_required(&["age"]));
        assert!(!schema.is_required(&["address", "city"]));
    }

    #[test]
    fn test_index_lookup() {
        let schema = sample_schema();
        assert!(schema.has_index("name", IndexKind::Lowercase));
        assert!(!schema.has_index("name", IndexKind::Plain));
        assert!(!schema.has_index("age", IndexKind::Lowercase));
    }

    #[test]
    fn test_structure_rejects_undeclared_index() {
        let schema = sample_schema().with_index(IndexDef::plain("nope"));
        assert!(schema.validate_structure().is_err());
    }

    #[test]
    fn test_structure_rejects_lowercase_on_number() {
        let schema = sample_schema().with_index(IndexDef::lowercase("age"));
        let err = schema.validate_structure().unwrap_err();
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_conforms() {
        let schema = sample_schema();
        assert!(schema.conforms(&json!({"name": "a", "age": 3, "tags": ["x"]})));
        assert!(schema.conforms(&json!({"name": "a", "extra": [1, {"b": 2}]})));
        assert!(schema.conforms(&json!({"name": null})));
        assert!(!schema.conforms(&json!({"age": 3})));
        assert!(!schema.conforms(&json!({"name": "a", "age": "3"})));
        assert!(!schema.conforms(&json!({"name": "a", "tags": [1]})));
        assert!(!schema.conforms(&json!({"name": "a", "tags": [null]})));
        assert!(!schema.conforms(&json!({"name": "a", "address": {"city": 5}})));
        assert!(!schema.conforms(&json!([1, 2])));
    }

    #[test]
    fn test_schema_json_round_trip_shape() {
        let text = r#"{
            "version": 3,
            "fields": {
                "name": {"type": "string", "required": true},
                "tags": {"type": "array", "items": {"type": "string"}},
                "meta": {"type": "object", "fields": {"score": {"type": "number"}}}
            },
            "indexes": [{"field": "name", "kind": "lowercase"}, {"field": "meta.score"}]
        }"#;
        let schema = SchemaInfo::from_json_str(text).unwrap();
        assert_eq!(schema.version, 3);
        assert!(schema.resolve(&["tags"]).map_or(false, FieldType::is_array));
        assert_eq!(schema.resolve(&["meta", "score"]), Some(&FieldType::Number));
        assert!(schema.has_index("meta.score", IndexKind::Plain));
    }

    #[test]
    fn test_migrated_bumps_version() {
        let schema = sample_schema();
        let next = schema.migrated();
        assert_eq!(next.version, 2);
        assert_eq!(next.fields, schema.fields);
    }

    #[test]
    fn test_index_segment() {
        assert!(is_index_segment("0"));
        assert!(is_index_segment("12"));
        assert!(!is_index_segment(""));
        assert!(!is_index_segment("1a"));
        assert!(!is_index_segment("-1"));
    }
}
