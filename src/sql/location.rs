//! Field locations and SQL accessors
//!
//! A `Target` is a field path resolved against the schema: how to read its
//! value, its JSON type tag and its array elements in SQL, plus the declared
//! type the translators use to elide guards.
//!
//! Paths start either at the document root or at an element bound by an
//! enclosing `json_each` scan (`$elemMatch`). Element paths go back through
//! the document column using the element's `fullkey`, so nested scans stay
//! correlated with the outer row.

use serde::{Deserialize, Serialize};

use crate::schema::{is_index_segment, FieldType, SchemaInfo};

/// How documents are laid out in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentLayout {
    /// Whole document in one JSON column
    JsonColumn { column: String },
    /// Declared top-level string/number fields mirrored in real columns,
    /// the full document kept in `document_column`
    Columns { document_column: String },
}

impl Default for DocumentLayout {
    fn default() -> Self {
        DocumentLayout::JsonColumn {
            column: "data".to_string(),
        }
    }
}

impl DocumentLayout {
    pub fn columns(document_column: impl Into<String>) -> Self {
        DocumentLayout::Columns {
            document_column: document_column.into(),
        }
    }

    /// Column holding the JSON document
    pub fn document_column(&self) -> &str {
        match self {
            DocumentLayout::JsonColumn { column } => column,
            DocumentLayout::Columns { document_column } => document_column,
        }
    }
}

/// Where a path starts
#[derive(Debug, Clone)]
pub(crate) enum Scope<'s> {
    Root,
    /// Element of the `json_each` scan aliased `alias`
    Element { alias: String, item: &'s FieldType },
}

#[derive(Debug, Clone)]
enum Base {
    /// Document root; `path` is a JSON path literal body (`$.a[0]`)
    Root { path: String, column: Option<String> },
    /// Scan element; `suffix` is appended to its `fullkey` (`.a`, or empty)
    Element { alias: String, suffix: String },
}

/// A resolved field reference
#[derive(Debug, Clone)]
pub(crate) struct Target<'s> {
    base: Base,
    doc: String,
    pub declared: &'s FieldType,
    /// Top-level field declared required
    pub required: bool,
    /// Dotted path for index lookups (root paths only)
    pub index_path: Option<String>,
}

static UNKNOWN: FieldType = FieldType::Unknown;

impl<'s> Target<'s> {
    /// Resolves a path within a scope.
    ///
    /// Returns `None` when the path cannot be addressed safely in SQL: empty
    /// segments, keys containing quotes or backslashes, or numeric segments
    /// whose parent type is unknown.
    pub fn resolve(
        schema: &'s SchemaInfo,
        layout: &DocumentLayout,
        scope: &Scope<'s>,
        segments: &[String],
    ) -> Option<Self> {
        let doc = layout.document_column().to_string();
        match scope {
            Scope::Root => {
                let (first, rest) = segments.split_first()?;
                let mut path = String::from("$");
                push_key(&mut path, first)?;
                let mut declared = schema
                    .fields
                    .get(first)
                    .map_or(&UNKNOWN, |def| &def.field_type);
                for segment in rest {
                    declared = step(&mut path, declared, segment)?;
                }

                let column = match (layout, rest.is_empty(), declared) {
                    (DocumentLayout::Columns { .. }, true, FieldType::String | FieldType::Number) => {
                        Some(quote_identifier(first))
                    }
                    _ => None,
                };

                Some(Self {
                    base: Base::Root { path, column },
                    doc,
                    declared,
                    required: rest.is_empty() && schema.is_required(segments),
                    index_path: Some(segments.join(".")),
                })
            }
            Scope::Element { alias, item } => {
                let mut suffix = String::new();
                let mut declared: &'s FieldType = *item;
                for segment in segments {
                    declared = step(&mut suffix, declared, segment)?;
                }
                Some(Self {
                    base: Base::Element {
                        alias: alias.clone(),
                        suffix,
                    },
                    doc,
                    declared,
                    required: false,
                    index_path: None,
                })
            }
        }
    }

    /// The current scan element itself
    pub fn element(alias: &str, doc: &str, item: &'s FieldType) -> Self {
        Self {
            base: Base::Element {
                alias: alias.to_string(),
                suffix: String::new(),
            },
            doc: doc.to_string(),
            declared: item,
            required: false,
            index_path: None,
        }
    }

    pub fn doc_column(&self) -> &str {
        &self.doc
    }

    /// SQL expression for the value
    pub fn value(&self) -> String {
        match &self.base {
            Base::Root {
                column: Some(column),
                ..
            } => column.clone(),
            Base::Root { path, .. } => format!("json_extract({}, {})", self.doc, literal(path)),
            Base::Element { alias, suffix } if suffix.is_empty() => format!("{}.value", alias),
            Base::Element { .. } => format!("json_extract({}, {})", self.doc, self.path_expr()),
        }
    }

    /// SQL expression for the JSON type tag (NULL when missing)
    pub fn type_tag(&self) -> String {
        match &self.base {
            Base::Element { alias, suffix } if suffix.is_empty() => format!("{}.type", alias),
            _ => format!("json_type({}, {})", self.doc, self.path_expr()),
        }
    }

    /// Table-valued `json_each` call over the value's elements
    pub fn each(&self) -> String {
        format!("json_each({}, {})", self.doc, self.path_expr())
    }

    /// SQL expression for the array length
    pub fn array_length(&self) -> String {
        format!("json_array_length({}, {})", self.doc, self.path_expr())
    }

    /// JSON path argument: a literal at the root, `fullkey` concatenation
    /// inside a scan
    fn path_expr(&self) -> String {
        match &self.base {
            Base::Root { path, .. } => literal(path),
            Base::Element { alias, suffix } if suffix.is_empty() => format!("{}.fullkey", alias),
            Base::Element { alias, suffix } => format!("{}.fullkey || {}", alias, literal(suffix)),
        }
    }
}

/// Appends one segment below a parent of the given declared type
fn step<'s>(path: &mut String, parent: &'s FieldType, segment: &str) -> Option<&'s FieldType> {
    match parent {
        FieldType::Object { fields } => {
            push_key(path, segment)?;
            Some(fields.get(segment).map_or(&UNKNOWN, |def| &def.field_type))
        }
        FieldType::Array { items } if is_index_segment(segment) => {
            path.push('[');
            path.push_str(segment);
            path.push(']');
            Some(items)
        }
        FieldType::Unknown if is_index_segment(segment) => None,
        _ => {
            push_key(path, segment)?;
            Some(&UNKNOWN)
        }
    }
}

fn push_key(path: &mut String, key: &str) -> Option<()> {
    if key.is_empty() || key.contains(&['"', '\\'][..]) || key.chars().any(char::is_control) {
        return None;
    }
    path.push('.');
    if is_identifier(key) {
        path.push_str(key);
    } else {
        path.push('"');
        path.push_str(key);
        path.push('"');
    }
    Some(())
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Single-quoted SQL string literal
pub(crate) fn literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Column identifier, double-quoted unless it is a plain identifier
pub(crate) fn quote_identifier(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
