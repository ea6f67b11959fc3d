//! Normalized selector tree
//!
//! The parser turns an arbitrary JSON selector into this tree. Every
//! malformed fragment has already been resolved to a constant here, so the
//! compiler and the matcher only ever see well-formed operators.

use std::fmt;

use regex::Regex;
use serde_json::{Map, Number, Value};

/// Dotted field path split into segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Splits a dotted path (`a.b.0`) into segments
    pub fn parse(dotted: &str) -> Self {
        Self {
            segments: dotted.split('.').map(str::to_string).collect(),
        }
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The path joined back with dots
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// Ordered comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    /// Operator key in selector syntax
    pub fn key(&self) -> &'static str {
        match self {
            CmpOp::Gt => "$gt",
            CmpOp::Gte => "$gte",
            CmpOp::Lt => "$lt",
            CmpOp::Lte => "$lte",
        }
    }

    /// SQL comparison operator
    pub fn sql(&self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
        }
    }

    /// Applies the operator to an ordering of `actual` relative to `bound`
    pub fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Gt => ordering == Greater,
            CmpOp::Gte => ordering != Less,
            CmpOp::Lt => ordering == Less,
            CmpOp::Lte => ordering != Greater,
        }
    }
}

/// Value type tags accepted by `$type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    String,
    Integer,
    Real,
    Boolean,
    Array,
    Object,
    Null,
}

impl TypeTag {
    /// Resolves a `$type` operand entry (alias name or numeric code).
    ///
    /// Returns `None` for unknown literals.
    pub fn resolve(operand: &Value) -> Option<&'static [TypeTag]> {
        const NUMBER: &[TypeTag] = &[TypeTag::Integer, TypeTag::Real];
        match operand {
            Value::String(name) => match name.as_str() {
                "string" => Some(&[TypeTag::String]),
                "number" | "decimal" => Some(NUMBER),
                "int" | "long" => Some(&[TypeTag::Integer]),
                "double" => Some(&[TypeTag::Real]),
                "bool" | "boolean" => Some(&[TypeTag::Boolean]),
                "array" => Some(&[TypeTag::Array]),
                "object" => Some(&[TypeTag::Object]),
                "null" => Some(&[TypeTag::Null]),
                _ => None,
            },
            Value::Number(code) => match code.as_i64()? {
                1 => Some(&[TypeTag::Real]),
                2 => Some(&[TypeTag::String]),
                3 => Some(&[TypeTag::Object]),
                4 => Some(&[TypeTag::Array]),
                8 => Some(&[TypeTag::Boolean]),
                10 => Some(&[TypeTag::Null]),
                16 | 18 => Some(&[TypeTag::Integer]),
                19 => Some(NUMBER),
                _ => None,
            },
            _ => None,
        }
    }

    /// Tag of a JSON value
    pub fn of(value: &Value) -> TypeTag {
        match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(n) if n.is_f64() => TypeTag::Real,
            Value::Number(_) => TypeTag::Integer,
            Value::String(_) => TypeTag::String,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
        }
    }

    /// Names reported by the store's `json_type` for this tag
    pub fn sql_names(&self) -> &'static [&'static str] {
        match self {
            TypeTag::String => &["text"],
            TypeTag::Integer => &["integer"],
            TypeTag::Real => &["real"],
            TypeTag::Boolean => &["true", "false"],
            TypeTag::Array => &["array"],
            TypeTag::Object => &["object"],
            TypeTag::Null => &["null"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Integer => "int",
            TypeTag::Real => "double",
            TypeTag::Boolean => "bool",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Null => "null",
        }
    }
}

/// A compiled `$regex` operand with its options
#[derive(Debug, Clone)]
pub struct RegexSpec {
    pub pattern: String,
    pub options: String,
    pub compiled: Regex,
}

impl RegexSpec {
    /// Builds the regex; `None` when the pattern does not compile.
    ///
    /// Options: `i` case-insensitive, `m` multi-line, `s` dot matches
    /// newline, `x` extended whitespace. Other letters are ignored.
    pub fn new(pattern: &str, options: &str) -> Option<Self> {
        let compiled = regex::RegexBuilder::new(pattern)
            .case_insensitive(options.contains('i'))
            .multi_line(options.contains('m'))
            .dot_matches_new_line(options.contains('s'))
            .ignore_whitespace(options.contains('x'))
            .build()
            .ok()?;
        Some(Self {
            pattern: pattern.to_string(),
            options: options.to_string(),
            compiled,
        })
    }

    pub fn case_insensitive(&self) -> bool {
        self.options.contains('i')
    }

    /// True when an option other than `i` changes matching semantics
    pub fn has_semantic_flags(&self) -> bool {
        self.options.contains(&['m', 's', 'x'][..])
    }

    /// Normalized flag string (sorted, semantic flags only)
    pub fn flags(&self) -> String {
        let mut flags: Vec<char> = self
            .options
            .chars()
            .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
            .collect();
        flags.sort_unstable();
        flags.dedup();
        flags.into_iter().collect()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }
}

impl PartialEq for RegexSpec {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.flags() == other.flags()
    }
}

/// `$elemMatch` criteria
#[derive(Debug, Clone, PartialEq)]
pub enum ElemMatch {
    /// Operators applied to each element value (`{ $gt: 3 }`)
    Ops(Vec<FieldOp>),
    /// A selector applied to each element as a document (`{ a: 1 }`)
    Document(Box<Selector>),
    /// Non-object criteria; never matches and is not pushed to SQL
    Unsupported(Value),
}

/// A single operator applied to one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Eq(Value),
    Ne(Value),
    Cmp(CmpOp, Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Type(Vec<TypeTag>),
    Size(Number),
    Mod { divisor: i64, remainder: i64 },
    Regex(RegexSpec),
    ElemMatch(ElemMatch),
    Not(Vec<FieldOp>),
    /// Impossible condition (empty operator map, malformed operand)
    Never,
}

impl FieldOp {
    /// Renders the operator as a selector operand
    pub fn to_value(&self) -> Value {
        let single = |key: &str, v: Value| {
            let mut map = Map::new();
            map.insert(key.to_string(), v);
            Value::Object(map)
        };
        match self {
            FieldOp::Eq(v) => single("$eq", v.clone()),
            FieldOp::Ne(v) => single("$ne", v.clone()),
            FieldOp::Cmp(op, v) => single(op.key(), v.clone()),
            FieldOp::In(values) => single("$in", Value::Array(values.clone())),
            FieldOp::Nin(values) => single("$nin", Value::Array(values.clone())),
            FieldOp::Exists(b) => single("$exists", Value::Bool(*b)),
            FieldOp::Type(tags) => single(
                "$type",
                Value::Array(tags.iter().map(|t| Value::from(t.name())).collect()),
            ),
            FieldOp::Size(n) => single("$size", Value::Number(n.clone())),
            FieldOp::Mod {
                divisor,
                remainder,
            } => single("$mod", Value::from(vec![*divisor, *remainder])),
            FieldOp::Regex(spec) => {
                let mut map = Map::new();
                map.insert("$regex".into(), Value::from(spec.pattern.clone()));
                if !spec.options.is_empty() {
                    map.insert("$options".into(), Value::from(spec.options.clone()));
                }
                Value::Object(map)
            }
            FieldOp::ElemMatch(ElemMatch::Ops(ops)) => single("$elemMatch", merge_ops(ops)),
            FieldOp::ElemMatch(ElemMatch::Document(sel)) => single("$elemMatch", sel.to_value()),
            FieldOp::ElemMatch(ElemMatch::Unsupported(v)) => single("$elemMatch", v.clone()),
            FieldOp::Not(ops) => single("$not", merge_ops(ops)),
            // Parses back to an operator that never matches
            FieldOp::Never => single("$in", Value::Array(Vec::new())),
        }
    }
}

/// Merges operators into one operator map.
///
/// Callers pass operators parsed from one map, so keys are unique. An
/// impossible operator makes the whole map impossible.
fn merge_ops(ops: &[FieldOp]) -> Value {
    if ops.contains(&FieldOp::Never) {
        return FieldOp::Never.to_value();
    }
    let mut map = Map::new();
    for op in ops {
        if let Value::Object(entries) = op.to_value() {
            map.extend(entries);
        }
    }
    Value::Object(map)
}

/// Normalized selector node
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Constant result (`{}` is `Const(true)`, malformed input `Const(false)`)
    Const(bool),
    And(Vec<Selector>),
    Or(Vec<Selector>),
    Nor(Vec<Selector>),
    /// Operators on one field, implicitly AND-ed; never empty
    Field { path: FieldPath, ops: Vec<FieldOp> },
}

impl Selector {
    /// Selector matching every document
    pub fn match_all() -> Self {
        Selector::Const(true)
    }

    /// Conjunction with nested conjunctions flattened
    pub fn and(children: Vec<Selector>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Selector::And(inner) => flat.extend(inner),
                Selector::Const(true) => {}
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Selector::Const(true),
            1 => flat.pop().unwrap_or(Selector::Const(true)),
            _ => Selector::And(flat),
        }
    }

    /// Single-operator field node
    pub fn field(path: &str, op: FieldOp) -> Self {
        Selector::Field {
            path: FieldPath::parse(path),
            ops: vec![op],
        }
    }

    /// Renders the selector back into selector JSON.
    ///
    /// Parsing the result yields a selector with the same semantics.
    pub fn to_value(&self) -> Value {
        let single = |key: String, v: Value| {
            let mut map = Map::new();
            map.insert(key, v);
            Value::Object(map)
        };
        let list = |children: &[Selector]| {
            Value::Array(children.iter().map(Selector::to_value).collect())
        };
        match self {
            Selector::Const(true) => Value::Object(Map::new()),
            Selector::Const(false) => single("$or".into(), Value::Array(Vec::new())),
            Selector::And(children) => single("$and".into(), list(children)),
            Selector::Or(children) => single("$or".into(), list(children)),
            Selector::Nor(children) => single("$nor".into(), list(children)),
            Selector::Field { path, ops } => {
                if let [op] = ops.as_slice() {
                    single(path.dotted(), op.to_value())
                } else {
                    let parts = ops
                        .iter()
                        .map(|op| single(path.dotted(), op.to_value()))
                        .collect();
                    single("$and".into(), Value::Array(parts))
                }
            }
        }
    }
}
