//! Selector parser
//!
//! Parsing is total: any JSON value yields a `Selector`. Malformed pieces
//! become constants so that both the SQL compiler and the in-memory matcher
//! agree on them without a separate error path.
//!
//! Normalization rules:
//! - `{}` matches everything; a non-object selector matches nothing
//! - `$and: []` is true, `$or: []` is false, `$nor: []` is true
//! - a logical operator with a non-array operand is false
//! - unknown `$` keys are false
//! - an operator map mixing `$` and plain keys is false for the plain keys
//! - `$options` without a sibling `$regex` is ignored

use serde_json::{Map, Value};

use super::ast::{CmpOp, ElemMatch, FieldOp, FieldPath, RegexSpec, Selector, TypeTag};

/// Parses a selector document
pub fn parse_selector(value: &Value) -> Selector {
    match value {
        Value::Object(map) => parse_document(map),
        _ => Selector::Const(false),
    }
}

impl Selector {
    pub fn parse(value: &Value) -> Self {
        parse_selector(value)
    }
}

fn parse_document(map: &Map<String, Value>) -> Selector {
    let children = map
        .iter()
        .map(|(key, operand)| parse_entry(key, operand))
        .collect();
    Selector::and(children)
}

fn parse_entry(key: &str, operand: &Value) -> Selector {
    match key {
        "$and" => match logical_children(operand) {
            Some(children) => Selector::and(children),
            None => Selector::Const(false),
        },
        "$or" => match logical_children(operand) {
            Some(children) if children.is_empty() => Selector::Const(false),
            Some(children) => Selector::Or(children),
            None => Selector::Const(false),
        },
        "$nor" => match logical_children(operand) {
            Some(children) if children.is_empty() => Selector::Const(true),
            Some(children) => Selector::Nor(children),
            None => Selector::Const(false),
        },
        // Top-level negation of a whole sub-selector
        "$not" => match operand {
            Value::Object(inner) if !inner.is_empty() => {
                Selector::Nor(vec![parse_document(inner)])
            }
            _ => Selector::Const(false),
        },
        _ if key.starts_with('$') => Selector::Const(false),
        _ => Selector::Field {
            path: FieldPath::parse(key),
            ops: parse_field_operand(operand),
        },
    }
}

fn logical_children(operand: &Value) -> Option<Vec<Selector>> {
    match operand {
        Value::Array(items) => Some(items.iter().map(parse_selector).collect()),
        _ => None,
    }
}

/// True when the map is an operator map (`{ $gt: 1, ... }`)
pub fn is_operator_map(map: &Map<String, Value>) -> bool {
    map.keys().any(|k| k.starts_with('$'))
}

/// Parses the value given for a field: a literal (implicit `$eq`) or an
/// operator map. Always returns at least one operator.
pub fn parse_field_operand(operand: &Value) -> Vec<FieldOp> {
    match operand {
        Value::Object(map) if map.is_empty() => vec![FieldOp::Never],
        Value::Object(map) if is_operator_map(map) => parse_operator_map(map),
        literal => vec![FieldOp::Eq(literal.clone())],
    }
}

fn parse_operator_map(map: &Map<String, Value>) -> Vec<FieldOp> {
    let options = map.get("$options").and_then(Value::as_str).unwrap_or("");

    let mut ops: Vec<FieldOp> = map
        .iter()
        .filter(|(key, _)| key.as_str() != "$options")
        .map(|(key, operand)| parse_operator(key, operand, options))
        .collect();

    if ops.is_empty() {
        ops.push(FieldOp::Never);
    }
    ops
}

fn parse_operator(key: &str, operand: &Value, options: &str) -> FieldOp {
    match key {
        "$eq" => FieldOp::Eq(operand.clone()),
        "$ne" => FieldOp::Ne(operand.clone()),
        "$gt" => FieldOp::Cmp(CmpOp::Gt, operand.clone()),
        "$gte" => FieldOp::Cmp(CmpOp::Gte, operand.clone()),
        "$lt" => FieldOp::Cmp(CmpOp::Lt, operand.clone()),
        "$lte" => FieldOp::Cmp(CmpOp::Lte, operand.clone()),
        "$in" => match operand {
            Value::Array(values) => FieldOp::In(values.clone()),
            _ => FieldOp::Never,
        },
        "$nin" => match operand {
            Value::Array(values) => FieldOp::Nin(values.clone()),
            _ => FieldOp::Never,
        },
        "$exists" => FieldOp::Exists(truthy(operand)),
        "$type" => parse_type(operand),
        "$size" => match operand {
            Value::Number(n) => FieldOp::Size(n.clone()),
            _ => FieldOp::Never,
        },
        "$mod" => parse_mod(operand),
        "$regex" => match operand {
            Value::String(pattern) => RegexSpec::new(pattern, options)
                .map(FieldOp::Regex)
                .unwrap_or(FieldOp::Never),
            _ => FieldOp::Never,
        },
        "$elemMatch" => parse_elem_match(operand),
        "$not" => match operand {
            Value::Object(inner) if !inner.is_empty() && inner.keys().all(|k| k.starts_with('$')) => {
                FieldOp::Not(parse_operator_map(inner))
            }
            _ => FieldOp::Never,
        },
        // Unknown operators and plain keys mixed into an operator map
        _ => FieldOp::Never,
    }
}

/// Truthiness of an `$exists` operand
fn truthy(operand: &Value) -> bool {
    match operand {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn parse_type(operand: &Value) -> FieldOp {
    let entries: Vec<&Value> = match operand {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    let mut tags: Vec<TypeTag> = entries
        .into_iter()
        .filter_map(TypeTag::resolve)
        .flat_map(|tags| tags.iter().copied())
        .collect();
    tags.sort_unstable();
    tags.dedup();

    if tags.is_empty() {
        FieldOp::Never
    } else {
        FieldOp::Type(tags)
    }
}

fn parse_mod(operand: &Value) -> FieldOp {
    let parts = match operand.as_array() {
        Some(parts) if parts.len() == 2 => parts,
        _ => return FieldOp::Never,
    };
    let (divisor, remainder) = match (parts[0].as_f64(), parts[1].as_f64()) {
        (Some(d), Some(r)) if d.is_finite() && r.is_finite() => (d.trunc() as i64, r.trunc() as i64),
        _ => return FieldOp::Never,
    };
    if divisor == 0 {
        return FieldOp::Never;
    }
    FieldOp::Mod {
        divisor,
        remainder,
    }
}

fn parse_elem_match(operand: &Value) -> FieldOp {
    let map = match operand {
        Value::Object(map) if map.is_empty() => return FieldOp::Never,
        Value::Object(map) => map,
        other => return FieldOp::ElemMatch(ElemMatch::Unsupported(other.clone())),
    };

    let logical = |k: &String| matches!(k.as_str(), "$and" | "$or" | "$nor");
    if map.keys().all(|k| k.starts_with('$')) && !map.keys().any(logical) {
        FieldOp::ElemMatch(ElemMatch::Ops(parse_operator_map(map)))
    } else {
        FieldOp::ElemMatch(ElemMatch::Document(Box::new(parse_document(map))))
    }
}
