//! Selector evaluation over documents
//!
//! An operator holds for a field when it holds for one of the field's
//! candidates: the value itself and, when the value is an array, each of
//! its direct elements. Operators that inspect the whole value (`$exists`,
//! `$size`, `$elemMatch`) look at the value only.

use serde_json::{Number, Value};

use crate::selector::{CmpOp, ElemMatch, FieldOp, RegexSpec, Selector, TypeTag};

use super::compare::{compare_values, lookup, values_equal};

/// Evaluates selectors against documents
pub struct DocumentFilter;

impl DocumentFilter {
    /// Checks if a document matches a selector
    pub fn matches(document: &Value, selector: &Selector) -> bool {
        match selector {
            Selector::Const(result) => *result,
            Selector::And(children) => children.iter().all(|c| Self::matches(document, c)),
            Selector::Or(children) => children.iter().any(|c| Self::matches(document, c)),
            Selector::Nor(children) => !children.iter().any(|c| Self::matches(document, c)),
            Selector::Field { path, ops } => {
                let value = lookup(document, path.segments());
                Self::all_ops(value, ops)
            }
        }
    }

    /// Checks a field value (`None` when missing) against AND-ed operators
    pub fn all_ops(value: Option<&Value>, ops: &[FieldOp]) -> bool {
        ops.iter().all(|op| Self::op_matches(value, op))
    }

    /// Checks a field value against a single operator
    pub fn op_matches(value: Option<&Value>, op: &FieldOp) -> bool {
        match op {
            FieldOp::Eq(expected) => eq_match(value, expected),
            FieldOp::Ne(expected) => !eq_match(value, expected),
            FieldOp::Cmp(cmp, bound) => any_candidate(value, |c| cmp_match(c, *cmp, bound)),
            FieldOp::In(values) => in_match(value, values),
            FieldOp::Nin(values) => !in_match(value, values),
            FieldOp::Exists(expected) => value.is_some() == *expected,
            FieldOp::Type(tags) => any_candidate(value, |c| tags.contains(&TypeTag::of(c))),
            FieldOp::Size(n) => size_match(value, n),
            FieldOp::Mod {
                divisor,
                remainder,
            } => any_candidate(value, |c| mod_match(c, *divisor, *remainder)),
            FieldOp::Regex(spec) => any_candidate(value, |c| regex_match(c, spec)),
            FieldOp::ElemMatch(criteria) => elem_match(value, criteria),
            FieldOp::Not(ops) => !Self::all_ops(value, ops),
            FieldOp::Never => false,
        }
    }
}

/// True when `pred` holds for the value or one of its direct elements
fn any_candidate(value: Option<&Value>, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        None => false,
        Some(v) => pred(v) || v.as_array().map_or(false, |items| items.iter().any(|c| pred(c))),
    }
}

fn eq_match(value: Option<&Value>, expected: &Value) -> bool {
    match expected {
        // Missing, null, or an array holding null
        Value::Null => match value {
            None | Some(Value::Null) => true,
            Some(Value::Array(items)) => items.iter().any(Value::is_null),
            Some(_) => false,
        },
        _ => any_candidate(value, |c| values_equal(c, expected)),
    }
}

fn in_match(value: Option<&Value>, values: &[Value]) -> bool {
    values.iter().any(|expected| eq_match(value, expected))
}

fn cmp_match(candidate: &Value, op: CmpOp, bound: &Value) -> bool {
    compare_values(candidate, bound).map_or(false, |ordering| op.holds(ordering))
}

fn size_match(value: Option<&Value>, n: &Number) -> bool {
    match value {
        Some(Value::Array(items)) => match (n.as_u64(), n.as_f64()) {
            (Some(len), _) => items.len() as u64 == len,
            (None, Some(len)) => items.len() as f64 == len,
            _ => false,
        },
        _ => false,
    }
}

/// `value - trunc(value / divisor) * divisor == remainder`
fn mod_match(candidate: &Value, divisor: i64, remainder: i64) -> bool {
    let n = match candidate {
        Value::Number(n) => n,
        _ => return false,
    };
    if let Some(v) = n.as_i64() {
        return v.checked_rem(divisor) == Some(remainder);
    }
    match n.as_f64() {
        Some(v) => {
            let d = divisor as f64;
            v - (v / d).trunc() * d == remainder as f64
        }
        None => false,
    }
}

fn regex_match(candidate: &Value, spec: &RegexSpec) -> bool {
    match candidate {
        Value::String(text) => spec.is_match(text),
        _ => false,
    }
}

fn elem_match(value: Option<&Value>, criteria: &ElemMatch) -> bool {
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return false,
    };
    items.iter().any(|element| match criteria {
        ElemMatch::Ops(ops) => DocumentFilter::all_ops(Some(element), ops),
        ElemMatch::Document(selector) => DocumentFilter::matches(element, selector),
        ElemMatch::Unsupported(_) => false,
    })
}
