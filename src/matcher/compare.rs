//! Value comparison and path lookup
//!
//! Comparison follows the store's rules so the matcher and the generated
//! SQL agree: values only compare within their class (number with number,
//! string with string), numbers compare by value regardless of integer or
//! real representation, strings compare bytewise. An integer compared with
//! a real is compared exactly, never by rounding the integer to a real.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::schema::is_index_segment;

/// Resolves a dotted path against a document.
///
/// Object keys are looked up by name. A numeric segment addresses an array
/// position. Arrays are not traversed by name, so `tags.x` on an array is
/// missing.
pub fn lookup<'v, S: AsRef<str>>(document: &'v Value, segments: &[S]) -> Option<&'v Value> {
    let mut current = document;
    for segment in segments {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) if is_index_segment(segment) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Ordering of two numbers by value
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        (Some(x), None) => compare_int_real(x, b.as_f64()?),
        (None, Some(y)) => compare_int_real(y, a.as_f64()?).map(Ordering::reverse),
        (None, None) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

/// Exact ordering of an integer against a real
fn compare_int_real(int: i64, real: f64) -> Option<Ordering> {
    // 2^63; i64::MAX is not representable as f64
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

    if real.is_nan() {
        return None;
    }
    if real >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if real < -I64_BOUND {
        return Some(Ordering::Greater);
    }
    let whole = real.trunc();
    // In range, so the cast is exact
    let ordering = int.cmp(&(whole as i64)).then_with(|| {
        if real > whole {
            Ordering::Less
        } else if real < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
    Some(ordering)
}

/// Ordering of two values of the same comparable class.
///
/// `None` for mixed classes and for anything other than numbers and strings.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        _ => None,
    }
}

/// Deep equality with numeric equality by value (`1 == 1.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).map_or(false, |y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested() {
        let doc = json!({"address": {"city": "Oslo"}, "tags": ["a", "b"]});
        assert_eq!(lookup(&doc, &["address", "city"]), Some(&json!("Oslo")));
        assert_eq!(lookup(&doc, &["tags", "1"]), Some(&json!("b")));
        assert_eq!(lookup(&doc, &["tags", "2"]), None);
        assert_eq!(lookup(&doc, &["tags", "x"]), None);
        assert_eq!(lookup(&doc, &["address", "zip"]), None);
    }

    #[test]
    fn test_lookup_numeric_key_on_object() {
        let doc = json!({"m": {"0": true}});
        assert_eq!(lookup(&doc, &["m", "0"]), Some(&json!(true)));
    }

    #[test]
    fn test_lookup_through_scalar_is_missing() {
        let doc = json!({"age": 3});
        assert_eq!(lookup(&doc, &["age", "0"]), None);
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!(2), &json!(1.5)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(-3), &json!(2)), Some(Ordering::Less));
    }

    #[test]
    fn test_integer_and_real_compare_exactly() {
        let above = json!(9_007_199_254_740_993_i64);
        let real = json!(9_007_199_254_740_992.0);
        assert_eq!(compare_values(&above, &real), Some(Ordering::Greater));
        assert_eq!(compare_values(&real, &above), Some(Ordering::Less));
        assert!(!values_equal(&above, &real));
        assert!(values_equal(&json!(9_007_199_254_740_992_i64), &real));

        assert_eq!(compare_values(&json!(-3), &json!(-2.5)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(-2), &json!(-2.5)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(i64::MAX), &json!(9.3e18)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(i64::MIN), &json!(-9.3e18)), Some(Ordering::Greater));
    }

    #[test]
    fn test_mixed_classes_do_not_compare() {
        assert_eq!(compare_values(&json!(1), &json!("1")), None);
        assert_eq!(compare_values(&json!(true), &json!(false)), None);
        assert_eq!(compare_values(&json!(null), &json!(null)), None);
    }

    #[test]
    fn test_strings_compare_bytewise() {
        assert_eq!(compare_values(&json!("B"), &json!("a")), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("ab"), &json!("a")), Some(Ordering::Greater));
    }

    #[test]
    fn test_deep_equality() {
        assert!(values_equal(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!values_equal(&json!(1), &json!(true)));
    }
}
