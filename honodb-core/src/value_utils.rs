//! Value utility functions shared across modules
//!
//! Nested field access and the equality/ordering rules used by conditions.

use serde_json::Value;
use std::cmp::Ordering;

/// Descend one path segment: object key, or array index for numeric segments
pub fn step_into<'a>(value: &'a Value, part: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(part),
        Value::Array(arr) => part.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

/// Get nested value from JSON with dot notation support
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use honodb_core::value_utils::get_nested_value;
///
/// let doc = json!({"address": {"city": "NYC"}, "items": [{"name": "pen"}]});
/// assert_eq!(get_nested_value(&doc, "address.city"), Some(&json!("NYC")));
/// assert_eq!(get_nested_value(&doc, "items.0.name"), Some(&json!("pen")));
/// assert_eq!(get_nested_value(&doc, "address.zip"), None);
/// ```
pub fn get_nested_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    // Fast path: no dots means simple field access
    if !path.contains('.') {
        return doc.get(path);
    }

    let mut value = doc;
    for part in path.split('.') {
        value = step_into(value, part)?;
    }
    Some(value)
}

/// Structural equality where numbers compare by numeric value
///
/// `21` and `21.0` are equal; `serde_json`'s own `==` says they are not.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            if let (Some(i1), Some(i2)) = (n1.as_i64(), n2.as_i64()) {
                return i1 == i2;
            }
            if let (Some(u1), Some(u2)) = (n1.as_u64(), n2.as_u64()) {
                return u1 == u2;
            }
            match (n1.as_f64(), n2.as_f64()) {
                (Some(f1), Some(f2)) => f1 == f2,
                _ => false,
            }
        }
        (Value::Array(a1), Value::Array(a2)) => {
            a1.len() == a2.len() && a1.iter().zip(a2).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(o1), Value::Object(o2)) => {
            o1.len() == o2.len()
                && o1
                    .iter()
                    .all(|(k, v)| o2.get(k).map_or(false, |w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Compare two JSON values
///
/// Returns `Some(Ordering)` for numbers against numbers and strings against
/// strings, `None` for anything else.
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use honodb_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&json!(10), &json!(5)), Some(Ordering::Greater));
/// assert_eq!(compare_values(&json!("a"), &json!("b")), Some(Ordering::Less));
/// assert_eq!(compare_values(&json!("a"), &json!(1)), None);
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            if let (Some(i1), Some(i2)) = (n1.as_i64(), n2.as_i64()) {
                return Some(i1.cmp(&i2));
            }
            let f1 = n1.as_f64()?;
            let f2 = n2.as_f64()?;
            f1.partial_cmp(&f2)
        }
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        _ => None,
    }
}
