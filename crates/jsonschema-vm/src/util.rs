//! Value helpers shared by the compiler and the evaluator.

use std::cmp::Ordering;

use jsonschema_vm_pointer::{Pointer, Token};
use serde_json::Value;

/// Numeric comparison across the integer/real split.
///
/// Returns `None` when either value is not a number.
pub fn compare_numbers(left: &Value, right: &Value) -> Option<Ordering> {
    let (left, right) = match (left, right) {
        (Value::Number(left), Value::Number(right)) => (left, right),
        _ => return None,
    };

    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (left.as_u64(), right.as_u64()) {
        return Some(a.cmp(&b));
    }

    left.as_f64()?.partial_cmp(&right.as_f64()?)
}

/// Whether `value` is an integer multiple of `divisor`.
pub fn is_multiple_of(value: &Value, divisor: &Value) -> bool {
    if let (Some(a), Some(b)) = (value.as_i64(), divisor.as_i64()) {
        if b != 0 {
            return a % b == 0;
        }
    }

    match (value.as_f64(), divisor.as_f64()) {
        (Some(a), Some(b)) if b != 0.0 => {
            let quotient = a / b;
            (quotient - quotient.round()).abs() < f64::EPSILON * quotient.abs().max(1.0)
        }
        _ => false,
    }
}

/// JSON equality with numbers compared by value, so `1`, `1.0`, and `1e0`
/// are all the same element. Everything else is structural.
pub fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => {
            compare_numbers(left, right) == Some(Ordering::Equal)
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len() && left.iter().zip(right).all(|(a, b)| equal(a, b))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .all(|(key, a)| right.get(key).is_some_and(|b| equal(a, b)))
        }
        _ => left == right,
    }
}

/// Structural lookup of a pointer inside a document.
///
/// Property tokens address object members; index tokens address array
/// elements. A property token consisting of digits also addresses an array
/// element, which is how parsed `$ref` fragments reach into arrays.
pub fn get<'a>(document: &'a Value, path: &Pointer) -> Option<&'a Value> {
    let mut current = document;
    for token in path.tokens() {
        current = match (current, token) {
            (Value::Object(map), Token::Property(name)) => map.get(name)?,
            (Value::Array(items), Token::Index(index)) => items.get(*index)?,
            (Value::Array(items), Token::Property(name)) => {
                items.get(name.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonschema_vm_pointer::pointer;
    use serde_json::json;

    #[test]
    fn test_compare_numbers() {
        assert_eq!(compare_numbers(&json!(1), &json!(1.0)), Some(Ordering::Equal));
        assert_eq!(compare_numbers(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare_numbers(&json!(2.5), &json!(2)), Some(Ordering::Greater));
        assert_eq!(compare_numbers(&json!("2"), &json!(2)), None);
    }

    #[test]
    fn test_is_multiple_of() {
        assert!(is_multiple_of(&json!(10), &json!(5)));
        assert!(is_multiple_of(&json!(4.5), &json!(1.5)));
        assert!(!is_multiple_of(&json!(10), &json!(3)));
        assert!(!is_multiple_of(&json!(10), &json!(0)));
    }

    #[test]
    fn test_equal_numbers_and_containers() {
        assert!(equal(&json!(1), &json!(1.0)));
        assert!(equal(&json!([1, {"a": 2}]), &json!([1.0, {"a": 2.0}])));
        assert!(!equal(&json!([1]), &json!([1, 1])));
        assert!(!equal(&json!({"a": 1}), &json!({"b": 1})));
    }

    #[test]
    fn test_get() {
        let doc = json!({"a": [{"b": 1}]});
        assert_eq!(get(&doc, &pointer!["a", 0, "b"]), Some(&json!(1)));
        assert_eq!(get(&doc, &pointer!["a", "0", "b"]), Some(&json!(1)));
        assert_eq!(get(&doc, &pointer!["a", 1]), None);
        assert_eq!(get(&doc, &pointer![]), Some(&doc));
    }
}
