//! Change detection for field writes.

use crate::value::Value;

/// Whether assigning `new` over `old` counts as a change.
///
/// Containers compare by identity, everything else by value, with two
/// adjustments for numbers: two NaNs are the same (otherwise a NaN field
/// would notify on every write), while `0.0` and `-0.0` are different.
///
/// ```
/// use vigil_core::equality::has_changed;
/// use vigil_core::Value;
///
/// assert!(!has_changed(&Value::from(f64::NAN), &Value::from(f64::NAN)));
/// assert!(has_changed(&Value::from(0.0), &Value::from(-0.0)));
/// assert!(!has_changed(&Value::from("a"), &Value::from("a")));
/// ```
pub fn has_changed(old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::Number(a), Value::Number(b)) => {
            if a == b {
                *a == 0.0 && a.is_sign_negative() != b.is_sign_negative()
            } else {
                !(a.is_nan() && b.is_nan())
            }
        }
        _ => old != new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{List, Record};

    #[test]
    fn numbers() {
        assert!(!has_changed(&Value::from(1), &Value::from(1.0)));
        assert!(has_changed(&Value::from(1), &Value::from(2)));
        assert!(has_changed(&Value::from(f64::NAN), &Value::from(1)));
        assert!(has_changed(&Value::from(-0.0), &Value::from(0.0)));
        assert!(!has_changed(&Value::from(-0.0), &Value::from(-0.0)));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Record::new();
        let b = Record::new();
        assert!(!has_changed(&Value::from(a.clone()), &Value::from(a.clone())));
        assert!(has_changed(&Value::from(a), &Value::from(b)));

        let list = List::new();
        assert!(!has_changed(&Value::from(list.clone()), &Value::from(list)));
    }

    #[test]
    fn mixed_kinds_differ() {
        assert!(has_changed(&Value::Null, &Value::Undefined));
        assert!(has_changed(&Value::from(0), &Value::from(false)));
        assert!(has_changed(&Value::from("1"), &Value::from(1)));
    }
}
