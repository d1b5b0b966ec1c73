//! Pruning, diffing and pattern matching built on the hyper-operators.
//!
//! Mismatches are reported by omission: entries that do not survive are
//! removed from the result, and a result with nothing left is `Undefined`.

use super::hyper::ZIP_ZIP;
use super::ops::filter2;
use crate::tags::is_wildcard;
use crate::value::Value;

/// `Undefined`, `Null`, `NaN`, `""` and containers with no entries.
/// `0` and `false` are not empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => true,
        Value::Number(n) => n.is_nan(),
        Value::Str(s) => s.is_empty(),
        other => other.len() == Some(0),
    }
}

/// Recursively strip empty entries. The top-level container itself is kept,
/// even when it ends up with no entries.
pub fn nonempty(value: &Value) -> Value {
    if value.is_trivial() {
        return value.clone();
    }
    filter2(value, |v, _| {
        if v.is_trivial() {
            return Value::Bool(!is_empty_value(v));
        }
        let pruned = nonempty(v);
        if is_empty_value(&pruned) {
            Value::Bool(false)
        } else {
            pruned
        }
    })
}

/// Map empty values to `Undefined`.
pub fn coerce_to_undefined(value: Value) -> Value {
    if is_empty_value(&value) {
        Value::Undefined
    } else {
        value
    }
}

/// Keep the parts of `value` whose leaves satisfy `pred(leaf, pattern_leaf)`.
///
/// Structures are walked together while both sides have the same shape; at a
/// shape mismatch the whole subtree is compared as a leaf.
pub fn hyper_match(value: &Value, pattern: &Value, mut pred: impl FnMut(&Value, &Value) -> bool) -> Value {
    let matched = ZIP_ZIP.apply(&[value.clone(), pattern.clone()], |row, _| {
        let (x, y) = (&row[0], &row[1]);
        if pred(x, y) {
            x.clone()
        } else {
            Value::Undefined
        }
    });
    coerce_to_undefined(nonempty(&matched))
}

fn same_or_wildcard(x: &Value, y: &Value) -> bool {
    is_wildcard(y) || x == y
}

/// The parts of `a` that differ from `b`. A wildcard in `b` matches anything.
pub fn diff(a: &Value, b: &Value) -> Value {
    hyper_match(a, b, |x, y| !same_or_wildcard(x, y))
}

/// The parts of `a` that agree with `b`. A wildcard in `b` matches anything.
pub fn undiff(a: &Value, b: &Value) -> Value {
    hyper_match(a, b, same_or_wildcard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::wildcard;

    #[test]
    fn nonempty_keeps_zero_and_false() {
        let v = Value::map([
            ("zero", Value::from(0)),
            ("no", Value::from(false)),
            ("nan", Value::Number(f64::NAN)),
            ("blank", Value::from("")),
            ("null", Value::Null),
            ("hollow", Value::map([("inner", Value::list(Vec::<Value>::new()))])),
        ]);
        assert_eq!(nonempty(&v), Value::map([("zero", Value::from(0)), ("no", Value::from(false))]));
    }

    #[test]
    fn nonempty_on_lists() {
        let v = Value::list([Value::from(1), Value::Undefined, Value::list([Value::Null])]);
        assert_eq!(nonempty(&v), Value::list([1]));
    }

    #[test]
    fn diff_reports_changed_leaves() {
        let a = Value::map([("x", 1), ("y", 2)]);
        let b = Value::map([("x", 1), ("y", 3)]);
        assert_eq!(diff(&a, &b), Value::map([("y", 2)]));
        assert!(diff(&a, &a).is_undefined());
    }

    #[test]
    fn wildcard_matches_anything() {
        let a = Value::map([("x", Value::from(1)), ("y", Value::list([1, 2]))]);
        let b = Value::map([("x", wildcard()), ("y", wildcard())]);
        assert!(diff(&a, &b).is_undefined());
        assert_eq!(undiff(&a, &b), a);
    }

    #[test]
    fn undiff_keeps_agreeing_leaves() {
        let a = Value::map([("x", 1), ("y", 2), ("z", 5)]);
        let b = Value::map([("x", 1), ("y", 3)]);
        assert_eq!(undiff(&a, &b), Value::map([("x", 1)]));
    }

    #[test]
    fn hyper_match_omits_mismatches() {
        let v = Value::list([1, 5, 10]);
        let p = Value::list([0, 0, 0]);
        let big = hyper_match(&v, &p, |x, _| x.as_f64().is_some_and(|n| n > 2.0));
        assert_eq!(big, Value::list([5, 10]));
        assert!(hyper_match(&v, &p, |_, _| false).is_undefined());
    }
}
