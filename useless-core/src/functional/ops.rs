//! Shallow operators.
//!
//! Each operator handles the four shapes explicitly: a scalar is treated as a
//! single-element case, sequences and sets are walked by position, mappings
//! by key. Results always come back in the shape of the input.

use std::sync::Arc;

use indexmap::IndexSet;

use crate::value::{Key, Map, Shape, Value};

/// Map every element; the scalar case applies `f` to the value itself.
pub fn map2(value: &Value, mut f: impl FnMut(&Value, &Key) -> Value) -> Value {
    match value {
        Value::List(items) => Value::List(Arc::new(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| f(v, &Key::Index(i)))
                .collect(),
        )),
        Value::Set(items) => Value::set(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| f(v, &Key::Index(i)))
                .collect::<Vec<_>>(),
        ),
        Value::Map(map) => Value::Map(Arc::new(
            map.iter()
                .map(|(k, v)| (k.clone(), f(v, &Key::Name(k.clone()))))
                .collect::<Map>(),
        )),
        scalar => f(scalar, &Key::None),
    }
}

/// Outcome of a filter predicate.
enum Verdict {
    Keep,
    Drop,
    Replace(Value),
}

impl From<Value> for Verdict {
    fn from(v: Value) -> Self {
        match v {
            Value::Bool(true) => Verdict::Keep,
            Value::Bool(false) => Verdict::Drop,
            other => Verdict::Replace(other),
        }
    }
}

/// Filter with a tri-state predicate.
///
/// `true` keeps the element, `false` drops it, and any other result replaces
/// the element. Dropping the scalar case yields `Undefined`.
pub fn filter2<R>(value: &Value, mut pred: impl FnMut(&Value, &Key) -> R) -> Value
where
    R: Into<Value>,
{
    let mut judge = |v: &Value, k: &Key| -> Option<Value> {
        let outcome: Value = pred(v, k).into();
        match Verdict::from(outcome) {
            Verdict::Keep => Some(v.clone()),
            Verdict::Drop => None,
            Verdict::Replace(r) => Some(r),
        }
    };
    match value {
        Value::List(items) => Value::List(Arc::new(
            items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| judge(v, &Key::Index(i)))
                .collect(),
        )),
        Value::Set(items) => Value::set(
            items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| judge(v, &Key::Index(i)))
                .collect::<Vec<_>>(),
        ),
        Value::Map(map) => Value::Map(Arc::new(
            map.iter()
                .filter_map(|(k, v)| judge(v, &Key::Name(k.clone())).map(|r| (k.clone(), r)))
                .collect::<Map>(),
        )),
        scalar => judge(scalar, &Key::None).unwrap_or_default(),
    }
}

/// Combine N containers of one shape position-wise (or key-wise).
///
/// Missing entries are passed as `Undefined`; mapping keys are united in
/// order of first appearance. Mixed shapes or scalars are combined as a
/// single case.
pub fn zip2(values: &[Value], mut f: impl FnMut(&[Value], &Key) -> Value) -> Value {
    let Some(first) = values.first() else {
        return Value::Undefined;
    };
    let shape = first.shape();
    if shape == Shape::Scalar || values.iter().any(|v| v.shape() != shape) {
        return f(values, &Key::None);
    }
    match shape {
        Shape::Sequence => {
            let len = values.iter().filter_map(Value::len).max().unwrap_or(0);
            Value::List(Arc::new(
                (0..len)
                    .map(|i| {
                        let key = Key::Index(i);
                        let row: Vec<Value> = values.iter().map(|v| v.at(&key)).collect();
                        f(&row, &key)
                    })
                    .collect(),
            ))
        }
        Shape::Mapping => {
            let mut keys: IndexSet<String> = IndexSet::new();
            for v in values {
                if let Some(map) = v.as_map() {
                    keys.extend(map.keys().cloned());
                }
            }
            Value::Map(Arc::new(
                keys.into_iter()
                    .map(|k| {
                        let key = Key::Name(k.clone());
                        let row: Vec<Value> = values.iter().map(|v| v.at(&key)).collect();
                        let out = f(&row, &key);
                        (k, out)
                    })
                    .collect::<Map>(),
            ))
        }
        Shape::Set => {
            let mut union: Vec<Value> = Vec::new();
            for v in values {
                if let Value::Set(items) = v {
                    for item in items.iter() {
                        if !union.contains(item) {
                            union.push(item.clone());
                        }
                    }
                }
            }
            Value::set(
                union
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let row: Vec<Value> = values
                            .iter()
                            .map(|v| match v {
                                Value::Set(items) if items.contains(item) => item.clone(),
                                _ => Value::Undefined,
                            })
                            .collect();
                        f(&row, &Key::Index(i))
                    })
                    .collect::<Vec<_>>(),
            )
        }
        Shape::Scalar => f(values, &Key::None),
    }
}

/// Left fold. Without a seed the first element seeds the fold; an empty
/// container without seed reduces to `Undefined`.
pub fn reduce2(
    value: &Value,
    seed: Option<Value>,
    mut f: impl FnMut(Value, &Value, &Key) -> Value,
) -> Value {
    let entries: Vec<(Key, Value)> = entries(value);
    let mut iter = entries.into_iter();
    let mut acc = match seed {
        Some(seed) => seed,
        None => match iter.next() {
            Some((_, first)) => first,
            None => return Value::Undefined,
        },
    };
    for (key, v) in iter {
        acc = f(acc, &v, &key);
    }
    acc
}

/// First `(key, value)` for which `pred` holds.
pub fn find2(value: &Value, mut pred: impl FnMut(&Value, &Key) -> bool) -> Option<(Key, Value)> {
    entries(value).into_iter().find(|(k, v)| pred(v, k))
}

/// Flatten one container level into `(key, value)` pairs. Scalars yield a
/// single pair keyed `Key::None`.
pub fn entries(value: &Value) -> Vec<(Key, Value)> {
    match value {
        Value::List(items) | Value::Set(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (Key::Index(i), v.clone()))
            .collect(),
        Value::Map(map) => map
            .iter()
            .map(|(k, v)| (Key::Name(k.clone()), v.clone()))
            .collect(),
        scalar => vec![(Key::None, scalar.clone())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: &Value) -> f64 {
        v.as_f64().unwrap_or(f64::NAN)
    }

    #[test]
    fn map2_preserves_shape_not_identity() {
        for c in [Value::list([1, 2]), Value::map([("a", 1)]), Value::set([1, 2])] {
            let copy = map2(&c, |v, _| v.clone());
            assert_eq!(copy, c);
            assert!(!copy.same(&c));
        }
        assert_eq!(map2(&Value::from(3), |v, _| v.clone()), Value::from(3));
    }

    #[test]
    fn map2_passes_keys() {
        let m = Value::map([("a", 1), ("b", 2)]);
        let keyed = map2(&m, |_, k| Value::str(k.to_string()));
        assert_eq!(keyed, Value::map([("a", "a"), ("b", "b")]));
    }

    #[test]
    fn filter2_tri_state_law() {
        for c in [Value::list([1, 2, 3]), Value::map([("a", 1), ("b", 2)]), Value::set([1, 2])] {
            assert_eq!(filter2(&c, |_, _| true), c);
            assert_eq!(filter2(&c, |_, _| false).len(), Some(0));
            let replaced = filter2(&c, |_, _| Value::from("x"));
            assert!(crate::functional::entries(&replaced)
                .iter()
                .all(|(_, v)| *v == Value::from("x")));
        }
        assert_eq!(filter2(&Value::from(1), |_, _| false), Value::Undefined);
        assert_eq!(filter2(&Value::from(1), |_, _| Value::from(9)), Value::from(9));
    }

    #[test]
    fn filter2_drops_selectively() {
        let odd = filter2(&Value::list([1, 2, 3, 4]), |v, _| num(v) % 2.0 == 1.0);
        assert_eq!(odd, Value::list([1, 3]));
    }

    #[test]
    fn zip2_sequences_pad_with_undefined() {
        let zipped = zip2(&[Value::list([1, 2, 3]), Value::list([10])], |row, _| {
            Value::list(row.to_vec())
        });
        assert_eq!(
            zipped,
            Value::list([
                Value::list([1, 10]),
                Value::list([Value::from(2), Value::Undefined]),
                Value::list([Value::from(3), Value::Undefined]),
            ])
        );
    }

    #[test]
    fn zip2_mappings_union_keys() {
        let zipped = zip2(
            &[Value::map([("a", 1)]), Value::map([("b", 2)])],
            |row, _| Value::from(row.iter().filter(|v| !v.is_undefined()).count()),
        );
        assert_eq!(zipped, Value::map([("a", 1), ("b", 1)]));
    }

    #[test]
    fn zip2_sets_union_elements() {
        let zipped = zip2(&[Value::set([1, 2]), Value::set([2, 3])], |row, _| {
            Value::from(row.iter().filter(|v| !v.is_undefined()).count())
        });
        assert_eq!(zipped, Value::set([1, 2]));
    }

    #[test]
    fn reduce2_seeds_from_first_element() {
        let sum = reduce2(&Value::list([1, 2, 3]), None, |acc, v, _| {
            Value::from(num(&acc) + num(v))
        });
        assert_eq!(sum, Value::from(6));
        let seeded = reduce2(&Value::list([1, 2, 3]), Some(Value::from(10)), |acc, v, _| {
            Value::from(num(&acc) + num(v))
        });
        assert_eq!(seeded, Value::from(16));
    }

    #[test]
    fn reduce2_of_empty_is_undefined() {
        let r = reduce2(&Value::list(Vec::<Value>::new()), None, |acc, _, _| acc);
        assert!(r.is_undefined());
    }

    #[test]
    fn find2_returns_key_and_value() {
        let found = find2(&Value::map([("a", 1), ("b", 2)]), |v, _| num(v) > 1.0);
        assert_eq!(found, Some((Key::Name("b".into()), Value::from(2))));
        assert!(find2(&Value::list([1]), |_, _| false).is_none());
    }
}
