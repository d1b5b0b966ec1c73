//! The tag wrapper and its algebra.
//!
//! A [`Tagged`] value is a subject plus an ordered set of keywords, each with
//! attached data (`true` by default). Wrappers are immutable; every operation
//! returns a new value and leaves its inputs untouched.
//!
//! # Invariants
//!
//! - Wrapping a wrapper returns it unchanged (no double wrapping).
//! - `omit` never leaves an empty keyword set behind: it unwraps instead.
//! - A wrapper without subject and without keywords unwraps to `Undefined`.
//! - Operations on untagged values treat them as carrying zero keywords.

use std::sync::Arc;

use indexmap::IndexMap;

use super::keyword::Keyword;
use crate::functional::map2;
use crate::value::{Key, Value};

/// A subject annotated with keywords.
#[derive(Clone, Default, PartialEq)]
pub struct Tagged {
    /// `Undefined` when the wrapper has no subject.
    subject: Value,
    keywords: IndexMap<Keyword, Value>,
}

impl Tagged {
    pub fn new(subject: Value) -> Self {
        Self {
            subject,
            keywords: IndexMap::new(),
        }
    }

    pub fn subject(&self) -> &Value {
        &self.subject
    }

    pub fn keywords(&self) -> &IndexMap<Keyword, Value> {
        &self.keywords
    }

    pub fn has(&self, keyword: Keyword) -> bool {
        self.keywords.contains_key(&keyword)
    }

    pub fn get(&self, keyword: Keyword) -> Option<&Value> {
        self.keywords.get(&keyword)
    }

    pub fn is_empty(&self) -> bool {
        self.subject.is_undefined() && self.keywords.is_empty()
    }

    /// True when any keyword marks this as a stream definition.
    pub fn is_stream_definition(&self) -> bool {
        self.keywords.keys().any(|k| k.is_stream_definition())
    }
}

fn into_value(tagged: Tagged) -> Value {
    Value::Tagged(Arc::new(tagged))
}

/// Wrap `value`; a value that is already wrapped is returned as is.
pub fn wrap(value: &Value) -> Value {
    match value {
        Value::Tagged(_) => value.clone(),
        other => into_value(Tagged::new(other.clone())),
    }
}

/// The subject of a wrapper, or the value itself when untagged.
pub fn unwrap(value: &Value) -> Value {
    match value {
        Value::Tagged(t) => t.subject.clone(),
        other => other.clone(),
    }
}

/// True when `value` is a tag wrapper.
pub fn is_tagged(value: &Value) -> bool {
    matches!(value, Value::Tagged(_))
}

/// Annotate `value` with `keyword`, replacing data of an existing annotation.
pub fn add(value: &Value, keyword: Keyword, data: Value) -> Value {
    let mut tagged = match value {
        Value::Tagged(t) => (**t).clone(),
        other => Tagged::new(other.clone()),
    };
    tagged.keywords.insert(keyword, data);
    into_value(tagged)
}

/// Merge two possibly-tagged values.
///
/// The right operand's subject wins unless it has none; keywords are united,
/// with the right operand's data winning on conflict.
pub fn extend(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Tagged(_), _) | (_, Value::Tagged(_)) => {}
        _ => {
            return if b.is_undefined() { a.clone() } else { b.clone() };
        }
    }
    let left = as_tagged(a);
    let right = as_tagged(b);
    let mut merged = Tagged {
        subject: if right.subject.is_undefined() {
            left.subject.clone()
        } else {
            right.subject.clone()
        },
        keywords: left.keywords.clone(),
    };
    for (k, v) in right.keywords.iter() {
        merged.keywords.insert(*k, v.clone());
    }
    into_value(merged)
}

fn as_tagged(value: &Value) -> Tagged {
    match value {
        Value::Tagged(t) => (**t).clone(),
        other => Tagged::new(other.clone()),
    }
}

/// Strip `keywords`; when none remain, return the bare subject.
pub fn omit(value: &Value, keywords: &[Keyword]) -> Value {
    let Value::Tagged(t) = value else {
        return value.clone();
    };
    let mut stripped = (**t).clone();
    stripped.keywords.retain(|k, _| !keywords.contains(k));
    if stripped.keywords.is_empty() {
        stripped.subject
    } else {
        into_value(stripped)
    }
}

/// Data attached under `keyword`, if any.
pub fn get(value: &Value, keyword: Keyword) -> Option<Value> {
    keyword.get(value)
}

/// Visit every `(keyword, data)` pair. Untagged values have none.
pub fn each(value: &Value, mut f: impl FnMut(Keyword, &Value)) {
    if let Value::Tagged(t) = value {
        for (k, v) in t.keywords.iter() {
            f(*k, v);
        }
    }
}

/// Keywords carried by `value`, in annotation order.
pub fn keywords(value: &Value) -> Vec<Keyword> {
    match value {
        Value::Tagged(t) => t.keywords.keys().copied().collect(),
        _ => Vec::new(),
    }
}

/// Apply `f(subject, key, original)` to each entry one container level deep,
/// re-applying each entry's keywords to the result and finally the outer
/// wrapper's keywords to the rebuilt container.
pub fn map(value: &Value, mut f: impl FnMut(&Value, &Key, &Value) -> Value) -> Value {
    let outer = unwrap(value);
    let mapped = map2(&outer, |entry, key| {
        let result = f(&unwrap(entry), key, entry);
        match entry {
            Value::Tagged(t) => reapply(&result, t),
            _ => result,
        }
    });
    match value {
        Value::Tagged(t) => reapply(&mapped, t),
        _ => mapped,
    }
}

fn reapply(subject: &Value, from: &Tagged) -> Value {
    let mut tagged = as_tagged(subject);
    for (k, v) in from.keywords.iter() {
        tagged.keywords.entry(*k).or_insert_with(|| v.clone());
    }
    into_value(tagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::keyword::{FINAL, PROPERTY, STATIC};

    #[test]
    fn wrap_is_idempotent() {
        let w = wrap(&Value::from(1));
        assert!(wrap(&w).same(&w));
        for x in [Value::from(1), Value::list([1, 2]), STATIC.tag(3)] {
            assert_eq!(unwrap(&wrap(&unwrap(&x))), unwrap(&x));
        }
    }

    #[test]
    fn empty_wrapper_unwraps_to_undefined() {
        let w = wrap(&Value::Undefined);
        assert!(unwrap(&w).is_undefined());
        if let Value::Tagged(t) = &w {
            assert!(t.is_empty());
        }
    }

    #[test]
    fn extend_plain_values() {
        assert_eq!(extend(&Value::from(1), &Value::from(2)), Value::from(2));
        assert_eq!(extend(&Value::from(1), &Value::Undefined), Value::from(1));
    }

    #[test]
    fn extend_keeps_left_keywords_and_right_subject() {
        let a = STATIC.tag_with("left", 1);
        let b = FINAL.tag(STATIC.tag_with("right", 2));
        let merged = extend(&a, &b);
        assert_eq!(unwrap(&merged), Value::from(2));
        assert_eq!(STATIC.get(&merged), Some(Value::from("right")));
        assert!(FINAL.is(&merged));

        let group = STATIC.bare();
        let member = PROPERTY.tag(5);
        let flat = extend(&group, &member);
        assert!(STATIC.is(&flat) && PROPERTY.is(&flat));
        assert_eq!(unwrap(&flat), Value::from(5));
    }

    #[test]
    fn extend_wraps_the_untagged_side() {
        let merged = extend(&Value::from(1), &FINAL.bare());
        assert_eq!(unwrap(&merged), Value::from(1));
        assert!(FINAL.is(&merged));
    }

    #[test]
    fn omit_unwraps_when_no_keywords_remain() {
        let v = STATIC.tag(FINAL.tag(1));
        let partial = omit(&v, &[FINAL]);
        assert!(STATIC.is(&partial));
        assert!(!FINAL.is(&partial));
        assert_eq!(omit(&v, &[FINAL, STATIC]), Value::from(1));
        assert_eq!(omit(&Value::from(3), &[STATIC]), Value::from(3));
    }

    #[test]
    fn each_on_untagged_is_a_no_op() {
        let mut seen = 0;
        each(&Value::from(1), |_, _| seen += 1);
        assert_eq!(seen, 0);
        each(&STATIC.tag(FINAL.tag(1)), |_, _| seen += 1);
        assert_eq!(seen, 2);
    }

    #[test]
    fn map_preserves_annotations() {
        let container = STATIC.tag(Value::list([FINAL.tag(1), Value::from(2)]));
        let doubled = map(&container, |v, _, _| Value::from(v.as_f64().unwrap_or(0.0) * 2.0));
        assert!(STATIC.is(&doubled));
        let items = unwrap(&doubled);
        let items = items.as_list().unwrap();
        assert!(FINAL.is(&items[0]));
        assert_eq!(unwrap(&items[0]), Value::from(2));
        assert_eq!(items[1], Value::from(4));
    }
}
