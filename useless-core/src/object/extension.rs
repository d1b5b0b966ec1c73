//! Extension methods for built-in value kinds.
//!
//! Methods and computed properties can be attached to strings, numbers, lists
//! and the other built-in kinds. They live in a process-wide registry keyed by
//! `(kind, name)` and are reached through [`Value::call_method`] and
//! [`Value::property`].
//!
//! Accepted member shapes are a `$method`-tagged function, a
//! `$property`-tagged getter, or a plain function (treated as a method whose
//! receiver is passed as `this`). Anything else is rejected before any member
//! of the batch is installed.

use std::sync::OnceLock;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::tags::{self, PROPERTY};
use crate::value::{Function, Map, Value, ValueKind};

#[derive(Clone, Debug)]
pub enum ExtensionMember {
    Method(Function),
    Property(Function),
}

static EXTENSIONS: OnceLock<DashMap<(ValueKind, String), ExtensionMember>> = OnceLock::new();

fn registry() -> &'static DashMap<(ValueKind, String), ExtensionMember> {
    EXTENSIONS.get_or_init(DashMap::new)
}

fn classify(name: &str, value: &Value) -> Result<ExtensionMember> {
    let subject = tags::unwrap(value);
    match (&subject, PROPERTY.is(value)) {
        (Value::Func(f), true) => Ok(ExtensionMember::Property(f.clone())),
        (Value::Func(f), false) => Ok(ExtensionMember::Method(f.clone())),
        _ => Err(Error::UnmatchedExtension { name: name.to_owned() }),
    }
}

/// Install `members` on every value of `kind`.
pub fn extension_methods(kind: ValueKind, members: &Map) -> Result<()> {
    let classified = members
        .iter()
        .map(|(name, value)| classify(name, value).map(|m| (name.clone(), m)))
        .collect::<Result<Vec<_>>>()?;
    let registry = registry();
    for (name, member) in classified {
        registry.insert((kind, name), member);
    }
    Ok(())
}

pub fn extension_method(kind: ValueKind, name: &str) -> Option<ExtensionMember> {
    registry().get(&(kind, name.to_owned())).map(|m| m.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::METHOD;

    #[test]
    fn installs_methods_and_properties() {
        let mut members = Map::new();
        members.insert(
            "extShout".into(),
            METHOD.tag(Value::func(|this, _| {
                Ok(Value::str(this.as_str().unwrap_or_default().to_uppercase()))
            })),
        );
        members.insert(
            "extLength".into(),
            PROPERTY.tag(Value::func(|this, _| {
                Ok(Value::from(this.as_str().map(str::len).unwrap_or(0)))
            })),
        );
        members.insert(
            "extTwice".into(),
            Value::func(|this, _| Ok(Value::str(format!("{0}{0}", this.as_str().unwrap_or_default())))),
        );
        extension_methods(ValueKind::String, &members).unwrap();

        let s = Value::from("ab");
        assert_eq!(s.call_method("extShout", &[]).unwrap(), Value::from("AB"));
        assert_eq!(s.property("extLength").unwrap(), Value::from(2));
        assert_eq!(s.call_method("extTwice", &[]).unwrap(), Value::from("abab"));
        assert!(Value::from(1).call_method("extShout", &[]).is_err());
    }

    #[test]
    fn rejects_crazy_input_atomically() {
        let mut members = Map::new();
        members.insert("extFine".into(), Value::func(|_, _| Ok(Value::Null)));
        members.insert("extBroken".into(), Value::from(42));
        let err = extension_methods(ValueKind::Number, &members).unwrap_err();
        assert!(matches!(err, Error::UnmatchedExtension { ref name } if name == "extBroken"));
        assert!(err.to_string().contains("crazy input"));
        assert!(extension_method(ValueKind::Number, "extFine").is_none());
    }
}
