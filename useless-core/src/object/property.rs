//! Property definitions.
//!
//! Every installed property has the same shape: a getter and an optional
//! setter, both plain [`Function`]s called with the owner as `this`. Three
//! kinds of input are normalised into that shape:
//!
//! - a constant: the getter returns it, the setter fails with `ImmutableWrite`
//! - a function: it becomes the getter, the setter fails with `AccessorOverwrite`
//! - a `{get, set}` map: installed as given

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::{Function, Value};

/// Getter/setter pair.
#[derive(Clone, Debug)]
pub struct PropertyDefinition {
    pub get: Function,
    pub set: Option<Function>,
}

impl PropertyDefinition {
    pub fn new(get: Function, set: Option<Function>) -> Self {
        Self { get, set }
    }

    /// A read-only property returning `value`.
    pub fn constant(name: &str, value: Value) -> Self {
        let owned = name.to_owned();
        Self {
            get: Function::named(name, move |_, _| Ok(value.clone())),
            set: Some(Function::new(move |_, _| {
                Err(Error::ImmutableWrite { name: owned.clone() })
            })),
        }
    }

    /// A computed property whose getter is `get`.
    pub fn accessor(name: &str, get: Function) -> Self {
        let owned = name.to_owned();
        Self {
            get,
            set: Some(Function::new(move |_, _| {
                Err(Error::AccessorOverwrite { name: owned.clone() })
            })),
        }
    }

    pub fn read(&self, this: &Value) -> Result<Value> {
        self.get.call(this, &[])
    }

    pub fn write(&self, name: &str, this: &Value, value: Value) -> Result<()> {
        match &self.set {
            Some(set) => set.call(this, &[value]).map(drop),
            None => Err(Error::AccessorOverwrite { name: name.to_owned() }),
        }
    }
}

/// Normalise a constant, a getter function or a `{get, set}` map.
pub fn coerce_to_property_definition(name: &str, value: &Value) -> PropertyDefinition {
    match value {
        Value::Func(get) => PropertyDefinition::accessor(name, get.clone()),
        Value::Map(map) if is_accessor_record(map) => {
            let get = match map.get("get") {
                Some(Value::Func(f)) => f.clone(),
                _ => Function::new(|_, _| Ok(Value::Undefined)),
            };
            let set = match map.get("set") {
                Some(Value::Func(f)) => Some(f.clone()),
                _ => None,
            };
            PropertyDefinition::new(get, set)
        }
        other => PropertyDefinition::constant(name, other.clone()),
    }
}

fn is_accessor_record(map: &crate::value::Map) -> bool {
    !map.is_empty()
        && map.keys().all(|k| k == "get" || k == "set")
        && map.values().all(|v| matches!(v, Value::Func(_)))
}

/// Wrap `getter` so its result is computed once per owner and then served
/// from the owner's hidden cache.
///
/// Instances and types each carry their own cache; any other `this` gets no
/// caching.
pub fn memoized(name: &str, getter: Function) -> PropertyDefinition {
    let key: Arc<str> = Arc::from(name);
    let get = Function::named(name, move |this, _| {
        if let Some(hit) = cached(this, &key) {
            return Ok(hit);
        }
        let value = getter.call(this, &[])?;
        store(this, &key, value.clone());
        Ok(value)
    });
    PropertyDefinition::accessor(name, get)
}

fn cached(this: &Value, key: &str) -> Option<Value> {
    match this {
        Value::Object(instance) => instance.memo_get(key),
        Value::Type(prototype) => prototype.memo_get(key),
        _ => None,
    }
}

fn store(this: &Value, key: &str, value: Value) {
    match this {
        Value::Object(instance) => instance.memo_set(key, value),
        Value::Type(prototype) => prototype.memo_set(key, value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_rejects_writes() {
        let p = coerce_to_property_definition("x", &Value::from(1));
        assert_eq!(p.read(&Value::Undefined).unwrap(), Value::from(1));
        assert!(matches!(
            p.write("x", &Value::Undefined, Value::from(2)),
            Err(Error::ImmutableWrite { .. })
        ));
    }

    #[test]
    fn function_becomes_accessor() {
        let p = coerce_to_property_definition("y", &Value::func(|_, _| Ok(Value::from("computed"))));
        assert_eq!(p.read(&Value::Undefined).unwrap(), Value::from("computed"));
        assert!(matches!(
            p.write("y", &Value::Undefined, Value::Null),
            Err(Error::AccessorOverwrite { .. })
        ));
    }

    #[test]
    fn get_set_record_is_used_verbatim() {
        let store = Arc::new(parking_lot::Mutex::new(Value::from(0)));
        let (r, w) = (store.clone(), store.clone());
        let record = Value::map([
            ("get", Value::func(move |_, _| Ok(r.lock().clone()))),
            (
                "set",
                Value::func(move |_, args| {
                    *w.lock() = args[0].clone();
                    Ok(Value::Undefined)
                }),
            ),
        ]);
        let p = coerce_to_property_definition("z", &record);
        p.write("z", &Value::Undefined, Value::from(9)).unwrap();
        assert_eq!(p.read(&Value::Undefined).unwrap(), Value::from(9));
    }

    #[test]
    fn plain_map_is_a_constant() {
        let p = coerce_to_property_definition("m", &Value::map([("a", 1)]));
        assert_eq!(p.read(&Value::Undefined).unwrap(), Value::map([("a", 1)]));
    }
}
