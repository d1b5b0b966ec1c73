//! Bridge between [`Value`] and `serde_json`.
//!
//! Only plain data crosses the bridge. Functions, instances, streams and the
//! other opaque kinds have no JSON form and are rejected by [`Value::to_json`].

use std::sync::Arc;

use serde_json::Value as Json;

use super::{Map, Value};
use crate::error::{Error, Result};

impl Value {
    /// Parse JSON text into a value.
    pub fn parse_json(text: &str) -> Result<Value> {
        let json: Json = serde_json::from_str(text)?;
        Ok(Value::from_json(json))
    }

    pub fn from_json(json: Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::List(Arc::new(items.into_iter().map(Value::from_json).collect())),
            Json::Object(entries) => Value::Map(Arc::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect::<Map>(),
            )),
        }
    }

    /// Convert plain data to JSON. Sets become arrays, `Undefined` map
    /// entries are skipped.
    pub fn to_json(&self) -> Result<Json> {
        Ok(match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.to_string()),
            Value::List(items) | Value::Set(items) => {
                Json::Array(items.iter().map(Value::to_json).collect::<Result<_>>()?)
            }
            Value::Map(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map.iter() {
                    if !v.is_undefined() {
                        out.insert(k.clone(), v.to_json()?);
                    }
                }
                Json::Object(out)
            }
            other => {
                return Err(Error::Json(Arc::from(format!(
                    "{} has no JSON representation",
                    other.kind()
                ))))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_json() {
        let v = Value::parse_json(r#"{"a": [1, true, null], "b": {"c": "d"}}"#).unwrap();
        assert_eq!(v.get("a"), Value::list([Value::from(1), Value::from(true), Value::Null]));
        assert_eq!(v.get("b").get("c"), Value::from("d"));
    }

    #[test]
    fn rejects_opaque_values() {
        let f = Value::func(|_, _| Ok(Value::Undefined));
        assert!(f.to_json().is_err());
    }

    #[test]
    fn skips_undefined_entries() {
        let v = Value::map([("a", Value::Undefined), ("b", Value::from(2))]);
        assert_eq!(v.to_json().unwrap(), serde_json::json!({"b": 2.0}));
    }
}
