//! Dynamic Values
//!
//! Everything the object system manipulates at runtime is a [`Value`]: plain
//! data (numbers, strings, lists, maps, sets), callables, tagged values,
//! compiled types and their instances, streams and promises.
//!
//! # Containers
//!
//! Lists, maps and sets are `Arc`-backed. Cloning a value is cheap and two
//! clones are the *same* value ([`Value::same`]); rebuilding a container
//! produces a structurally equal (`==`) but different value. The functional
//! layer relies on that distinction.
//!
//! # Triviality
//!
//! A value is *trivial* unless it is a list, map or set. Trivial values are
//! the leaves of every hyper-operator traversal: instances, types, streams,
//! promises and tagged wrappers are opaque and never descended into.

mod display;
mod function;
mod json;

pub use display::stringify;
pub use function::{Function, NativeFn};
pub(crate) use function::WeakFunction;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::object::Instance;
use crate::prototype::Prototype;
use crate::stream::Stream;
use crate::tags::Tagged;
use crate::task::Promise;

/// Ordered string-keyed mapping used for map values and definitions.
pub type Map = IndexMap<String, Value>;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Map(Arc<Map>),
    /// Insertion-ordered, deduplicated by structural equality.
    Set(Arc<Vec<Value>>),
    Func(Function),
    Tagged(Arc<Tagged>),
    Object(Instance),
    Type(Arc<Prototype>),
    Stream(Stream),
    Promise(Promise),
}

/// The runtime kind of a value, used by contracts and extension methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Number,
    String,
    List,
    Map,
    Set,
    Function,
    Tagged,
    Object,
    Type,
    Stream,
    Promise,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Map => "map",
            ValueKind::Set => "set",
            ValueKind::Function => "function",
            ValueKind::Tagged => "tagged",
            ValueKind::Object => "object",
            ValueKind::Type => "type",
            ValueKind::Stream => "stream",
            ValueKind::Promise => "promise",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "undefined" => ValueKind::Undefined,
            "null" => ValueKind::Null,
            "boolean" | "bool" => ValueKind::Bool,
            "number" => ValueKind::Number,
            "string" => ValueKind::String,
            "list" | "array" => ValueKind::List,
            "map" => ValueKind::Map,
            "set" => ValueKind::Set,
            "function" => ValueKind::Function,
            "tagged" => ValueKind::Tagged,
            "object" => ValueKind::Object,
            "type" => ValueKind::Type,
            "stream" => ValueKind::Stream,
            "promise" => ValueKind::Promise,
            other => return Err(Error::custom(format!("unknown value kind `{other}`"))),
        })
    }
}

/// Container shape, detected once per traversal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Sequence,
    Mapping,
    Set,
}

/// Position of an element inside its container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Key {
    /// The value is not inside a container (scalar case).
    #[default]
    None,
    Index(usize),
    Name(String),
}

impl Key {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::None => Ok(()),
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(n) => f.write_str(n),
        }
    }
}

impl Value {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn empty_map() -> Self {
        Value::Map(Arc::new(Map::new()))
    }

    /// Build a set, dropping structurally equal duplicates.
    pub fn set<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            let item = item.into();
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::Set(Arc::new(unique))
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Value::Func(Function::new(f))
    }

    // ------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Set(_) => ValueKind::Set,
            Value::Func(_) => ValueKind::Function,
            Value::Tagged(_) => ValueKind::Tagged,
            Value::Object(_) => ValueKind::Object,
            Value::Type(_) => ValueKind::Type,
            Value::Stream(_) => ValueKind::Stream,
            Value::Promise(_) => ValueKind::Promise,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Value::List(_) => Shape::Sequence,
            Value::Map(_) => Shape::Mapping,
            Value::Set(_) => Shape::Set,
            _ => Shape::Scalar,
        }
    }

    /// Leaves of hyper traversal: everything except lists, maps and sets.
    pub fn is_trivial(&self) -> bool {
        self.shape() == Shape::Scalar
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// JavaScript-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Number of entries of a container, `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items.len()),
            Value::Map(map) => Some(map.len()),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&Function> {
        match self {
            Value::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Value::Object(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&Arc<Prototype>> {
        match self {
            Value::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Value::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_promise(&self) -> Option<&Promise> {
        match self {
            Value::Promise(p) => Some(p),
            _ => None,
        }
    }

    /// Entry of a map value, `Undefined` when absent or not a map.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Map(map) => map.get(key).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Element at `key` for any container shape.
    pub fn at(&self, key: &Key) -> Value {
        match (self, key) {
            (Value::List(items) | Value::Set(items), Key::Index(i)) => {
                items.get(*i).cloned().unwrap_or_default()
            }
            (Value::Map(map), Key::Name(n)) => map.get(n).cloned().unwrap_or_default(),
            (_, Key::None) => self.clone(),
            _ => Value::Undefined,
        }
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Reference equality. Scalars compare by value, everything else by
    /// allocation identity.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Set(a), Value::Set(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Tagged(a), Value::Tagged(b)) => Arc::ptr_eq(a, b),
            (Value::Func(a), Value::Func(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Type(a), Value::Type(b)) => Arc::ptr_eq(a, b),
            (Value::Stream(a), Value::Stream(b)) => a.ptr_eq(b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Structural equality where `NaN` equals `NaN`, as used for change
    /// detection. Containers compare element-wise.
    pub fn is_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b) || (a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_equal(y)))
            }
            (Value::Set(a), Value::Set(b)) => {
                Arc::ptr_eq(a, b) || (a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.is_equal(y))))
            }
            (Value::Map(a), Value::Map(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.len() == b.len()
                        && a.iter().all(|(k, x)| b.get(k).is_some_and(|y| x.is_equal(y))))
            }
            _ => self == other,
        }
    }

    /// Rebuild every container so that no mutable state is shared with the
    /// original. Opaque values are kept as they are.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::List(items) => Value::List(Arc::new(items.iter().map(Value::deep_clone).collect())),
            Value::Set(items) => Value::Set(Arc::new(items.iter().map(Value::deep_clone).collect())),
            Value::Map(map) => Value::Map(Arc::new(
                map.iter().map(|(k, v)| (k.clone(), v.deep_clone())).collect(),
            )),
            other => other.clone(),
        }
    }

    /// Call this value as a function with an explicit `this`.
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        match self {
            Value::Func(f) => f.call(this, args),
            Value::Stream(s) => s.call(args),
            other => Err(Error::NotCallable {
                name: other.to_string(),
            }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Set(a), Value::Set(b)) => {
                Arc::ptr_eq(a, b) || (a.len() == b.len() && a.iter().all(|x| b.contains(x)))
            }
            (Value::Tagged(a), Value::Tagged(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => self.same(other),
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

number_from!(i32, i64, u32, u64, usize, f32);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(Arc::new(map))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Func(f)
    }
}

impl From<Instance> for Value {
    fn from(i: Instance) -> Self {
        Value::Object(i)
    }
}

impl From<Arc<Prototype>> for Value {
    fn from(t: Arc<Prototype>) -> Self {
        Value::Type(t)
    }
}

impl From<Stream> for Value {
    fn from(s: Stream) -> Self {
        Value::Stream(s)
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Self {
        Value::Promise(p)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_vs_reference_equality() {
        let a = Value::list([1, 2, 3]);
        let b = Value::list([1, 2, 3]);
        assert_eq!(a, b);
        assert!(!a.same(&b));
        assert!(a.same(&a.clone()));
    }

    #[test]
    fn set_deduplicates_and_ignores_order() {
        let a = Value::set([1, 2, 2, 3]);
        assert_eq!(a.len(), Some(3));
        assert_eq!(a, Value::set([3, 1, 2]));
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let nan = Value::Number(f64::NAN);
        assert_ne!(nan, nan.clone());
        assert!(nan.is_equal(&nan));
        assert!(Value::list([f64::NAN, 1.0]).is_equal(&Value::list([f64::NAN, 1.0])));
        assert!(!Value::from(0).is_equal(&Value::Number(f64::NAN)));
    }

    #[test]
    fn truthiness_matches_script_rules() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::empty_map().is_truthy());
    }

    #[test]
    fn deep_clone_breaks_sharing() {
        let inner = Value::set([1]);
        let outer = Value::map([("s", inner.clone())]);
        let copy = outer.deep_clone();
        assert_eq!(copy, outer);
        assert!(!copy.get("s").same(&inner));
    }

    #[test]
    fn kind_round_trips_through_name() {
        for kind in [ValueKind::Number, ValueKind::String, ValueKind::Function, ValueKind::Map] {
            assert_eq!(kind.name().parse::<ValueKind>().unwrap(), kind);
        }
    }

    #[test]
    fn at_reads_any_container() {
        let list = Value::list(["a", "b"]);
        assert_eq!(list.at(&Key::Index(1)), Value::from("b"));
        assert_eq!(list.at(&Key::Index(5)), Value::Undefined);
        let map = Value::map([("k", 1)]);
        assert_eq!(map.at(&Key::Name("k".into())), Value::from(1));
    }
}
