//! Object Layer
//!
//! Instances of compiled prototypes and the members they expose.
//!
//! # Member lookup
//!
//! An [`Instance`] has its own field table. Reads look there first and then
//! in the prototype's instance member table, which already contains every
//! inherited and trait-contributed member. Writes go through a property
//! setter when the name resolves to a property, and otherwise create or
//! replace an own field.
//!
//! No lock is held while user code (getters, setters, methods) runs.

mod extension;
mod property;

pub use extension::{extension_method, extension_methods, ExtensionMember};
pub use property::{coerce_to_property_definition, memoized, PropertyDefinition};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::component::Lifecycle;
use crate::error::{Error, Result};
use crate::prototype::Prototype;
use crate::value::{Function, Value, WeakFunction};

static INSTANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_instance_id() -> u64 {
    INSTANCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// One installed member.
#[derive(Clone, Debug)]
pub enum Member {
    Value(Value),
    Method(Function),
    Property(PropertyDefinition),
}

impl Member {
    /// Read the member with `this` as receiver.
    pub fn read(&self, this: &Value) -> Result<Value> {
        match self {
            Member::Value(v) => Ok(v.clone()),
            Member::Method(f) => Ok(Value::Func(f.clone())),
            Member::Property(p) => p.read(this),
        }
    }

    pub fn is_property(&self) -> bool {
        matches!(self, Member::Property(_))
    }
}

struct InstanceInner {
    id: u64,
    prototype: Arc<Prototype>,
    fields: RwLock<IndexMap<String, Member>>,
    memo: Mutex<HashMap<String, Value>>,
    lifecycle: OnceLock<Arc<Lifecycle>>,
    /// Every function bound to this instance with `bind_weak`.
    bound: Mutex<Vec<WeakFunction>>,
}

/// A live object. Clones share identity.
#[derive(Clone)]
pub struct Instance(Arc<InstanceInner>);

/// Non-owning handle to an [`Instance`].
#[derive(Clone)]
pub struct WeakInstance(Weak<InstanceInner>);

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.0.upgrade().map(Instance)
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(instance) => write!(f, "WeakInstance({instance:?})"),
            None => f.write_str("WeakInstance(dropped)"),
        }
    }
}

impl Instance {
    /// A bare instance with no fields. Constructors run separately.
    pub fn new(prototype: Arc<Prototype>) -> Self {
        Self(Arc::new(InstanceInner {
            id: next_instance_id(),
            prototype,
            fields: RwLock::new(IndexMap::new()),
            memo: Mutex::new(HashMap::new()),
            lifecycle: OnceLock::new(),
            bound: Mutex::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn prototype(&self) -> &Arc<Prototype> {
        &self.0.prototype
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance(Arc::downgrade(&self.0))
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.clone())
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// The own field named `name`, falling back to the prototype member.
    pub fn member(&self, name: &str) -> Option<Member> {
        if let Some(own) = self.0.fields.read().get(name) {
            return Some(own.clone());
        }
        self.0.prototype.instance_member(name).cloned()
    }

    pub fn own_member(&self, name: &str) -> Option<Member> {
        self.0.fields.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.member(name).is_some()
    }

    /// Names of own fields, in insertion order.
    pub fn own_keys(&self) -> Vec<String> {
        self.0.fields.read().keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        match self.member(name) {
            Some(member) => member.read(&self.as_value()),
            None => Ok(Value::Undefined),
        }
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.member(name) {
            Some(Member::Property(p)) => p.write(name, &self.as_value(), value),
            _ => {
                self.0.fields.write().insert(name.to_owned(), Member::Value(value));
                Ok(())
            }
        }
    }

    /// Install an own member, replacing whatever was there.
    pub fn put(&self, name: &str, member: Member) {
        self.0.fields.write().insert(name.to_owned(), member);
    }

    pub fn remove(&self, name: &str) -> Option<Member> {
        self.0.fields.write().shift_remove(name)
    }

    /// Call the member `name` with this instance as `this`.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.get(name)? {
            Value::Func(f) => f.call(&self.as_value(), args),
            Value::Stream(s) => s.call(args),
            _ => Err(Error::NotCallable {
                name: format!("{}.{name}", self.0.prototype.name()),
            }),
        }
    }

    /// Define an own property.
    ///
    /// Fails with `DuplicateProperty` if an own member of that name exists,
    /// unless `override_existing` is set.
    pub fn define_property(
        &self,
        name: &str,
        definition: PropertyDefinition,
        override_existing: bool,
    ) -> Result<()> {
        let mut fields = self.0.fields.write();
        if !override_existing && fields.contains_key(name) {
            return Err(Error::DuplicateProperty { name: name.to_owned() });
        }
        fields.insert(name.to_owned(), Member::Property(definition));
        Ok(())
    }

    /// Define an own property whose getter runs once per instance.
    pub fn define_memoized_property(&self, name: &str, getter: Function) -> Result<()> {
        self.define_property(name, memoized(name, getter), false)
    }

    /// The method `name`, bound to this instance (held weakly).
    pub fn bound(&self, name: &str) -> Result<Function> {
        match self.get(name)? {
            Value::Func(f) => Ok(f.bind_weak(self)),
            _ => Err(Error::NotCallable {
                name: format!("{}.{name}", self.0.prototype.name()),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Hidden state
    // ------------------------------------------------------------------

    pub(crate) fn memo_get(&self, key: &str) -> Option<Value> {
        self.0.memo.lock().get(key).cloned()
    }

    pub(crate) fn memo_set(&self, key: &str, value: Value) {
        self.0.memo.lock().insert(key.to_owned(), value);
    }

    pub(crate) fn track_bound(&self, function: &Function) {
        let mut bound = self.0.bound.lock();
        bound.retain(WeakFunction::is_live);
        bound.push(function.downgrade());
    }

    /// Remove every function bound to this instance from every stream it
    /// reads.
    pub(crate) fn unbind_bound(&self) {
        let bound = std::mem::take(&mut *self.0.bound.lock());
        for function in bound.iter().filter_map(WeakFunction::upgrade) {
            function.off_everywhere();
        }
    }

    pub(crate) fn lifecycle(&self) -> Option<Arc<Lifecycle>> {
        self.0.lifecycle.get().cloned()
    }

    /// Attach component state. Returns `false` if already attached.
    pub(crate) fn install_lifecycle(&self, lifecycle: Arc<Lifecycle>) -> bool {
        self.0.lifecycle.set(lifecycle).is_ok()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({} #{})", self.0.prototype.name(), self.0.id)
    }
}

// ----------------------------------------------------------------------------
// Method dispatch on arbitrary values
// ----------------------------------------------------------------------------

impl Value {
    /// Read a named member: instance members, static members, map entries,
    /// then extension properties for the value's kind.
    pub fn property(&self, name: &str) -> Result<Value> {
        match self {
            Value::Object(instance) => instance.get(name),
            Value::Type(prototype) => prototype.get_static(name),
            Value::Map(map) if map.contains_key(name) => Ok(self.get(name)),
            other => match extension_method(other.kind(), name) {
                Some(ExtensionMember::Property(getter)) => getter.call(other, &[]),
                Some(ExtensionMember::Method(f)) => Ok(Value::Func(f)),
                None => Ok(Value::Undefined),
            },
        }
    }

    /// Call a named method with this value as receiver.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self {
            Value::Object(instance) => instance.call(name, args),
            Value::Type(prototype) => prototype.call_static(name, args),
            other => match extension_method(other.kind(), name) {
                Some(ExtensionMember::Method(f)) => f.call(other, args),
                Some(ExtensionMember::Property(getter)) => {
                    getter.call(other, &[])?.call(other, args)
                }
                None => Err(Error::NotCallable {
                    name: format!("{}.{name}", other.kind()),
                }),
            },
        }
    }
}
