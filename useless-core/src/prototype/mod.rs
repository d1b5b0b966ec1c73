//! Prototype Compiler
//!
//! Turns a declarative [`Definition`] into a compiled [`Prototype`]: a frozen
//! record of resolved member tables, ready to instantiate.
//!
//! # Concepts
//!
//! ## Definitions
//!
//! A definition is an ordered table of members. Members are plain values,
//! functions, or tagged values whose keywords steer compilation (`$static`
//! members land on the type, `$property` members become accessors, `$final`
//! members cannot be overridden, and so on).
//!
//! ## The pipeline
//!
//! Compilation runs every [`Pass`] once, in order, over a mutable
//! [`Compilation`]. There is no backtracking and a compiled prototype is never
//! reopened. Types inherit the compiler of their base, including any pass
//! overrides, which is how the component layer changes instance construction
//! for every component type at once.
//!
//! ## Traits
//!
//! A trait is a definition compiled as non-instantiable. Types listing traits
//! receive the traits' own members (own members win, later traits win over
//! earlier ones, traits win over the base) and record every contribution per
//! member name so that stream and bindable members can be recombined later.
//!
//! # Entry points
//!
//! [`prototype`], [`extends`], [`define_trait`] and [`singleton`].

mod compiler;
mod definition;
mod macros;
mod passes;
mod trait_graph;

pub use compiler::{Compilation, Compiler, Constructor, Contribution, Origin, Pass, PassFn, Super};
pub use definition::{Contract, Definition, StaticHook};
pub use macros::{register_always, register_member_macro, register_tag_macro, AlwaysMacro, MemberMacro};
pub use trait_graph::linearize;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::object::{Instance, Member};
use crate::tags::Keyword;
use crate::value::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrototypeKind {
    Plain,
    Trait,
}

/// A compiled type.
pub struct Prototype {
    name: Arc<str>,
    nonce: u64,
    kind: PrototypeKind,
    is_final: bool,
    base: Option<Arc<Prototype>>,
    traits: Vec<Arc<Prototype>>,
    trait_closure: Vec<Arc<Prototype>>,

    definition: Map,
    members: Map,
    own: IndexSet<String>,
    aliases: IndexMap<String, String>,
    members_by_tag: IndexMap<Keyword, Vec<String>>,
    instance_members: IndexMap<String, Member>,
    static_members: RwLock<IndexMap<String, Member>>,

    constructor: Option<Constructor>,
    compiler: Compiler,
    macro_tags: IndexMap<Keyword, MemberMacro>,
    static_constructor: Option<StaticHook>,
    defaults: Map,
    requires: IndexMap<String, Contract>,
    contributions: IndexMap<String, Vec<Contribution>>,

    memo: Mutex<HashMap<String, Value>>,
}

impl Prototype {
    pub(crate) fn from_compilation(c: Compilation) -> Arc<Self> {
        Arc::new(Self {
            name: c.name,
            nonce: c.nonce,
            kind: c.kind,
            is_final: c.is_final,
            base: c.base,
            traits: c.traits,
            trait_closure: c.trait_closure,
            definition: c.definition,
            members: c.members,
            own: c.own,
            aliases: c.aliases,
            members_by_tag: c.members_by_tag,
            instance_members: c.instance_members,
            static_members: RwLock::new(c.static_members),
            constructor: c.constructor,
            compiler: c.compiler,
            macro_tags: c.macro_tags,
            static_constructor: c.static_constructor,
            defaults: c.defaults,
            requires: c.requires,
            contributions: c.contributions,
            memo: Mutex::new(HashMap::new()),
        })
    }

    // ------------------------------------------------------------------
    // Identity and structure
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique per compiled type.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn kind(&self) -> PrototypeKind {
        self.kind
    }

    pub fn is_trait(&self) -> bool {
        self.kind == PrototypeKind::Trait
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn base(&self) -> Option<&Arc<Prototype>> {
        self.base.as_ref()
    }

    /// Traits listed directly by the definition.
    pub fn traits(&self) -> &[Arc<Prototype>] {
        &self.traits
    }

    /// Every trait in effect, inherited ones first, dependencies first.
    pub fn trait_closure(&self) -> &[Arc<Prototype>] {
        &self.trait_closure
    }

    /// True if `self` is `ancestor`, derives from it, or includes it as a
    /// trait.
    pub fn derives_from(&self, ancestor: &Prototype) -> bool {
        let mut cursor = Some(self);
        while let Some(t) = cursor {
            if t.nonce == ancestor.nonce || t.trait_closure.iter().any(|x| x.nonce == ancestor.nonce) {
                return true;
            }
            cursor = t.base.as_deref();
        }
        false
    }

    /// True if `value` is an instance of this type, a derived type, or a type
    /// including this trait.
    pub fn is_type_of(&self, value: &Value) -> bool {
        match value {
            Value::Object(instance) => instance.prototype().derives_from(self),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Merged definition (base, traits, own), before alias expansion and
    /// without generated members.
    pub fn definition(&self) -> &Map {
        &self.definition
    }

    /// Final tagged member table, aliases expanded.
    pub fn members(&self) -> &Map {
        &self.members
    }

    pub fn member_definition(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    /// Names declared by this type's own definition.
    pub fn own_names(&self) -> &IndexSet<String> {
        &self.own
    }

    /// The entries of [`definition`](Self::definition) declared by this type.
    pub fn own_definition(&self) -> Map {
        self.definition
            .iter()
            .filter(|(name, _)| self.own.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Alias name to terminal member name.
    pub fn aliases(&self) -> &IndexMap<String, String> {
        &self.aliases
    }

    /// Names of members carrying `keyword`, in definition order.
    pub fn members_by_tag(&self, keyword: Keyword) -> &[String] {
        self.members_by_tag.get(&keyword).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn instance_member(&self, name: &str) -> Option<&Member> {
        self.instance_members.get(name)
    }

    pub fn instance_members(&self) -> &IndexMap<String, Member> {
        &self.instance_members
    }

    pub fn contributions(&self, name: &str) -> &[Contribution] {
        self.contributions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_contributions(&self) -> &IndexMap<String, Vec<Contribution>> {
        &self.contributions
    }

    // ------------------------------------------------------------------
    // Compiler data
    // ------------------------------------------------------------------

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn macro_tags(&self) -> &IndexMap<Keyword, MemberMacro> {
        &self.macro_tags
    }

    pub fn static_constructor(&self) -> Option<&StaticHook> {
        self.static_constructor.as_ref()
    }

    pub fn defaults(&self) -> &Map {
        &self.defaults
    }

    pub fn requires(&self) -> &IndexMap<String, Contract> {
        &self.requires
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Allocate an instance and run the constructor chain on it.
    pub fn instantiate(self: &Arc<Self>, args: &[Value]) -> Result<Instance> {
        if self.is_trait() {
            return Err(Error::TraitNotInstantiable {
                name: self.name.to_string(),
            });
        }
        let instance = Instance::new(self.clone());
        self.construct(&instance, args)?;
        Ok(instance)
    }

    /// Run this type's constructor on an existing instance.
    pub fn construct(&self, instance: &Instance, args: &[Value]) -> Result<()> {
        match &self.constructor {
            Some(constructor) => constructor(instance, args),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Static members
    // ------------------------------------------------------------------

    pub fn get_static(self: &Arc<Self>, name: &str) -> Result<Value> {
        let member = self.static_members.read().get(name).cloned();
        match member {
            Some(member) => member.read(&Value::Type(self.clone())),
            None => Ok(Value::Undefined),
        }
    }

    pub fn set_static(self: &Arc<Self>, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let member = self.static_members.read().get(name).cloned();
        match member {
            Some(Member::Property(p)) => p.write(name, &Value::Type(self.clone()), value),
            _ => {
                self.static_members.write().insert(name.to_owned(), Member::Value(value));
                Ok(())
            }
        }
    }

    pub fn call_static(self: &Arc<Self>, name: &str, args: &[Value]) -> Result<Value> {
        match self.get_static(name)? {
            Value::Func(f) => f.call(&Value::Type(self.clone()), args),
            Value::Stream(s) => s.call(args),
            _ => Err(Error::NotCallable {
                name: format!("{}.{name}", self.name),
            }),
        }
    }

    pub(crate) fn memo_get(&self, key: &str) -> Option<Value> {
        self.memo.lock().get(key).cloned()
    }

    pub(crate) fn memo_set(&self, key: &str, value: Value) {
        self.memo.lock().insert(key.to_owned(), value);
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prototype")
            .field("name", &self.name)
            .field("nonce", &self.nonce)
            .field("kind", &self.kind)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Entry points
// ----------------------------------------------------------------------------

/// Compile a root type.
pub fn prototype(definition: Definition) -> Result<Arc<Prototype>> {
    compiler::compile(definition, None, PrototypeKind::Plain)
}

/// Compile a type deriving from `base`; it inherits the base's members and
/// compiler.
pub fn extends(base: &Arc<Prototype>, definition: Definition) -> Result<Arc<Prototype>> {
    compiler::compile(definition, Some(base.clone()), PrototypeKind::Plain)
}

pub fn define_trait(definition: Definition) -> Result<Arc<Prototype>> {
    compiler::compile(definition, None, PrototypeKind::Trait)
}

/// Compile a type and return its only instance.
pub fn singleton(definition: Definition) -> Result<Instance> {
    prototype(definition)?.instantiate(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statics_read_and_write() {
        let t = prototype(Definition::new("Counter").static_member("count", 0)).unwrap();
        t.set_static("count", 2).unwrap();
        assert_eq!(t.get_static("count").unwrap(), Value::from(2));
        assert!(t.call_static("count", &[]).is_err());
        assert_eq!(
            t.call_static("isTypeOf", &[Value::from(1)]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn derivation_is_transitive() {
        let a = prototype(Definition::new("A")).unwrap();
        let b = extends(&a, Definition::new("B")).unwrap();
        let c = extends(&b, Definition::new("C")).unwrap();
        assert!(c.derives_from(&a));
        assert!(!a.derives_from(&c));
        let instance = c.instantiate(&[]).unwrap();
        assert!(a.is_type_of(&instance.as_value()));
        assert!(a.call_static("isTypeOf", &[instance.as_value()]).unwrap().is_truthy());
    }

    #[test]
    fn singleton_builds_one_instance() {
        let s = singleton(Definition::new("Settings").member("verbose", true)).unwrap();
        assert_eq!(s.get("verbose").unwrap(), Value::Bool(true));
        assert_eq!(s.prototype().name(), "Settings");
    }

    #[test]
    fn definition_exposes_merged_members() {
        let base = prototype(Definition::new("Base").member("a", 1)).unwrap();
        let derived = extends(&base, Definition::new("Derived").member("b", 2)).unwrap();
        let keys: Vec<&String> = derived.definition().keys().collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(derived.own_definition().len(), 1);
        let def = derived.get_static("$definition").unwrap();
        assert_eq!(def.get("b"), Value::from(2));
    }
}
