//! Declarative type definitions.
//!
//! A [`Definition`] is the input of the compiler: a named, ordered table of
//! members (plain or tagged values) plus the directives that steer
//! compilation (traits, local macro tags, compiler overrides, defaults,
//! requirements).

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::compiler::{Compilation, Pass, PassFn, Super};
use super::macros::MemberMacro;
use super::Prototype;
use crate::error::Result;
use crate::tags::{Keyword, PROPERTY, STATIC};
use crate::value::{Map, Value, ValueKind};

/// Compile-time hook run once per compiled type (`$constructor`).
pub type StaticHook = Arc<dyn Fn(&mut Compilation) -> Result<()> + Send + Sync>;

/// A requirement checked against a finished component instance.
#[derive(Clone)]
pub enum Contract {
    /// Anything but `Undefined`.
    Defined,
    Kind(ValueKind),
    InstanceOf(Arc<Prototype>),
    Predicate {
        description: Arc<str>,
        check: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
    },
}

impl Contract {
    pub fn predicate<F>(description: &str, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Contract::Predicate {
            description: Arc::from(description),
            check: Arc::new(check),
        }
    }

    pub fn check(&self, value: &Value) -> bool {
        match self {
            Contract::Defined => !value.is_undefined(),
            Contract::Kind(kind) => value.kind() == *kind,
            Contract::InstanceOf(prototype) => prototype.is_type_of(value),
            Contract::Predicate { check, .. } => check(value),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Contract::Defined => "a defined value".to_owned(),
            Contract::Kind(kind) => format!("a {kind}"),
            Contract::InstanceOf(prototype) => format!("an instance of {}", prototype.name()),
            Contract::Predicate { description, .. } => description.to_string(),
        }
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Contract({})", self.describe())
    }
}

/// The declared surface of one type, before compilation.
pub struct Definition {
    pub(crate) name: Arc<str>,
    pub(crate) members: Map,
    pub(crate) traits: Vec<Value>,
    pub(crate) macro_tags: IndexMap<Keyword, MemberMacro>,
    pub(crate) overrides: Vec<(Pass, PassFn)>,
    pub(crate) test_arguments: bool,
    pub(crate) is_final: bool,
    pub(crate) static_constructor: Option<StaticHook>,
    pub(crate) defaults: Map,
    pub(crate) requires: IndexMap<String, Contract>,
}

impl Definition {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            members: Map::new(),
            traits: Vec::new(),
            macro_tags: IndexMap::new(),
            overrides: Vec::new(),
            test_arguments: false,
            is_final: false,
            static_constructor: None,
            defaults: Map::new(),
            requires: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a member. Keyword-named map members (`"$static": {...}`) are
    /// keyword groups and get expanded by the compiler.
    pub fn member(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }

    pub fn method<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let f = crate::value::Function::named(&name, body);
        self.member(name, f)
    }

    /// Shorthand for a `$property` member.
    pub fn property(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.member(name, PROPERTY.tag(value))
    }

    /// Shorthand for a `$static` member.
    pub fn static_member(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.member(name, STATIC.tag(value))
    }

    /// Explicit instance constructor, called with the new instance as `this`.
    pub fn constructor<F>(self, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.method("constructor", body)
    }

    /// Append a trait. Anything but a compiled type fails at compile time.
    pub fn with_trait(mut self, value: impl Into<Value>) -> Self {
        self.traits.push(value.into());
        self
    }

    pub fn traits<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.traits.extend(values.into_iter().map(Into::into));
        self
    }

    /// Register a macro for members tagged `keyword`, local to this type and
    /// its descendants (`$macroTags`).
    pub fn macro_tag<F>(mut self, keyword: Keyword, transform: F) -> Self
    where
        F: Fn(&Compilation, &str, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.macro_tags.insert(keyword, Arc::new(transform));
        self
    }

    /// Override one compiler pass for this type and its descendants (`$impl`).
    /// The override receives the implementation it replaces as `Super`.
    pub fn compiler_pass<F>(mut self, pass: Pass, implementation: F) -> Self
    where
        F: Fn(&mut Compilation, Super<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.overrides.push((pass, Arc::new(implementation)));
        self
    }

    /// Check `$arguments` contracts on every call (`$testArguments`).
    pub fn test_arguments(mut self) -> Self {
        self.test_arguments = true;
        self
    }

    /// Forbid deriving from this type.
    pub fn mark_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn static_constructor<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Compilation) -> Result<()> + Send + Sync + 'static,
    {
        self.static_constructor = Some(Arc::new(hook));
        self
    }

    /// Component default (`$defaults`), deep-cloned into each instance.
    pub fn default(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Component requirement (`$requires`), checked before `init`.
    pub fn require(mut self, name: impl Into<String>, contract: Contract) -> Self {
        self.requires.insert(name.into(), contract);
        self
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("traits", &self.traits.len())
            .finish()
    }
}
