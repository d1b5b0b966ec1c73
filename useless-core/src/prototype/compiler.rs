//! Compiler
//!
//! Compilation is a strict forward pipeline over one mutable
//! [`Compilation`]. Each [`Pass`] has one responsibility and runs exactly
//! once, in the order of [`Pass::ALL`].
//!
//! # Overrides
//!
//! A [`Compiler`] is a chain of override tables. A type inherits the compiler
//! of its base; a definition may add overrides (`$impl`) which then apply to
//! the rest of its own compilation and to every descendant. An override gets
//! a [`Super`] handle to the implementation it replaces, so it can wrap
//! rather than rewrite a pass.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use super::definition::{Contract, Definition, StaticHook};
use super::macros::MemberMacro;
use super::{passes, Prototype, PrototypeKind};
use crate::error::Result;
use crate::object::{Instance, Member};
use crate::tags::Keyword;
use crate::value::{Map, Value};

/// Instance constructor: initialises a freshly allocated instance.
pub type Constructor = Arc<dyn Fn(&Instance, &[Value]) -> Result<()> + Send + Sync>;

/// Replacement implementation of one pass.
pub type PassFn = Arc<dyn Fn(&mut Compilation, Super<'_>) -> Result<()> + Send + Sync>;

static NONCE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_nonce() -> u64 {
    NONCE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    ExtendWithTags,
    Flatten,
    CompilerImpl,
    ArgumentContracts,
    FinalContract,
    GenerateConstructor,
    AlwaysMacros,
    MemberMacros,
    TraitContribution,
    PrototypeMacros,
    BuiltinMembers,
    StaticConstructor,
    ExpandAliases,
    GroupByTag,
    InstallMembers,
}

impl Pass {
    pub const ALL: [Pass; 15] = [
        Pass::ExtendWithTags,
        Pass::Flatten,
        Pass::CompilerImpl,
        Pass::ArgumentContracts,
        Pass::FinalContract,
        Pass::GenerateConstructor,
        Pass::AlwaysMacros,
        Pass::MemberMacros,
        Pass::TraitContribution,
        Pass::PrototypeMacros,
        Pass::BuiltinMembers,
        Pass::StaticConstructor,
        Pass::ExpandAliases,
        Pass::GroupByTag,
        Pass::InstallMembers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pass::ExtendWithTags => "extendWithTags",
            Pass::Flatten => "flatten",
            Pass::CompilerImpl => "compilerImpl",
            Pass::ArgumentContracts => "argumentContracts",
            Pass::FinalContract => "finalContract",
            Pass::GenerateConstructor => "generateConstructor",
            Pass::AlwaysMacros => "alwaysMacros",
            Pass::MemberMacros => "memberMacros",
            Pass::TraitContribution => "traitContribution",
            Pass::PrototypeMacros => "prototypeMacros",
            Pass::BuiltinMembers => "builtinMembers",
            Pass::StaticConstructor => "staticConstructor",
            Pass::ExpandAliases => "expandAliases",
            Pass::GroupByTag => "groupByTag",
            Pass::InstallMembers => "installMembers",
        }
    }
}

// ----------------------------------------------------------------------------
// Compiler
// ----------------------------------------------------------------------------

#[derive(Default)]
struct CompilerInner {
    parent: Option<Compiler>,
    overrides: HashMap<Pass, PassFn>,
}

/// A chain of pass overrides ending in the default implementations.
#[derive(Clone, Default)]
pub struct Compiler(Arc<CompilerInner>);

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A child compiler; `overrides` shadow this compiler's passes.
    pub fn derive<I>(&self, overrides: I) -> Compiler
    where
        I: IntoIterator<Item = (Pass, PassFn)>,
    {
        Compiler(Arc::new(CompilerInner {
            parent: Some(self.clone()),
            overrides: overrides.into_iter().collect(),
        }))
    }

    /// True if this compiler or an ancestor overrides `pass`.
    pub fn overrides(&self, pass: Pass) -> bool {
        self.0.overrides.contains_key(&pass)
            || self.0.parent.as_ref().is_some_and(|p| p.overrides(pass))
    }

    pub fn run_pass(&self, pass: Pass, compilation: &mut Compilation) -> Result<()> {
        match self.0.overrides.get(&pass) {
            Some(implementation) => implementation(
                compilation,
                Super {
                    next: self.0.parent.as_ref(),
                    pass,
                },
            ),
            None => match &self.0.parent {
                Some(parent) => parent.run_pass(pass, compilation),
                None => passes::run_default(pass, compilation),
            },
        }
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut cursor = self.0.parent.as_ref();
        while let Some(c) = cursor {
            depth += 1;
            cursor = c.0.parent.as_ref();
        }
        f.debug_struct("Compiler")
            .field("overrides", &self.0.overrides.keys().collect::<Vec<_>>())
            .field("depth", &depth)
            .finish()
    }
}

/// The implementation an override replaces.
pub struct Super<'a> {
    next: Option<&'a Compiler>,
    pass: Pass,
}

impl Super<'_> {
    pub fn pass(&self) -> Pass {
        self.pass
    }

    pub fn run(&self, compilation: &mut Compilation) -> Result<()> {
        match self.next {
            Some(compiler) => compiler.run_pass(self.pass, compilation),
            None => passes::run_default(self.pass, compilation),
        }
    }
}

// ----------------------------------------------------------------------------
// Compilation state
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Base,
    Trait,
    Own,
}

/// One declaration of a member name, from the base, a trait or the type
/// itself.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub origin: Origin,
    pub source: Arc<str>,
    pub value: Value,
}

/// Working state of one compilation.
pub struct Compilation {
    pub name: Arc<str>,
    pub nonce: u64,
    pub kind: PrototypeKind,
    pub is_final: bool,
    pub base: Option<Arc<Prototype>>,
    pub compiler: Compiler,
    pub overrides: Vec<(Pass, PassFn)>,
    pub test_arguments: bool,

    /// Member table being transformed.
    pub members: Map,
    /// Names declared by this definition itself.
    pub own: IndexSet<String>,
    /// Names whose current value came unchanged from the base.
    pub inherited: IndexSet<String>,

    pub trait_values: Vec<Value>,
    pub traits: Vec<Arc<Prototype>>,
    /// Every trait in effect, base traits first, in dependency order.
    pub trait_closure: Vec<Arc<Prototype>>,
    /// Traits first contributed by this compilation.
    pub contributed_traits: Vec<Arc<Prototype>>,
    pub contributions: IndexMap<String, Vec<Contribution>>,

    pub macro_tags: IndexMap<Keyword, MemberMacro>,
    pub static_constructor: Option<StaticHook>,
    pub constructor: Option<Constructor>,
    pub defaults: Map,
    pub requires: IndexMap<String, Contract>,

    /// Snapshot of the merged definition, without built-ins, before alias
    /// expansion.
    pub definition: Map,
    /// Alias name to terminal member name.
    pub aliases: IndexMap<String, String>,
    pub members_by_tag: IndexMap<Keyword, Vec<String>>,
    pub instance_members: IndexMap<String, Member>,
    pub static_members: IndexMap<String, Member>,
}

impl Compilation {
    pub(crate) fn new(definition: Definition, base: Option<Arc<Prototype>>, kind: PrototypeKind) -> Self {
        let compiler = base.as_ref().map(|b| b.compiler().clone()).unwrap_or_default();
        Self {
            name: definition.name,
            nonce: next_nonce(),
            kind,
            is_final: definition.is_final,
            base,
            compiler,
            overrides: definition.overrides,
            test_arguments: definition.test_arguments,
            members: definition.members,
            own: IndexSet::new(),
            inherited: IndexSet::new(),
            trait_values: definition.traits,
            traits: Vec::new(),
            trait_closure: Vec::new(),
            contributed_traits: Vec::new(),
            contributions: IndexMap::new(),
            macro_tags: definition.macro_tags,
            static_constructor: definition.static_constructor,
            constructor: None,
            defaults: definition.defaults,
            requires: definition.requires,
            definition: Map::new(),
            aliases: IndexMap::new(),
            members_by_tag: IndexMap::new(),
            instance_members: IndexMap::new(),
            static_members: IndexMap::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    /// Replace (or add) a member; it no longer counts as inherited.
    pub fn set_member(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.inherited.shift_remove(&name);
        self.members.insert(name, value);
    }

    pub fn is_own(&self, name: &str) -> bool {
        self.own.contains(name)
    }
}

/// Run every pass over `definition` and freeze the result.
pub(crate) fn compile(
    definition: Definition,
    base: Option<Arc<Prototype>>,
    kind: PrototypeKind,
) -> Result<Arc<Prototype>> {
    let mut compilation = Compilation::new(definition, base, kind);
    for pass in Pass::ALL {
        debug!(name = %compilation.name, pass = pass.name(), "compiler pass");
        let compiler = compilation.compiler.clone();
        compiler.run_pass(pass, &mut compilation)?;
    }
    Ok(Prototype::from_compilation(compilation))
}
