//! Default pass implementations.
//!
//! Each function below is the built-in behaviour of one [`Pass`]. Overrides
//! installed through `Definition::compiler_pass` reach these through
//! [`Super::run`](super::Super::run).

use std::mem;
use std::sync::Arc;

use indexmap::IndexMap;

use super::compiler::{Compilation, Constructor, Contribution, Origin, Pass};
use super::definition::StaticHook;
use super::{macros, trait_graph, Prototype, PrototypeKind};
use crate::error::{Error, Result};
use crate::object::{coerce_to_property_definition, memoized, Member};
use crate::tags::{
    self, Keyword, ALIAS, ARGUMENTS, BUILTIN, FINAL, MEMOIZED, OBSERVABLE_PROPERTY, PROPERTY, STATIC,
};
use crate::value::{Function, Map, Value, ValueKind};

/// Names reserved for generated members.
pub(crate) const BUILTIN_NAMES: [&str; 5] = ["isTypeOf", "isInstanceOf", "$base", "$definition", "$"];

pub(crate) fn run_default(pass: Pass, c: &mut Compilation) -> Result<()> {
    match pass {
        Pass::ExtendWithTags => extend_with_tags(c),
        Pass::Flatten => flatten(c),
        Pass::CompilerImpl => compiler_impl(c),
        Pass::ArgumentContracts => argument_contracts(c),
        Pass::FinalContract => final_contract(c),
        Pass::GenerateConstructor => generate_constructor(c),
        Pass::AlwaysMacros => always_macros(c),
        Pass::MemberMacros => member_macros(c),
        Pass::TraitContribution => trait_contribution(c),
        Pass::PrototypeMacros => prototype_macros(c),
        Pass::BuiltinMembers => builtin_members(c),
        Pass::StaticConstructor => static_constructor(c),
        Pass::ExpandAliases => expand_aliases(c),
        Pass::GroupByTag => group_by_tag(c),
        Pass::InstallMembers => install_members(c),
    }
}

// ----------------------------------------------------------------------------
// Keyword groups
// ----------------------------------------------------------------------------

/// The keyword a member name stands for, when the member is a group
/// (`"$static": { ... }`).
fn group_keyword(name: &str, value: &Value) -> Option<Keyword> {
    let keyword = Keyword::lookup(name)?;
    matches!(value, Value::Map(_)).then_some(keyword)
}

fn extend_with_tags(c: &mut Compilation) -> Result<()> {
    let members = mem::take(&mut c.members);
    c.members = members
        .into_iter()
        .map(|(name, value)| {
            let value = match group_keyword(&name, &value) {
                Some(keyword) => tag_group(&value, &[keyword]),
                None => value,
            };
            (name, value)
        })
        .collect();
    Ok(())
}

/// Apply `applied` to every entry of a group; nested groups accumulate.
fn tag_group(group: &Value, applied: &[Keyword]) -> Value {
    let Some(entries) = group.as_map() else {
        return group.clone();
    };
    let tagged: Map = entries
        .iter()
        .map(|(name, value)| {
            let value = match group_keyword(name, value) {
                Some(keyword) => {
                    let mut nested = applied.to_vec();
                    nested.push(keyword);
                    tag_group(value, &nested)
                }
                None => applied.iter().fold(value.clone(), |v, k| {
                    if k.is(&v) {
                        v
                    } else {
                        tags::add(&v, *k, Value::Bool(true))
                    }
                }),
            };
            (name.clone(), value)
        })
        .collect();
    Value::from(tagged)
}

fn flatten(c: &mut Compilation) -> Result<()> {
    let members = mem::take(&mut c.members);
    let mut flat = Map::new();
    hoist(members, &mut flat);
    c.own = flat.keys().cloned().collect();
    c.members = flat;
    Ok(())
}

fn hoist(entries: Map, into: &mut Map) {
    for (name, value) in entries {
        if group_keyword(&name, &value).is_some() {
            if let Value::Map(inner) = value {
                hoist((*inner).clone(), into);
            }
        } else {
            into.insert(name, value);
        }
    }
}

// ----------------------------------------------------------------------------
// Compiler, contracts, constructor
// ----------------------------------------------------------------------------

fn compiler_impl(c: &mut Compilation) -> Result<()> {
    if !c.overrides.is_empty() {
        let overrides = mem::take(&mut c.overrides);
        c.compiler = c.compiler.derive(overrides);
    }
    Ok(())
}

fn argument_contracts(c: &mut Compilation) -> Result<()> {
    if !c.test_arguments {
        return Ok(());
    }
    let names: Vec<String> = c.members.keys().cloned().collect();
    for name in names {
        let Some(value) = c.members.get(&name).cloned() else {
            continue;
        };
        let (Some(Value::List(declared)), Value::Func(body)) = (ARGUMENTS.get(&value), tags::unwrap(&value))
        else {
            continue;
        };
        let expected = declared
            .iter()
            .map(|kind| match kind {
                k if tags::is_wildcard(k) => Ok(None),
                Value::Str(s) if s.as_ref() == "any" || s.as_ref() == "$any" => Ok(None),
                Value::Str(s) => s.parse::<ValueKind>().map(Some),
                other => Err(Error::custom(format!("`{name}`: bad argument contract {other}"))),
            })
            .collect::<Result<Vec<Option<ValueKind>>>>()?;
        let member = format!("{}.{name}", c.name);
        let checked = Function::named(&name, move |this, args| {
            for (index, expected) in expected.iter().enumerate() {
                let Some(expected) = expected else { continue };
                let actual = args.get(index).map(Value::kind).unwrap_or(ValueKind::Undefined);
                if actual != *expected {
                    return Err(Error::ArgumentContract {
                        member: member.clone(),
                        index,
                        expected: expected.name().to_owned(),
                        actual: actual.name().to_owned(),
                    });
                }
            }
            body.call(this, args)
        });
        c.members.insert(name, tags::extend(&value, &Value::Func(checked)));
    }
    Ok(())
}

fn final_contract(c: &mut Compilation) -> Result<()> {
    let Some(base) = &c.base else {
        return Ok(());
    };
    if base.is_final() {
        return Err(Error::DeriveFromFinal {
            name: c.name.to_string(),
            base: base.name().to_owned(),
        });
    }
    let overridden: Vec<String> = c
        .own
        .iter()
        .filter(|name| base.definition().get(*name).is_some_and(|v| FINAL.matches(v)))
        .cloned()
        .collect();
    if !overridden.is_empty() {
        return Err(Error::FinalOverride {
            name: c.name.to_string(),
            members: overridden,
        });
    }
    Ok(())
}

fn generate_constructor(c: &mut Compilation) -> Result<()> {
    if let Some(base) = c.base.clone() {
        let mut merged = Map::new();
        for (name, value) in base.definition() {
            if !c.own.contains(name) {
                merged.insert(name.clone(), value.clone());
                c.inherited.insert(name.clone());
            }
        }
        merged.extend(mem::take(&mut c.members));
        c.members = merged;
    }

    let explicit = match c.members.get("constructor") {
        Some(value) if c.own.contains("constructor") => tags::unwrap(value).as_func().cloned(),
        _ => None,
    };
    if explicit.is_some() {
        c.members.shift_remove("constructor");
        c.own.shift_remove("constructor");
    }
    if c.constructor.is_some() {
        return Ok(());
    }

    let constructor: Constructor = if c.kind == PrototypeKind::Trait {
        let name = c.name.to_string();
        Arc::new(move |_, _| Err(Error::TraitNotInstantiable { name: name.clone() }))
    } else if let Some(body) = explicit {
        Arc::new(move |instance, args| body.call(&instance.as_value(), args).map(drop))
    } else if let Some(base) = c.base.clone() {
        Arc::new(move |instance, args| base.construct(instance, args))
    } else {
        Arc::new(|instance, args| {
            if let Some(Value::Map(config)) = args.first() {
                for (name, value) in config.iter() {
                    instance.set(name, value.clone())?;
                }
            }
            Ok(())
        })
    };
    c.constructor = Some(constructor);
    Ok(())
}

// ----------------------------------------------------------------------------
// Macros
// ----------------------------------------------------------------------------

fn always_macros(c: &mut Compilation) -> Result<()> {
    for transform in macros::always() {
        transform(c)?;
    }
    Ok(())
}

fn member_macros(c: &mut Compilation) -> Result<()> {
    let names: Vec<String> = c.own.iter().cloned().collect();
    for name in names {
        let Some(mut value) = c.members.get(&name).cloned() else {
            continue;
        };
        for transform in macros::by_name(&name) {
            value = transform(c, &name, value)?;
        }
        for keyword in tags::keywords(&value) {
            for transform in macros::by_tag(keyword) {
                value = transform(c, &name, value)?;
            }
        }
        c.members.insert(name, value);
    }
    Ok(())
}

fn prototype_macros(c: &mut Compilation) -> Result<()> {
    let mut table = c
        .base
        .as_ref()
        .map(|base| base.macro_tags().clone())
        .unwrap_or_default();
    table.extend(mem::take(&mut c.macro_tags));
    c.macro_tags = table;
    if c.macro_tags.is_empty() {
        return Ok(());
    }

    let names: Vec<String> = c
        .members
        .keys()
        .filter(|name| !c.inherited.contains(*name))
        .cloned()
        .collect();
    for name in names {
        let Some(mut value) = c.members.get(&name).cloned() else {
            continue;
        };
        for keyword in tags::keywords(&value) {
            if let Some(transform) = c.macro_tags.get(&keyword).cloned() {
                value = transform(c, &name, value)?;
            }
        }
        c.members.insert(name, value);
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

fn trait_contribution(c: &mut Compilation) -> Result<()> {
    let mut listed = Vec::with_capacity(c.trait_values.len());
    for (index, value) in c.trait_values.iter().enumerate() {
        match value {
            Value::Type(t) if t.is_trait() => listed.push(t.clone()),
            _ => {
                return Err(Error::InvalidTraitValue {
                    name: c.name.to_string(),
                    index,
                })
            }
        }
    }
    c.traits = listed;

    let base_closure: Vec<Arc<Prototype>> = c
        .base
        .as_ref()
        .map(|base| base.trait_closure().to_vec())
        .unwrap_or_default();
    c.contributed_traits = trait_graph::linearize(&c.traits)
        .into_iter()
        .filter(|t| !base_closure.iter().any(|b| b.nonce() == t.nonce()))
        .collect();

    let mut pool: IndexMap<String, Vec<Contribution>> = match &c.base {
        Some(base) => base
            .all_contributions()
            .iter()
            .map(|(name, list)| {
                let relabelled = list
                    .iter()
                    .map(|entry| Contribution {
                        origin: Origin::Base,
                        ..entry.clone()
                    })
                    .collect();
                (name.clone(), relabelled)
            })
            .collect(),
        None => IndexMap::new(),
    };

    // later traits overwrite earlier ones; own members are never touched
    let contributed = c.contributed_traits.clone();
    for t in &contributed {
        let source: Arc<str> = Arc::from(t.name());
        for (name, value) in t.own_definition() {
            pool.entry(name.clone()).or_default().push(Contribution {
                origin: Origin::Trait,
                source: source.clone(),
                value: value.clone(),
            });
            if !c.own.contains(&name) {
                c.set_member(name, value);
            }
        }
    }

    for name in &c.own {
        let Some(value) = c.members.get(name) else {
            continue;
        };
        let entries = pool.entry(name.clone()).or_default();
        entries.retain(|entry| entry.origin != Origin::Base || tags::is_stream_definition(&entry.value));
        entries.push(Contribution {
            origin: Origin::Own,
            source: c.name.clone(),
            value: value.clone(),
        });
    }
    c.contributions = pool;

    let mut defaults = c.base.as_ref().map(|b| b.defaults().clone()).unwrap_or_default();
    let mut requires = c.base.as_ref().map(|b| b.requires().clone()).unwrap_or_default();
    for t in &contributed {
        defaults.extend(t.defaults().iter().map(|(k, v)| (k.clone(), v.clone())));
        requires.extend(t.requires().iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    defaults.extend(mem::take(&mut c.defaults));
    requires.extend(mem::take(&mut c.requires));
    c.defaults = defaults;
    c.requires = requires;

    c.trait_closure = base_closure.into_iter().chain(contributed).collect();
    Ok(())
}

// ----------------------------------------------------------------------------
// Built-ins and static constructor
// ----------------------------------------------------------------------------

fn builtin_members(c: &mut Compilation) -> Result<()> {
    if let Some(name) = BUILTIN_NAMES.iter().find(|name| c.own.contains(**name)) {
        return Err(Error::BuiltinOverride {
            member: (*name).to_owned(),
        });
    }

    let builtin = |v: Value| BUILTIN.tag(v);

    let is_type_of = Function::named("isTypeOf", |this, args| {
        let candidate = args.first().cloned().unwrap_or_default();
        Ok(Value::Bool(this.as_type().is_some_and(|t| t.is_type_of(&candidate))))
    });
    c.members.insert("isTypeOf".into(), builtin(STATIC.tag(is_type_of)));

    let is_instance_of = Function::named("isInstanceOf", |this, args| {
        Ok(Value::Bool(match args.first() {
            Some(Value::Type(t)) => t.is_type_of(this),
            _ => false,
        }))
    });
    c.members.insert("isInstanceOf".into(), builtin(Value::Func(is_instance_of)));

    let base = Function::named("$base", |this, _| {
        Ok(this
            .as_type()
            .and_then(|t| t.base().cloned())
            .map(Value::Type)
            .unwrap_or_default())
    });
    c.members.insert("$base".into(), builtin(STATIC.tag(PROPERTY.tag(base))));

    let definition = Function::named("$definition", |this, _| {
        Ok(this
            .as_type()
            .map(|t| Value::from(t.definition().clone()))
            .unwrap_or_default())
    });
    c.members.insert("$definition".into(), builtin(STATIC.tag(PROPERTY.tag(definition))));

    let context = Function::named("$", |this, _| {
        let Value::Object(instance) = this else {
            return Ok(Value::Undefined);
        };
        let mut bound = Map::new();
        for (name, member) in instance.prototype().instance_members() {
            if let Member::Method(f) = member {
                bound.insert(name.clone(), Value::Func(f.bind_weak(instance)));
            }
        }
        for name in instance.own_keys() {
            match instance.own_member(&name) {
                Some(Member::Value(Value::Func(f)) | Member::Method(f)) => {
                    bound.insert(name, Value::Func(f.bind_weak(instance)));
                }
                _ => {}
            }
        }
        Ok(Value::from(bound))
    });
    c.members.insert("$".into(), builtin(PROPERTY.tag(context)));
    Ok(())
}

fn static_constructor(c: &mut Compilation) -> Result<()> {
    let hooks: Vec<StaticHook> = c
        .contributed_traits
        .iter()
        .filter_map(|t| t.static_constructor().cloned())
        .chain(c.static_constructor.clone())
        .collect();
    for hook in hooks {
        hook(c)?;
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Aliases
// ----------------------------------------------------------------------------

fn alias_target(value: &Value) -> Option<String> {
    match ALIAS.get(value) {
        Some(Value::Str(target)) => Some(target.to_string()),
        _ => tags::unwrap(value).as_str().map(str::to_owned),
    }
}

/// Follow `alias` to the first member that is not itself an alias.
fn resolve_alias(members: &Map, alias: &str) -> Result<String> {
    let mut chain = vec![alias.to_owned()];
    let mut current = members.get(alias).cloned().unwrap_or_default();
    loop {
        let Some(target) = alias_target(&current) else {
            return Err(Error::UnknownAliasTarget {
                alias: alias.to_owned(),
                target: current.to_string(),
            });
        };
        if chain.contains(&target) {
            chain.push(target);
            return Err(Error::AliasCycle { chain });
        }
        match members.get(&target) {
            None => {
                return Err(Error::UnknownAliasTarget {
                    alias: alias.to_owned(),
                    target,
                })
            }
            Some(next) if ALIAS.is(next) => {
                current = next.clone();
                chain.push(target);
            }
            Some(_) => return Ok(target),
        }
    }
}

fn write_through(this: &Value, name: &str, value: Value) -> Result<()> {
    match this {
        Value::Object(instance) => instance.set(name, value),
        Value::Type(t) => t.set_static(name, value),
        other => Err(Error::custom(format!("cannot write `{name}` on {other}"))),
    }
}

fn expand_aliases(c: &mut Compilation) -> Result<()> {
    c.definition = c
        .members
        .iter()
        .filter(|(_, value)| !BUILTIN.is(value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    // resolve everything before rewriting anything
    let mut resolved = Vec::new();
    for (name, value) in &c.members {
        if ALIAS.is(value) {
            resolved.push((name.clone(), resolve_alias(&c.members, name)?));
        }
    }

    for (alias, terminal) in resolved {
        let target = c.members.get(&terminal).cloned().unwrap_or_default();
        let expanded = if PROPERTY.is(&target) || OBSERVABLE_PROPERTY.is(&target) {
            let (read, write) = (terminal.clone(), terminal.clone());
            let get = Function::named(&alias, move |this, _| this.property(&read));
            let set = Function::named(&alias, move |this, args| {
                write_through(this, &write, args.first().cloned().unwrap_or_default())?;
                Ok(Value::Undefined)
            });
            let record = Value::map([("get", get), ("set", set)]);
            tags::extend(&tags::omit(&target, &[OBSERVABLE_PROPERTY]), &PROPERTY.tag(record))
        } else {
            target
        };
        c.members.insert(alias.clone(), expanded);
        c.aliases.insert(alias, terminal);
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Indexing and installation
// ----------------------------------------------------------------------------

fn group_by_tag(c: &mut Compilation) -> Result<()> {
    let mut by_tag: IndexMap<Keyword, Vec<String>> = IndexMap::new();
    for (name, value) in &c.members {
        tags::each(value, |keyword, _| by_tag.entry(keyword).or_default().push(name.clone()));
    }
    c.members_by_tag = by_tag;
    Ok(())
}

fn install_members(c: &mut Compilation) -> Result<()> {
    for (name, value) in &c.members {
        let subject = tags::unwrap(value);
        let member = match &subject {
            Value::Func(getter) if MEMOIZED.is(value) => Member::Property(memoized(name, getter.clone())),
            _ if PROPERTY.is(value) => Member::Property(coerce_to_property_definition(name, &subject)),
            Value::Func(f) => Member::Method(f.clone()),
            _ => Member::Value(subject.clone()),
        };
        if STATIC.is(value) {
            c.static_members.insert(name.clone(), member);
        } else {
            c.instance_members.insert(name.clone(), member);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prototype::{define_trait, extends, prototype, Definition};

    #[test]
    fn keyword_groups_are_flattened_and_tagged() {
        let def = Definition::new("Grouped").member(
            "$static",
            Value::map([
                ("answer", Value::from(42)),
                ("$property", Value::map([("pi", Value::from(3))])),
            ]),
        );
        let t = prototype(def).unwrap();
        assert_eq!(t.get_static("answer").unwrap(), Value::from(42));
        assert_eq!(t.get_static("pi").unwrap(), Value::from(3));
        let pi = &t.definition()["pi"];
        assert!(STATIC.is(pi) && PROPERTY.is(pi));
        assert!(t.own_names().contains("answer"));
        assert!(!t.own_names().contains("$static"));
    }

    #[test]
    fn derived_inherits_members_and_base_link() {
        let base = prototype(Definition::new("Base").member("x", 1)).unwrap();
        let derived = extends(&base, Definition::new("Derived")).unwrap();
        let d = derived.instantiate(&[]).unwrap();
        assert_eq!(d.get("x").unwrap(), Value::from(1));
        assert!(derived.get_static("$base").unwrap().same(&Value::Type(base.clone())));
        assert!(base.is_type_of(&d.as_value()));
    }

    #[test]
    fn final_type_cannot_be_derived() {
        let sealed = prototype(Definition::new("Sealed").mark_final()).unwrap();
        let err = extends(&sealed, Definition::new("Breach")).unwrap_err();
        assert!(matches!(err, Error::DeriveFromFinal { .. }));
    }

    #[test]
    fn final_members_cannot_be_overridden() {
        let base = prototype(
            Definition::new("Guarded")
                .member("a", FINAL.tag(1))
                .member("b", FINAL.tag(2))
                .member("c", 3),
        )
        .unwrap();
        let err = extends(&base, Definition::new("Sneaky").member("a", 0).member("b", 0).member("c", 0))
            .unwrap_err();
        match err {
            Error::FinalOverride { members, .. } => assert_eq!(members, ["a", "b"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn default_constructor_extends_from_config() {
        let t = prototype(Definition::new("Configured").member("x", 0)).unwrap();
        let i = t.instantiate(&[Value::map([("x", 5), ("y", 6)])]).unwrap();
        assert_eq!(i.get("x").unwrap(), Value::from(5));
        assert_eq!(i.get("y").unwrap(), Value::from(6));
    }

    #[test]
    fn explicit_constructor_runs_with_instance_as_this() {
        let t = prototype(Definition::new("Explicit").constructor(|this, args| {
            if let Value::Object(i) = this {
                i.set("first", args.first().cloned().unwrap_or_default())?;
            }
            Ok(Value::Undefined)
        }))
        .unwrap();
        let i = t.instantiate(&[Value::from("hello")]).unwrap();
        assert_eq!(i.get("first").unwrap(), Value::from("hello"));
        assert!(!t.definition().contains_key("constructor"));
    }

    #[test]
    fn traits_are_not_instantiable() {
        let t = define_trait(Definition::new("Mixin")).unwrap();
        assert!(matches!(t.instantiate(&[]), Err(Error::TraitNotInstantiable { .. })));
    }

    #[test]
    fn trait_members_yield_to_own_members() {
        let greet = define_trait(
            Definition::new("Greets")
                .member("greeting", "hello")
                .member("shared", "from trait"),
        )
        .unwrap();
        let t = prototype(
            Definition::new("Greeter")
                .with_trait(greet.clone())
                .member("shared", "own"),
        )
        .unwrap();
        let i = t.instantiate(&[]).unwrap();
        assert_eq!(i.get("greeting").unwrap(), Value::from("hello"));
        assert_eq!(i.get("shared").unwrap(), Value::from("own"));
        assert_eq!(t.contributions("shared").len(), 2);
        assert!(greet.is_type_of(&i.as_value()));
        assert!(i.call("isInstanceOf", &[Value::Type(greet)]).unwrap().is_truthy());
    }

    #[test]
    fn undefined_trait_entry_is_rejected() {
        let err = prototype(Definition::new("Broken").with_trait(Value::Undefined)).unwrap_err();
        assert!(matches!(err, Error::InvalidTraitValue { index: 0, .. }));
    }

    #[test]
    fn builtins_cannot_be_overridden() {
        let err = prototype(Definition::new("Rude").member("isTypeOf", 1)).unwrap_err();
        assert!(matches!(err, Error::BuiltinOverride { ref member } if member == "isTypeOf"));
    }

    #[test]
    fn aliases_follow_chains_to_the_terminal_member() {
        let t = prototype(
            Definition::new("Aliased")
                .method("run", |_, _| Ok(Value::from("ran")))
                .member("go", ALIAS.tag("run"))
                .member("start", ALIAS.tag("go"))
                .property("size", 3)
                .member("length", ALIAS.tag("size")),
        )
        .unwrap();
        let i = t.instantiate(&[]).unwrap();
        assert_eq!(i.call("start", &[]).unwrap(), Value::from("ran"));
        assert_eq!(i.get("length").unwrap(), Value::from(3));
        assert_eq!(t.aliases()["start"], "run");
        assert!(ALIAS.is(&t.definition()["start"]));
    }

    #[test]
    fn alias_cycles_and_unknown_targets_fail() {
        let err = prototype(
            Definition::new("Loop")
                .member("a", ALIAS.tag("b"))
                .member("b", ALIAS.tag("a")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AliasCycle { ref chain } if chain == &["a", "b", "a"]));

        let err = prototype(Definition::new("Dangling").member("a", ALIAS.tag("nowhere"))).unwrap_err();
        assert!(matches!(err, Error::UnknownAliasTarget { ref target, .. } if target == "nowhere"));
    }

    #[test]
    fn argument_contracts_check_kinds() {
        let t = prototype(
            Definition::new("Checked").test_arguments().member(
                "scale",
                ARGUMENTS.tag_with(
                    Value::list(["number", "any"]),
                    Value::func(|_, args| Ok(args[0].clone())),
                ),
            ),
        )
        .unwrap();
        let i = t.instantiate(&[]).unwrap();
        assert_eq!(i.call("scale", &[Value::from(2), Value::Null]).unwrap(), Value::from(2));
        let err = i.call("scale", &[Value::from("two")]).unwrap_err();
        assert!(matches!(err, Error::ArgumentContract { index: 0, .. }));
    }

    #[test]
    fn members_are_indexed_by_tag() {
        let t = prototype(
            Definition::new("Indexed")
                .static_member("a", 1)
                .static_member("b", 2)
                .member("c", 3),
        )
        .unwrap();
        assert_eq!(t.members_by_tag(STATIC), ["a", "b", "isTypeOf", "$base", "$definition"]);
        assert!(t.members_by_tag(FINAL).is_empty());
    }

    #[test]
    fn memoized_static_property_is_cached_on_the_type() {
        let counter = Arc::new(std::sync::atomic::AtomicI32::new(0));
        let seen = counter.clone();
        let t = prototype(Definition::new("Cached").member(
            "heavy",
            STATIC.tag(MEMOIZED.tag(Value::func(move |_, _| {
                Ok(Value::from(seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst)))
            }))),
        ))
        .unwrap();
        assert_eq!(t.get_static("heavy").unwrap(), Value::from(0));
        assert_eq!(t.get_static("heavy").unwrap(), Value::from(0));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
