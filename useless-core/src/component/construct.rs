//! The component constructor.
//!
//! # Algorithm
//!
//! 1. Merge `$defaults` (deep-cloned) with the configuration map. An
//!    `init: false` entry suppresses the automatic `init()` call.
//! 2. Bind every method except `init`, `destroy` and `$raw` ones to the
//!    instance, so detached calls still see the right `this`.
//! 3. Each `$observableProperty` gets a backing observable `<name>Change` and
//!    an accessor reading and writing through it.
//! 4. Each stream-definition member gets one stream. Every function declared
//!    under that name, by the base, a trait or the type itself, becomes a
//!    default listener.
//! 5. Tag wrappers run in a fixed order: `$bindable`, `$debounce`,
//!    `$throttle`, `$memoize`, `$interlocked`, `$memoizeCPS`.
//! 6. `init` and `destroy` are routed through the lifecycle.
//! 7. Remaining configuration keys become fields.
//! 8. Aliases are re-pointed at whatever step 7 left behind.
//! 9. `$requires` contracts are checked.
//! 10. Default listeners subscribe and configured stream values are written.
//! 11. `init()` runs unless suppressed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use tracing::debug;

use super::bindable::{hook_names, Bindable};
use super::handle::Component;
use super::lifecycle::Lifecycle;
use super::wrappers::{debounce, memoize, memoize_cps, throttle};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::object::{Instance, Member, PropertyDefinition};
use crate::prototype::Prototype;
use crate::stream::{Stream, StreamKind, StreamOptions};
use crate::tags::{
    self, Keyword, BINDABLE, DEBOUNCE, INTERLOCKED, MEMOIZE, MEMOIZE_CPS, OBSERVABLE_PROPERTY, PROPERTY,
    RAW, STATIC, THROTTLE,
};
use crate::task::interlocked;
use crate::value::{Function, Map, Value};

const WRAPPER_ORDER: [Keyword; 6] = [BINDABLE, DEBOUNCE, THROTTLE, MEMOIZE, INTERLOCKED, MEMOIZE_CPS];

/// Every function declared under `name`, in contribution order. Falls back to
/// the final member when nothing was contributed.
pub(super) fn declared_functions(prototype: &Prototype, name: &str) -> Vec<Function> {
    let mut found: Vec<Function> = Vec::new();
    let candidates = prototype
        .contributions(name)
        .iter()
        .map(|c| tags::unwrap(&c.value))
        .chain(prototype.member_definition(name).map(tags::unwrap));
    for candidate in candidates {
        if let Value::Func(f) = candidate {
            if !found.iter().any(|g| g.ptr_eq(&f)) {
                found.push(f);
            }
        }
    }
    found
}

fn stream_members(prototype: &Prototype) -> IndexSet<String> {
    prototype
        .members()
        .iter()
        .filter(|(name, value)| {
            !prototype.aliases().contains_key(*name)
                && !STATIC.is(value)
                && (tags::is_stream_definition(value)
                    || prototype
                        .contributions(name)
                        .iter()
                        .any(|c| tags::is_stream_definition(&c.value)))
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// The declaration a stream is built from: the member itself, or the last
/// stream definition contributed under its name.
fn canonical_declaration(prototype: &Prototype, name: &str) -> Value {
    match prototype.member_definition(name) {
        Some(value) if tags::is_stream_definition(value) => value.clone(),
        _ => prototype
            .contributions(name)
            .iter()
            .rev()
            .find(|c| tags::is_stream_definition(&c.value))
            .map(|c| c.value.clone())
            .unwrap_or_default(),
    }
}

/// A map configured for a member whose default is an instance becomes an
/// instance of the same type.
fn coerce_config(declared: &Value, given: &Value) -> Result<Value> {
    match (declared, given) {
        (Value::Object(default), Value::Map(_)) => {
            Ok(Value::Object(default.prototype().instantiate(&[given.clone()])?))
        }
        _ => Ok(given.clone()),
    }
}

fn window(data: &Value, fallback_ms: u64) -> Duration {
    match data.as_f64() {
        Some(ms) if ms >= 0.0 => Duration::from_millis(ms as u64),
        _ => Duration::from_millis(fallback_ms),
    }
}

fn wire_bindable(prototype: &Prototype, bindable: &Bindable) -> Result<()> {
    let [before, after, intercept, once_before, once_after] = hook_names(bindable.name());
    for hook in declared_functions(prototype, &before) {
        bindable.on_before(&hook)?;
    }
    for hook in declared_functions(prototype, &after) {
        bindable.on_after(&hook)?;
    }
    for hook in declared_functions(prototype, &intercept) {
        bindable.intercept(hook);
    }
    for hook in declared_functions(prototype, &once_before) {
        bindable.once_before(&hook)?;
    }
    for hook in declared_functions(prototype, &once_after) {
        bindable.once_after(&hook)?;
    }
    Ok(())
}

pub(crate) fn construct_component(instance: &Instance, args: &[Value]) -> Result<()> {
    let prototype: Arc<Prototype> = instance.prototype().clone();
    let name = prototype.name().to_owned();
    let aliases = prototype.aliases();

    let mut cfg: Map = prototype
        .defaults()
        .iter()
        .map(|(key, value)| (key.clone(), value.deep_clone()))
        .collect();
    if let Some(Value::Map(given)) = args.first() {
        cfg.extend(given.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    let skip_init = matches!(cfg.get("init"), Some(Value::Bool(false)));
    cfg.shift_remove("init");
    cfg.shift_remove("destroy");

    let lifecycle = Arc::new(Lifecycle::new(Value::from(cfg.clone())));
    if !instance.install_lifecycle(lifecycle.clone()) {
        return Err(Error::AlreadyInitialized { name });
    }

    let streams = stream_members(&prototype);
    let mut consumed: HashSet<String> = HashSet::new();
    let mut listeners: Vec<(Stream, Function)> = Vec::new();
    let mut writes: Vec<(Stream, Value)> = Vec::new();

    // this-binding
    for (member, value) in prototype.instance_members() {
        let Member::Method(f) = value else {
            continue;
        };
        let raw = prototype.member_definition(member).is_some_and(|v| RAW.is(v));
        if raw || member == "init" || member == "destroy" || streams.contains(member) || aliases.contains_key(member) {
            continue;
        }
        instance.put(member, Member::Method(f.bind_weak(instance)));
    }

    // observable properties
    for property in prototype.members_by_tag(OBSERVABLE_PROPERTY) {
        if aliases.contains_key(property) {
            continue;
        }
        let declared = prototype.member_definition(property).map(tags::unwrap).unwrap_or_default();
        let initial = match cfg.get(property) {
            Some(given) => coerce_config(&declared, given)?,
            None => declared.deep_clone(),
        };
        let stream = Stream::observable_with(initial, StreamOptions::default());
        stream.set_context(instance);

        let change = format!("{property}Change");
        instance.put(&change, Member::Value(Value::Stream(stream.clone())));
        lifecycle.add_stream(&change, stream.clone());

        let (read, write) = (stream.clone(), stream.clone());
        let get = Function::named(property, move |_, _| Ok(read.value()));
        let set = Function::named(property, move |_, args| {
            write.write(&[args.first().cloned().unwrap_or_default()])?;
            Ok(Value::Undefined)
        });
        instance.define_property(property, PropertyDefinition::new(get, Some(set)), true)?;

        if let Some(Value::Func(listener)) = cfg.get(&change) {
            listeners.push((stream, listener.clone()));
        }
        consumed.insert(property.clone());
        consumed.insert(change);
    }

    // stream definitions
    for member in &streams {
        let canonical = canonical_declaration(&prototype, member);
        let kind = StreamKind::of(&canonical).unwrap_or(StreamKind::Trigger);
        let seed = tags::unwrap(&canonical);
        let stream = match kind {
            StreamKind::Observable if !seed.is_undefined() && seed.as_func().is_none() => {
                Stream::observable_with(seed.deep_clone(), StreamOptions::default())
            }
            _ => Stream::new(kind),
        };
        stream.set_context(instance);

        for listener in declared_functions(&prototype, member) {
            listeners.push((stream.clone(), listener));
        }
        match cfg.get(member) {
            Some(Value::Func(listener)) => listeners.push((stream.clone(), listener.clone())),
            Some(value) if !value.is_undefined() => writes.push((stream.clone(), value.clone())),
            _ => {}
        }
        consumed.insert(member.clone());

        instance.put(member, Member::Value(Value::Stream(stream.clone())));
        lifecycle.add_stream(member, stream);
    }

    // tag wrappers
    let timing = &Config::global().timing;
    for keyword in WRAPPER_ORDER {
        for member in prototype.members_by_tag(keyword) {
            if aliases.contains_key(member) || streams.contains(member) {
                continue;
            }
            let Some(Member::Method(current)) = instance.member(member) else {
                continue;
            };
            let data = prototype
                .member_definition(member)
                .and_then(|v| keyword.get(v))
                .unwrap_or_default();
            let wrapped = if keyword == BINDABLE {
                let bindable = Bindable::new(member, current, instance);
                wire_bindable(&prototype, &bindable)?;
                lifecycle.add_bindable(member, bindable.clone());
                bindable.function()
            } else if keyword == DEBOUNCE {
                debounce(current, window(&data, timing.debounce_ms))
            } else if keyword == THROTTLE {
                throttle(current, window(&data, timing.throttle_ms))
            } else if keyword == MEMOIZE {
                memoize(current)
            } else if keyword == INTERLOCKED {
                interlocked(current)
            } else {
                memoize_cps(current)
            };
            instance.put(member, Member::Method(wrapped));
        }
    }

    // lifecycle entry points
    let weak = instance.downgrade();
    let init = Function::named("init", move |_, _| {
        let owner = weak.upgrade().ok_or(Error::InstanceDropped)?;
        Component::from_instance(&owner)?.init()
    });
    let weak = instance.downgrade();
    let destroy = Function::named("destroy", move |_, _| {
        let owner = weak.upgrade().ok_or(Error::InstanceDropped)?;
        Component::from_instance(&owner)?.destroy()?;
        Ok(Value::Undefined)
    });
    instance.put("init", Member::Method(init));
    instance.put("destroy", Member::Method(destroy));

    // remaining configuration
    for (key, value) in &cfg {
        if consumed.contains(key) {
            continue;
        }
        match value {
            Value::Func(f) => instance.put(key, Member::Method(f.bind_weak(instance))),
            other => instance.set(key, other.clone())?,
        }
    }

    for (alias, terminal) in aliases {
        let accessor = prototype
            .member_definition(terminal)
            .is_some_and(|v| PROPERTY.is(v) || OBSERVABLE_PROPERTY.is(v));
        if accessor {
            continue;
        }
        if let Some(member) = instance.member(terminal) {
            instance.put(alias, member);
        }
    }

    for (member, contract) in prototype.requires() {
        let value = instance.get(member)?;
        if !contract.check(&value) {
            return Err(Error::RequirementFailed {
                name,
                member: member.clone(),
                expected: contract.describe(),
            });
        }
    }

    for (stream, listener) in &listeners {
        stream.read(listener)?;
    }
    for (stream, value) in writes {
        stream.write(&[value])?;
    }

    debug!(component = %name, id = instance.id(), streams = streams.len(), "component constructed");

    if !skip_init {
        Component::from_instance(instance)?.init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::component;
    use crate::prototype::{define_trait, Contract, Definition};
    use crate::tags::{BARRIER, OBSERVABLE, TRIGGER};
    use crate::value::ValueKind;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> Function {
        let log = log.clone();
        Function::new(move |_, args| {
            let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
            log.lock().push(format!("{label}({})", rendered.join(",")));
            Ok(Value::Undefined)
        })
    }

    #[test]
    fn defaults_are_deep_cloned_per_instance() {
        let t = component(Definition::new("Bag").default("items", Value::list([1]))).unwrap();
        let a = Component::new(&t, Value::Undefined).unwrap();
        let b = Component::new(&t, Value::map([("items", Value::list([2]))])).unwrap();
        assert_eq!(a.get("items").unwrap(), Value::list([1]));
        assert_eq!(b.get("items").unwrap(), Value::list([2]));
        let c = Component::new(&t, Value::Undefined).unwrap();
        assert!(!a.get("items").unwrap().same(&c.get("items").unwrap()));
    }

    #[test]
    fn detached_methods_keep_their_owner() {
        let t = component(Definition::new("Greeter").member("who", "world").method("greet", |this, _| {
            Ok(Value::str(format!("hello {}", this.property("who")?.as_str().unwrap_or_default())))
        }))
        .unwrap();
        let g = Component::new(&t, Value::Undefined).unwrap();
        let detached = g.get("greet").unwrap();
        assert_eq!(detached.call(&Value::Null, &[]).unwrap(), Value::from("hello world"));
    }

    #[test]
    fn raw_methods_are_not_bound() {
        let t = component(
            Definition::new("Rawish").member("who", RAW.tag(Function::new(|this, _| Ok(this.clone())))),
        )
        .unwrap();
        let r = Component::new(&t, Value::Undefined).unwrap();
        let f = r.get("who").unwrap();
        assert_eq!(f.call(&Value::Null, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn observable_property_reads_and_writes_through_its_stream() {
        let t = component(Definition::new("Slider").member("position", OBSERVABLE_PROPERTY.tag(0))).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let s = Component::new(
            &t,
            Value::map([("position", Value::from(5)), ("positionChange", Value::Func(recorder(&log, "moved")))]),
        )
        .unwrap();
        assert_eq!(s.get("position").unwrap(), Value::from(5));
        s.set("position", 7).unwrap();
        s.set("position", 7).unwrap();
        assert_eq!(s.get("position").unwrap(), Value::from(7));
        assert_eq!(*log.lock(), ["moved(5)", "moved(7,5)"]);
        assert!(s.stream("positionChange").is_some());
    }

    #[test]
    fn instance_defaults_coerce_configured_maps() {
        let point = component(Definition::new("Point2").member("x", 0)).unwrap();
        let origin = Component::new(&point, Value::Undefined).unwrap();
        let t = component(
            Definition::new("Marker").member("at", OBSERVABLE_PROPERTY.tag(origin.as_value())),
        )
        .unwrap();
        let m = Component::new(&t, Value::map([("at", Value::map([("x", 3)]))])).unwrap();
        let at = m.get("at").unwrap();
        assert!(point.is_type_of(&at));
        assert_eq!(at.property("x").unwrap(), Value::from(3));
    }

    #[test]
    fn configured_stream_values_are_written_after_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = component(
            Definition::new("Door")
                .member("opened", BARRIER.bare())
                .member("level", OBSERVABLE.tag(1)),
        )
        .unwrap();
        let d = Component::new(
            &t,
            Value::map([("opened", Value::from("now")), ("level", Value::from(2))]),
        )
        .unwrap();
        d.stream("opened").unwrap().read(&recorder(&log, "late")).unwrap();
        assert_eq!(*log.lock(), [r#"late("now")"#]);
        assert_eq!(d.stream("level").unwrap().value(), Value::from(2));
    }

    #[test]
    fn trait_listeners_share_one_stream() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let logging = define_trait(Definition::new("LogsSaves").member("saved", recorder(&log, "trait"))).unwrap();
        let t = component(
            Definition::new("Doc")
                .with_trait(logging)
                .member("saved", TRIGGER.tag(recorder(&log, "own"))),
        )
        .unwrap();
        let d = Component::new(&t, Value::Undefined).unwrap();
        d.call("saved", &[Value::from(1)]).unwrap();
        assert_eq!(*log.lock(), ["trait(1)", "own(1)"]);
        assert_eq!(d.stream("saved").unwrap().reader_count(), 2);
    }

    #[test]
    fn bindable_hooks_come_from_traits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let audit = define_trait(
            Definition::new("Audit")
                .member("beforeSave", recorder(&log, "before"))
                .member("afterSave", recorder(&log, "after")),
        )
        .unwrap();
        let t = component(
            Definition::new("Store")
                .with_trait(audit)
                .member("save", BINDABLE.tag(Function::new(|_, args| Ok(args[0].clone())))),
        )
        .unwrap();
        let s = Component::new(&t, Value::Undefined).unwrap();
        assert_eq!(s.call("save", &[Value::from("x")]).unwrap(), Value::from("x"));
        assert_eq!(*log.lock(), [r#"before("x")"#, r#"after("x","x")"#]);
        assert!(s.bindable("save").is_some());
    }

    #[test]
    fn memoize_wraps_per_instance() {
        let t = component(Definition::new("Cached").member(
            "double",
            MEMOIZE.tag(Function::new(|this, args| {
                let hits = this.property("hits")?.as_f64().unwrap_or(0.0);
                this.as_object().map(|o| o.set("hits", hits + 1.0)).transpose()?;
                Ok(Value::from(args[0].as_f64().unwrap_or(0.0) * 2.0))
            })),
        ).member("hits", 0))
        .unwrap();
        let c = Component::new(&t, Value::Undefined).unwrap();
        c.call("double", &[Value::from(2)]).unwrap();
        c.call("double", &[Value::from(2)]).unwrap();
        assert_eq!(c.get("hits").unwrap(), Value::from(1));
    }

    #[test]
    fn remaining_config_becomes_fields() {
        let t = component(Definition::new("Labelled")).unwrap();
        let l = Component::new(
            &t,
            Value::map([
                ("label", Value::from("ok")),
                ("shout", Value::func(|this, _| Ok(Value::str(format!("{}!", this.property("label")?.as_str().unwrap_or_default()))))),
            ]),
        )
        .unwrap();
        assert_eq!(l.get("label").unwrap(), Value::from("ok"));
        assert_eq!(l.get("shout").unwrap().call(&Value::Null, &[]).unwrap(), Value::from("ok!"));
    }

    #[test]
    fn requirements_fail_before_init() {
        let inits = Arc::new(Mutex::new(Vec::new()));
        let log = inits.clone();
        let t = component(
            Definition::new("Strict")
                .require("port", Contract::Kind(ValueKind::Number))
                .method("init", move |_, _| {
                    log.lock().push("init".to_owned());
                    Ok(Value::Undefined)
                }),
        )
        .unwrap();
        let err = Component::new(&t, Value::map([("port", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::RequirementFailed { ref member, .. } if member == "port"));
        assert!(inits.lock().is_empty());
        assert!(Component::new(&t, Value::map([("port", 80)])).is_ok());
        assert_eq!(*inits.lock(), ["init"]);
    }

    #[test]
    fn init_false_defers_initialisation() {
        let t = component(Definition::new("Lazy")).unwrap();
        let l = Component::new(&t, Value::map([("init", false)])).unwrap();
        assert_eq!(l.state(), crate::component::LifecycleState::Constructed);
        assert!(l.get("init").unwrap().is_truthy());
        l.call("init", &[]).unwrap();
        assert_eq!(l.state(), crate::component::LifecycleState::Live);
    }
}
