//! Integration Tests
//!
//! Cross-module behaviour: tags feeding the compiler, the compiler feeding
//! the component layer, and streams and tasks working together.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use useless_core::component::{component, Component, LifecycleState};
use useless_core::functional::{filter2, hyper_map, map2};
use useless_core::prototype::{define_trait, extends, prototype, Definition};
use useless_core::stream::Stream;
use useless_core::tags::{self, Keyword, FINAL, STATIC, TRIGGER};
use useless_core::task::{interlocked, Promise, TaskPool};
use useless_core::{Error, Function, Value};

fn counter(hits: &Arc<AtomicI32>) -> Function {
    let hits = hits.clone();
    Function::new(move |_, _| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Undefined)
    })
}

// ----------------------------------------------------------------------------
// Tags
// ----------------------------------------------------------------------------

/// Wrapping is idempotent and unwrapping recovers the subject.
#[test]
fn tag_wrap_unwrap_is_idempotent() {
    for x in [Value::from(1), Value::str("s"), Value::list([1, 2]), STATIC.tag(3)] {
        let unwrapped = tags::unwrap(&x);
        assert_eq!(tags::unwrap(&tags::wrap(&unwrapped)), unwrapped);
        let wrapped = tags::wrap(&x);
        assert_eq!(tags::wrap(&wrapped), wrapped);
    }
}

/// A registered keyword recognises exactly the values tagged with it.
#[test]
fn custom_keywords_round_trip() {
    let k = Keyword::register("$integrationMarker");
    assert_eq!(Keyword::register("$integrationMarker"), k);
    for x in [Value::from(0), Value::Null, Value::map([("a", 1)])] {
        assert!(k.is(&k.tag(x.clone())));
        assert!(!k.is(&x));
    }
}

// ----------------------------------------------------------------------------
// Functional
// ----------------------------------------------------------------------------

/// `map2` with the identity keeps the shape but builds a new container.
#[test]
fn map2_preserves_container_shape() {
    for c in [Value::from(7), Value::list([1, 2, 3]), Value::map([("a", 1), ("b", 2)])] {
        let mapped = map2(&c, |v, _| v.clone());
        assert_eq!(mapped, c);
        if !c.is_trivial() {
            assert!(!mapped.same(&c));
        }
    }
}

/// `true` keeps, `false` drops, anything else replaces.
#[test]
fn filter2_is_tri_state() {
    let list = Value::list([1, 2, 3]);
    assert_eq!(filter2(&list, |_, _| true), list);
    assert_eq!(filter2(&list, |_, _| false), Value::list(Vec::<Value>::new()));
    assert_eq!(filter2(&list, |_, _| Value::from("x")), Value::list(["x", "x", "x"]));
    assert!(filter2(&Value::from(5), |_, _| false).is_undefined());
}

/// Hyper-operators visit each leaf once and treat instances as leaves.
#[test]
fn hyper_map_visits_every_leaf_once() {
    let point = prototype(Definition::new("Leafy").member("x", 1)).unwrap();
    let p = point.instantiate(&[]).unwrap();
    let nested = Value::list([
        Value::from(1),
        Value::map([("a", Value::from(2)), ("b", Value::list([3, 4]))]),
        p.as_value(),
    ]);
    let mut visits = 0;
    let mapped = hyper_map(&nested, |v, _| {
        visits += 1;
        match v.as_f64() {
            Some(n) => Value::from(n * 10.0),
            None => v.clone(),
        }
    });
    assert_eq!(visits, 5);
    assert_eq!(
        mapped,
        Value::list([
            Value::from(10),
            Value::map([("a", Value::from(20)), ("b", Value::list([30, 40]))]),
            p.as_value(),
        ])
    );
}

// ----------------------------------------------------------------------------
// Compiler
// ----------------------------------------------------------------------------

/// Derived types inherit members and link to their base.
#[test]
fn compiler_inheritance() {
    let base = prototype(Definition::new("InheritBase").member("x", 1)).unwrap();
    let derived = extends(&base, Definition::new("InheritDerived")).unwrap();
    let d = derived.instantiate(&[]).unwrap();
    assert_eq!(d.get("x").unwrap(), Value::from(1));
    assert!(derived.get_static("$base").unwrap().same(&Value::Type(base.clone())));
    assert!(d.call("isInstanceOf", &[Value::Type(base)]).unwrap().is_truthy());
}

/// Final types cannot be derived and final members cannot be overridden.
#[test]
fn final_contract() {
    let sealed = prototype(Definition::new("SealedType").mark_final()).unwrap();
    assert!(matches!(
        extends(&sealed, Definition::new("SealedChild")),
        Err(Error::DeriveFromFinal { .. })
    ));

    let base = prototype(Definition::new("FinalMembers").member("id", FINAL.tag(1))).unwrap();
    let err = extends(&base, Definition::new("FinalBreach").member("id", 2)).unwrap_err();
    assert!(matches!(err, Error::FinalOverride { ref members, .. } if members == &["id"]));
    assert!(err.is_compile_time());
}

/// Two traits and the component declare the same stream: one stream, every
/// listener fires once per write.
#[test]
fn trait_streams_compose() {
    let (a, b, own) = (
        Arc::new(AtomicI32::new(0)),
        Arc::new(AtomicI32::new(0)),
        Arc::new(AtomicI32::new(0)),
    );
    let first = define_trait(Definition::new("FirstListener").member("changed", TRIGGER.tag(counter(&a)))).unwrap();
    let second =
        define_trait(Definition::new("SecondListener").member("changed", TRIGGER.tag(counter(&b)))).unwrap();
    let t = component(
        Definition::new("Composed")
            .traits([first, second])
            .member("changed", counter(&own)),
    )
    .unwrap();

    let c = Component::new(&t, Value::Undefined).unwrap();
    let stream = c.stream("changed").unwrap();
    assert!(c.get("changed").unwrap().as_stream().is_some_and(|s| s.ptr_eq(&stream)));
    assert_eq!(stream.reader_count(), 3);

    c.call("changed", &[Value::from(1)]).unwrap();
    for hits in [&a, &b, &own] {
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

// ----------------------------------------------------------------------------
// Streams
// ----------------------------------------------------------------------------

/// Readers registered after the latch fire immediately, every time.
#[test]
fn barrier_replays_to_late_readers() {
    let b = Stream::barrier();
    b.call(&[Value::from(42)]).unwrap();
    let calls = Arc::new(AtomicI32::new(0));
    b.call(&[Value::Func(counter(&calls))]).unwrap();
    b.call(&[Value::Func(counter(&calls))]).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(b.value(), Value::from(42));
}

/// Writing an unchanged value does not notify.
#[test]
fn observable_dedupes_unchanged_values() {
    let o = Stream::observable();
    let n = Arc::new(AtomicI32::new(0));
    o.call(&[Value::Func(counter(&n))]).unwrap();
    o.call(&[Value::from(5)]).unwrap();
    o.call(&[Value::from(5)]).unwrap();
    assert_eq!(n.load(Ordering::SeqCst), 1);
}

// ----------------------------------------------------------------------------
// Tasks
// ----------------------------------------------------------------------------

/// Concurrent calls of an interlocked function never overlap.
#[tokio::test]
async fn interlocked_calls_never_overlap() {
    let in_flight = Arc::new(AtomicI32::new(0));
    let peak = Arc::new(AtomicI32::new(0));
    let (flight, top) = (in_flight.clone(), peak.clone());
    let body = Function::new(move |_, args| {
        let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
        top.fetch_max(now, Ordering::SeqCst);
        let (flight, arg) = (flight.clone(), args[0].clone());
        Ok(Value::Promise(Promise::new(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            flight.fetch_sub(1, Ordering::SeqCst);
            Ok(arg)
        })))
    });
    let locked = interlocked(body);
    let first = locked.call_free(&[Value::from(1)]).unwrap();
    let second = locked.call_free(&[Value::from(2)]).unwrap();
    let (x, y) = tokio::join!(first.settle(), second.settle());
    assert_eq!(x.unwrap(), Value::from(1));
    assert_eq!(y.unwrap(), Value::from(2));
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

/// `scatter` keeps at most `k` tasks unsettled and completes every task.
#[tokio::test]
async fn pool_respects_its_ceiling() {
    let pool = TaskPool::new(2);
    let in_flight = Arc::new(AtomicI32::new(0));
    let peak = Arc::new(AtomicI32::new(0));
    let completed = Arc::new(AtomicI32::new(0));
    let (flight, top, done) = (in_flight.clone(), peak.clone(), completed.clone());
    pool.scatter(0..7, move |_| {
        let (flight, top, done) = (flight.clone(), top.clone(), done.clone());
        async move {
            let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
            top.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(3)).await;
            flight.fetch_sub(1, Ordering::SeqCst);
            done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await
    .unwrap();
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(completed.load(Ordering::SeqCst), 7);
}

// ----------------------------------------------------------------------------
// Components
// ----------------------------------------------------------------------------

/// Destroying a parent destroys each child once, and a destroyed instance's
/// methods stop listening.
#[test]
fn destroy_cascades_and_unbinds() {
    let destroyed = Arc::new(AtomicI32::new(0));
    let heard = Arc::new(AtomicI32::new(0));
    let heard_by_child = heard.clone();
    let child_type = component(
        Definition::new("CascadeChild")
            .member("destroy", counter(&destroyed))
            .method("listen", move |_, _| {
                heard_by_child.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Undefined)
            }),
    )
    .unwrap();
    let parent_type = component(Definition::new("CascadeParent")).unwrap();

    let parent = Component::new(&parent_type, Value::Undefined).unwrap();
    let children: Vec<Component> = (0..2)
        .map(|_| Component::new(&child_type, Value::Undefined).unwrap())
        .collect();
    let ping = Stream::trigger();
    for child in &children {
        parent.attach(child).unwrap();
        ping.read(child.get("listen").unwrap().as_func().unwrap()).unwrap();
    }
    ping.write(&[]).unwrap();
    assert_eq!(heard.load(Ordering::SeqCst), 2);

    parent.destroy().unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    assert!(children.iter().all(|c| c.state() == LifecycleState::Destroyed));

    ping.write(&[]).unwrap();
    assert_eq!(heard.load(Ordering::SeqCst), 2);
    assert_eq!(ping.reader_count(), 0);
}

/// A component defined from JSON configuration picks up observable values.
#[test]
fn components_accept_json_configuration() {
    let t = component(
        Definition::new("JsonConfigured").member("title", tags::OBSERVABLE_PROPERTY.tag("untitled")),
    )
    .unwrap();
    let cfg = Value::parse_json(r#"{"title": "hello", "extra": [1, 2]}"#).unwrap();
    let c = Component::new(&t, cfg).unwrap();
    assert_eq!(c.get("title").unwrap(), Value::from("hello"));
    assert_eq!(c.get("extra").unwrap(), Value::list([1, 2]));
}
