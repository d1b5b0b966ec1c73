//! Sequential asynchronous iteration.
//!
//! Continuation-style `each`/`map`/`reduce` as async functions. Entries are
//! processed in index or key order, strictly one at a time: a step starts
//! only after the previous one has settled.
//! Use [`TaskPool::scatter`](super::TaskPool::scatter) for concurrent work.

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::functional::entries;
use crate::value::{Function, Key, Map, Value};

/// Run `step` for every entry of `value`. A scalar is a single entry with
/// [`Key::None`].
pub async fn each<F, Fut>(value: &Value, mut step: F) -> Result<()>
where
    F: FnMut(Value, Key) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    for (key, item) in entries_or_self(value) {
        step(item, key).await?;
    }
    Ok(())
}

/// Map every entry, keeping the container shape.
pub async fn map<F, Fut>(value: &Value, mut step: F) -> Result<Value>
where
    F: FnMut(Value, Key) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    match value {
        Value::List(_) | Value::Set(_) => {
            let mut out = Vec::new();
            for (key, item) in entries(value) {
                out.push(step(item, key).await?);
            }
            Ok(match value {
                Value::Set(_) => Value::set(out),
                _ => Value::List(Arc::new(out)),
            })
        }
        Value::Map(_) => {
            let mut out = Map::new();
            for (key, item) in entries(value) {
                let name = key.to_string();
                out.insert(name, step(item, key).await?);
            }
            Ok(Value::from(out))
        }
        scalar => step(scalar.clone(), Key::None).await,
    }
}

/// Fold entries left to right.
pub async fn reduce<F, Fut>(value: &Value, initial: Value, mut step: F) -> Result<Value>
where
    F: FnMut(Value, Value, Key) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let mut acc = initial;
    for (key, item) in entries_or_self(value) {
        acc = step(acc, item, key).await?;
    }
    Ok(acc)
}

/// Call each function in turn, awaiting promise results, and collect the
/// settled values. Stops at the first failure, whether the call itself
/// failed or its promise was rejected.
pub async fn try_sequence<I>(steps: I) -> Result<Vec<Value>>
where
    I: IntoIterator<Item = Function>,
{
    let mut results = Vec::new();
    for step in steps {
        results.push(step.call_free(&[])?.settle().await?);
    }
    Ok(results)
}

fn entries_or_self(value: &Value) -> Vec<(Key, Value)> {
    if value.is_trivial() {
        vec![(Key::None, value.clone())]
    } else {
        entries(value)
    }
}
