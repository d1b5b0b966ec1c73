//! Serialization of asynchronous calls.
//!
//! A [`Lock`] admits one asynchronous body at a time; later callers wait, in
//! arrival order, until the body in flight has settled. [`interlocked`]
//! applies a lock to a function value.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::promise::Promise;
use crate::value::{Function, Value};

/// At most one body in flight per lock. Clones share the lock.
#[derive(Clone, Default)]
pub struct Lock(Arc<Mutex<()>>);

impl Lock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `body` once every earlier body has settled.
    pub async fn run<F, Fut, T>(&self, body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _held = self.0.lock().await;
        body().await
    }

    /// True while a body is in flight.
    pub fn is_locked(&self) -> bool {
        self.0.try_lock().is_err()
    }
}

impl std::fmt::Debug for Lock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lock").field("locked", &self.is_locked()).finish()
    }
}

/// Wrap `f` so that calls never overlap.
///
/// Each call returns a promise. The wrapped body runs once the previous call's
/// result (awaited if it is itself a promise) has settled.
pub fn interlocked(f: Function) -> Function {
    let lock = Lock::new();
    let name = f.name().unwrap_or("interlocked").to_owned();
    Function::named(name, move |this, args| {
        let (lock, f, this, args) = (lock.clone(), f.clone(), this.clone(), args.to_vec());
        let promise = Promise::spawn(async move {
            lock.run(move || async move { f.call(&this, &args)?.settle().await })
                .await
        });
        Ok(Value::Promise(promise))
    })
}
