//! Shared promises.
//!
//! A [`Promise`] is a cloneable handle to one eventual `Result<Value>`. Every
//! clone observes the same outcome, which is why [`Error`] is `Clone`.
//!
//! Promises built with [`Promise::new`] are lazy: the future runs when the
//! first clone is polled. [`Promise::spawn`] starts the work on the current
//! tokio runtime right away, and falls back to a lazy promise outside one.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::error::{Error, Result};
use crate::value::Value;

static PROMISE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_promise_id() -> u64 {
    PROMISE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone)]
pub struct Promise {
    id: u64,
    inner: Shared<BoxFuture<'static, Result<Value>>>,
}

impl Promise {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            id: next_promise_id(),
            inner: future.boxed().shared(),
        }
    }

    /// Start `future` now on the current runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(future);
                Self::new(async move { task.await? })
            }
            Err(_) => Self::new(future),
        }
    }

    pub fn resolved(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(async move { Ok(value) })
    }

    pub fn rejected(error: Error) -> Self {
        Self::new(async move { Err(error) })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ptr_eq(&self, other: &Promise) -> bool {
        self.id == other.id
    }

    /// The outcome, if already settled.
    pub fn peek(&self) -> Option<Result<Value>> {
        self.inner.peek().cloned()
    }

    /// Chain a continuation. A returned promise value is awaited in turn.
    pub fn then<F>(&self, continuation: F) -> Promise
    where
        F: FnOnce(Value) -> Result<Value> + Send + 'static,
    {
        let source = self.clone();
        Promise::new(async move {
            let value = source.await?;
            continuation(value)?.settle().await
        })
    }
}

impl Future for Promise {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.peek() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "rejected",
        };
        write!(f, "Promise(#{} {state})", self.id)
    }
}

impl Value {
    /// Await a promise value; anything else is already settled.
    pub async fn settle(self) -> Result<Value> {
        let mut current = self;
        while let Value::Promise(promise) = current {
            current = promise.await?;
        }
        Ok(current)
    }

    pub fn is_promise(&self) -> bool {
        matches!(self, Value::Promise(_))
    }
}
