//! Callable values.
//!
//! A [`Function`] is a native closure receiving an explicit `this` and an
//! argument slice. Functions have identity: two clones of the same function
//! are equal, two functions built from identical closures are not. Streams use
//! that identity for `off(reader)`, and every function remembers the queues it
//! is enrolled in so it can be unbound from all of them at once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::Value;
use crate::error::{Error, Result};
use crate::object::{Instance, WeakInstance};
use crate::stream::QueuedBy;

/// Native function body: `(this, args) -> result`.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value> + Send + Sync;

static FUNCTION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_function_id() -> u64 {
    FUNCTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A callable value with identity.
#[derive(Clone)]
pub struct Function(Arc<FunctionInner>);

/// Non-owning handle to a [`Function`].
#[derive(Clone)]
pub(crate) struct WeakFunction(Weak<FunctionInner>);

impl WeakFunction {
    pub(crate) fn upgrade(&self) -> Option<Function> {
        self.0.upgrade().map(Function)
    }

    pub(crate) fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

struct FunctionInner {
    id: u64,
    name: Option<Arc<str>>,
    body: Box<NativeFn>,
    /// Back-references to every stream queue this function is enrolled in.
    queued_by: Mutex<SmallVec<[QueuedBy; 2]>>,
}

impl Function {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::build(None, Box::new(body))
    }

    pub fn named<F>(name: impl AsRef<str>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::build(Some(Arc::from(name.as_ref())), Box::new(body))
    }

    fn build(name: Option<Arc<str>>, body: Box<NativeFn>) -> Self {
        Self(Arc::new(FunctionInner {
            id: next_function_id(),
            name,
            body,
            queued_by: Mutex::new(SmallVec::new()),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub(crate) fn downgrade(&self) -> WeakFunction {
        WeakFunction(Arc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        (self.0.body)(this, args)
    }

    /// Call with `this` set to `Undefined`.
    pub fn call_free(&self, args: &[Value]) -> Result<Value> {
        self.call(&Value::Undefined, args)
    }

    /// A new function that ignores the caller's `this` and always uses `this`.
    pub fn bind(&self, this: Value) -> Function {
        let target = self.clone();
        let name = self.0.name.clone();
        Self::build(name, Box::new(move |_, args| target.call(&this, args)))
    }

    /// Like [`bind`](Self::bind), but holds the instance weakly so that the
    /// bound function does not keep its owner alive. The instance tracks the
    /// result so it can be unbound from every stream along with its owner.
    pub fn bind_weak(&self, instance: &Instance) -> Function {
        let target = self.clone();
        let weak: WeakInstance = instance.downgrade();
        let name = self.0.name.clone();
        let bound = Self::build(
            name,
            Box::new(move |_, args| {
                let owner = weak.upgrade().ok_or(Error::InstanceDropped)?;
                target.call(&Value::Object(owner), args)
            }),
        );
        instance.track_bound(&bound);
        bound
    }

    // ------------------------------------------------------------------
    // Stream enrollment
    // ------------------------------------------------------------------

    pub(crate) fn enroll(&self, queued_by: QueuedBy) {
        self.0.queued_by.lock().push(queued_by);
    }

    pub(crate) fn withdraw(&self, stream_id: u64, entry: crate::stream::ReaderId) {
        self.0
            .queued_by
            .lock()
            .retain(|q| !(q.stream_id == stream_id && q.entry == entry));
    }

    /// Number of stream queues this function is currently enrolled in.
    pub fn queued_count(&self) -> usize {
        self.0.queued_by.lock().len()
    }

    /// Remove this function from every stream it is reading.
    pub fn off_everywhere(&self) {
        let enrolled: SmallVec<[QueuedBy; 2]> = std::mem::take(&mut *self.0.queued_by.lock());
        for q in enrolled {
            q.detach();
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Function({name}#{})", self.id()),
            None => write!(f, "Function(#{})", self.id()),
        }
    }
}
