//! Typed access to component instances.
//!
//! A [`Component`] is an [`Instance`] paired with its lifecycle state. It
//! derefs to the instance, so member access works the same way.
//!
//! # Destroy order
//!
//! 1. `beforeDestroy` hooks
//! 2. unbind: every stream loses its readers, every bound method leaves the
//!    streams it reads, bindables drop their hooks
//! 3. children are destroyed, depth first
//! 4. the `destroy` body
//! 5. `destroy` members contributed by traits, then `afterDestroy` hooks
//! 6. the parent forgets this instance
//!
//! A hook failure does not stop the teardown; the first error is returned
//! once the instance is destroyed.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use super::bindable::Bindable;
use super::construct::declared_functions;
use super::lifecycle::{Lifecycle, LifecycleState};
use crate::error::{Error, Result};
use crate::object::{Instance, Member};
use crate::prototype::{Origin, Prototype};
use crate::stream::Stream;
use crate::tags;
use crate::task::Promise;
use crate::value::{Function, Value};

#[derive(Clone)]
pub struct Component {
    instance: Instance,
    lifecycle: Arc<Lifecycle>,
}

impl Deref for Component {
    type Target = Instance;

    fn deref(&self) -> &Instance {
        &self.instance
    }
}

fn not_a_component(name: &str) -> Error {
    Error::NotAComponent { name: name.to_owned() }
}

impl Component {
    /// Instantiate a component type with a configuration map.
    pub fn new(prototype: &Arc<Prototype>, cfg: Value) -> Result<Self> {
        if !prototype.is_component() {
            return Err(not_a_component(prototype.name()));
        }
        let args = if cfg.is_undefined() { Vec::new() } else { vec![cfg] };
        let instance = prototype.instantiate(&args)?;
        Self::from_instance(&instance)
    }

    pub fn from_instance(instance: &Instance) -> Result<Self> {
        let lifecycle = instance
            .lifecycle()
            .ok_or_else(|| not_a_component(instance.prototype().name()))?;
        Ok(Self {
            instance: instance.clone(),
            lifecycle,
        })
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(instance) => Self::from_instance(instance),
            other => Err(not_a_component(&other.to_string())),
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn as_value(&self) -> Value {
        self.instance.as_value()
    }

    fn name(&self) -> String {
        self.instance.prototype().name().to_owned()
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Configuration after `$defaults` were applied.
    pub fn cfg(&self) -> &Value {
        &self.lifecycle.cfg
    }

    pub fn stream(&self, name: &str) -> Option<Stream> {
        self.lifecycle.stream(name)
    }

    pub fn bindable(&self, name: &str) -> Option<Bindable> {
        self.lifecycle.bindable(name)
    }

    /// Barrier opened with the instance once `init` has settled.
    pub fn initialized(&self) -> &Stream {
        &self.lifecycle.initialized
    }

    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    /// Make `child` a child of `self`, detaching it from any previous parent.
    pub fn attach(&self, child: &Component) -> Result<()> {
        if matches!(self.state(), LifecycleState::Destroying | LifecycleState::Destroyed) {
            return Err(Error::AlreadyDestroyed { name: self.name() });
        }
        if child.instance.ptr_eq(&self.instance) {
            return Err(Error::custom(format!("`{}` cannot be attached to itself", self.name())));
        }
        child.detach();
        *child.lifecycle.parent.lock() = Some(self.instance.downgrade());
        self.lifecycle.children.lock().push(child.instance.clone());
        Ok(())
    }

    pub fn attach_to(&self, parent: &Component) -> Result<()> {
        parent.attach(self)
    }

    /// Leave the current parent, if any.
    pub fn detach(&self) {
        let previous = self.lifecycle.parent.lock().take();
        let Some(parent) = previous.and_then(|weak| weak.upgrade()) else {
            return;
        };
        if let Some(parent) = parent.lifecycle() {
            parent.children.lock().retain(|c| !c.ptr_eq(&self.instance));
        }
    }

    pub fn parent(&self) -> Option<Component> {
        self.lifecycle
            .parent()
            .and_then(|instance| Self::from_instance(&instance).ok())
    }

    pub fn children(&self) -> Vec<Component> {
        let children = self.lifecycle.children.lock().clone();
        children
            .iter()
            .filter_map(|instance| Self::from_instance(instance).ok())
            .collect()
    }

    // ------------------------------------------------------------------
    // Init
    // ------------------------------------------------------------------

    fn hooks(&self, name: &str) -> Vec<Function> {
        declared_functions(self.instance.prototype(), name)
    }

    fn body(&self, name: &str) -> Option<Function> {
        self.instance
            .prototype()
            .member_definition(name)
            .and_then(|value| tags::unwrap(value).as_func().cloned())
    }

    /// Run `beforeInit` hooks, the `init` body and `afterInit` hooks, then open
    /// [`initialized`](Self::initialized).
    ///
    /// When a stage returns a promise, the remaining stages wait for it and
    /// `init` returns a promise for the whole sequence.
    pub fn init(&self) -> Result<Value> {
        {
            let mut state = self.lifecycle.state.lock();
            match *state {
                LifecycleState::Constructed => *state = LifecycleState::Initializing,
                LifecycleState::Destroying | LifecycleState::Destroyed => {
                    return Err(Error::AlreadyDestroyed { name: self.name() })
                }
                _ => return Err(Error::AlreadyInitialized { name: self.name() }),
            }
        }
        debug!(component = %self.name(), id = self.instance.id(), "init");

        let stages: Vec<Function> = self
            .hooks("beforeInit")
            .into_iter()
            .chain(self.body("init"))
            .chain(self.hooks("afterInit"))
            .collect();
        let this = self.as_value();

        for (index, stage) in stages.iter().enumerate() {
            let Value::Promise(pending) = stage.call(&this, &[])? else {
                continue;
            };
            let rest = stages[index + 1..].to_vec();
            let component = self.clone();
            let promise = Promise::spawn(async move {
                pending.await?.settle().await?;
                let this = component.as_value();
                for stage in rest {
                    stage.call(&this, &[])?.settle().await?;
                }
                component.finish_init()?;
                Ok(this)
            });
            *self.lifecycle.pending_init.lock() = Some(promise.clone());
            return Ok(Value::Promise(promise));
        }

        self.finish_init()?;
        Ok(Value::Undefined)
    }

    fn finish_init(&self) -> Result<()> {
        {
            let mut state = self.lifecycle.state.lock();
            if *state != LifecycleState::Initializing {
                return Ok(());
            }
            *state = LifecycleState::Live;
        }
        debug!(component = %self.name(), id = self.instance.id(), "live");
        self.lifecycle.initialized.write(&[self.as_value()])
    }

    /// Resolve with the instance once `init` has settled.
    ///
    /// Rejects with the init failure, or with `AlreadyDestroyed` if the
    /// component is torn down first.
    pub async fn ready(&self) -> Result<Value> {
        let pending = self.lifecycle.pending_init.lock().clone();
        if let Some(pending) = pending {
            pending.await?;
        }
        let barrier = &self.lifecycle.initialized;
        if !barrier.has_value() && matches!(self.state(), LifecycleState::Destroying | LifecycleState::Destroyed) {
            return Err(Error::AlreadyDestroyed { name: self.name() });
        }

        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let reader = Function::named("ready", move |_, args| {
            if let Some(tx) = tx.lock().take() {
                // the receiver only disappears when `ready` itself was dropped
                let _ = tx.send(args.first().cloned().unwrap_or_default());
            }
            Ok(Value::Undefined)
        });
        barrier.read(&reader)?;
        drop(reader);
        rx.await.map_err(|_| Error::AlreadyDestroyed { name: self.name() })
    }

    // ------------------------------------------------------------------
    // Destroy
    // ------------------------------------------------------------------

    /// Tear the component down. See the module docs for the order.
    pub fn destroy(&self) -> Result<()> {
        {
            let mut state = self.lifecycle.state.lock();
            match *state {
                LifecycleState::Destroyed => return Err(Error::AlreadyDestroyed { name: self.name() }),
                LifecycleState::Destroying => return Err(Error::RecursiveDestroy { name: self.name() }),
                _ => *state = LifecycleState::Destroying,
            }
        }
        debug!(component = %self.name(), id = self.instance.id(), "destroying");

        let this = self.as_value();
        let mut first_error: Option<Error> = None;
        let mut record = |result: Result<Value>| {
            if let Err(error) = result {
                first_error.get_or_insert(error);
            }
        };

        for hook in self.hooks("beforeDestroy") {
            record(hook.call(&this, &[]));
        }

        self.unbind();

        let children = std::mem::take(&mut *self.lifecycle.children.lock());
        for child in &children {
            let Ok(child) = Self::from_instance(child) else {
                continue;
            };
            *child.lifecycle.parent.lock() = None;
            if child.state() != LifecycleState::Destroyed {
                record(child.destroy().map(|()| Value::Undefined));
            }
        }

        let body = self.body("destroy");
        if let Some(body) = &body {
            record(body.call(&this, &[]));
        }
        let trait_hooks: Vec<Function> = self
            .instance
            .prototype()
            .contributions("destroy")
            .iter()
            .filter(|c| c.origin == Origin::Trait)
            .filter_map(|c| tags::unwrap(&c.value).as_func().cloned())
            .filter(|f| !body.as_ref().is_some_and(|b| b.ptr_eq(f)))
            .collect();
        for hook in trait_hooks {
            record(hook.call(&this, &[]));
        }
        for hook in self.hooks("afterDestroy") {
            record(hook.call(&this, &[]));
        }

        self.detach();
        self.lifecycle.set_state(LifecycleState::Destroyed);
        debug!(component = %self.name(), id = self.instance.id(), "destroyed");

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn unbind(&self) {
        let streams: Vec<Stream> = self.lifecycle.streams.lock().values().cloned().collect();
        for stream in streams {
            stream.off_all();
        }
        self.lifecycle.initialized.off_all();

        for name in self.instance.own_keys() {
            if let Some(Member::Method(f)) = self.instance.own_member(&name) {
                f.off_everywhere();
            }
        }
        self.instance.unbind_bound();

        let bindables: Vec<Bindable> = self.lifecycle.bindables.lock().values().cloned().collect();
        for bindable in bindables {
            bindable.off_all();
        }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.instance.ptr_eq(&other.instance)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("instance", &self.instance)
            .field("state", &self.state())
            .finish()
    }
}
