//! Component Layer
//!
//! Components are compiled types with a managed lifecycle. Declarative
//! members become live instance state at construction time:
//!
//! - `$observableProperty` members get a backing `<name>Change` observable
//! - stream-definition members (`$trigger`, `$barrier`, ...) get one stream,
//!   with every same-named function from traits attached as a listener
//! - `$bindable` members accept before/after/intercept hooks, and pick up
//!   trait members named `before<Name>`, `after<Name>`, ...
//! - `$debounce`, `$throttle`, `$memoize`, `$interlocked` and `$memoizeCPS`
//!   wrap methods per instance
//!
//! Components form a hierarchy through `attach`. Destroying a component
//! unbinds everything it wired up and destroys its children first.
//!
//! # Example
//!
//! ```rust,ignore
//! use useless_core::component::{component, Component};
//! use useless_core::prototype::Definition;
//! use useless_core::tags::OBSERVABLE_PROPERTY;
//! use useless_core::value::Value;
//!
//! let counter = component(
//!     Definition::new("Counter").member("count", OBSERVABLE_PROPERTY.tag(0)),
//! )?;
//! let c = Component::new(&counter, Value::map([("count", 3)]))?;
//! c.set("count", 4)?;
//! c.destroy()?;
//! ```

mod bindable;
mod construct;
mod handle;
mod lifecycle;
mod wrappers;

pub use bindable::Bindable;
pub use handle::Component;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use wrappers::{debounce, log_calls, memoize, memoize_cps, throttle};

use std::sync::{Arc, OnceLock};

use crate::error::Result;
use crate::prototype::{extends, prototype, Definition, Pass, Prototype, PrototypeKind};
use crate::value::Value;

static ROOT: OnceLock<Result<Arc<Prototype>>> = OnceLock::new();

fn noop(_: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Undefined)
}

fn compile_root() -> Result<Arc<Prototype>> {
    prototype(
        Definition::new("Component")
            .method("init", noop)
            .method("destroy", noop)
            .method("attach", |this, args| {
                let child = Component::from_value(&args.first().cloned().unwrap_or_default())?;
                Component::from_value(this)?.attach(&child)?;
                Ok(Value::Undefined)
            })
            .method("attachTo", |this, args| {
                let parent = Component::from_value(&args.first().cloned().unwrap_or_default())?;
                Component::from_value(this)?.attach_to(&parent)?;
                Ok(Value::Undefined)
            })
            .method("detach", |this, _| {
                Component::from_value(this)?.detach();
                Ok(Value::Undefined)
            })
            .compiler_pass(Pass::GenerateConstructor, |c, parent| {
                parent.run(c)?;
                if c.kind == PrototypeKind::Plain {
                    c.constructor = Some(Arc::new(construct::construct_component));
                }
                Ok(())
            }),
    )
}

/// The root component type. Every component derives from it.
pub fn root() -> Result<Arc<Prototype>> {
    ROOT.get_or_init(compile_root).clone()
}

/// Compile a component type.
pub fn component(definition: Definition) -> Result<Arc<Prototype>> {
    extends(&root()?, definition)
}

impl Prototype {
    pub fn is_component(&self) -> bool {
        root().is_ok_and(|root| self.derives_from(&root))
    }
}
