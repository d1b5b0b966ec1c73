//! Bindable methods.
//!
//! A `$bindable` method accepts hooks from outside:
//!
//! - `before` readers get the call arguments before the method runs
//! - `after` readers get the arguments followed by the result
//! - `once_before` / `once_after` readers fire on the next call only
//! - interceptors get the arguments followed by `next`, a function running
//!   the rest of the chain; the first registered interceptor is outermost
//!
//! Hooks are called with the owning instance as `this`.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::object::{Instance, WeakInstance};
use crate::stream::Stream;
use crate::value::{Function, Value};

struct BindableInner {
    name: String,
    target: Function,
    owner: WeakInstance,
    before: Stream,
    after: Stream,
    once_before: Stream,
    once_after: Stream,
    interceptors: Mutex<Vec<Function>>,
}

#[derive(Clone)]
pub struct Bindable(Arc<BindableInner>);

impl Bindable {
    pub fn new(name: &str, target: Function, owner: &Instance) -> Self {
        let streams = [
            Stream::trigger(),
            Stream::trigger(),
            Stream::trigger_once(),
            Stream::trigger_once(),
        ];
        for stream in &streams {
            stream.set_context(owner);
        }
        let [before, after, once_before, once_after] = streams;
        Self(Arc::new(BindableInner {
            name: name.to_owned(),
            target,
            owner: owner.downgrade(),
            before,
            after,
            once_before,
            once_after,
            interceptors: Mutex::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn on_before(&self, hook: &Function) -> Result<()> {
        self.0.before.read(hook)
    }

    pub fn on_after(&self, hook: &Function) -> Result<()> {
        self.0.after.read(hook)
    }

    pub fn once_before(&self, hook: &Function) -> Result<()> {
        self.0.once_before.read(hook)
    }

    pub fn once_after(&self, hook: &Function) -> Result<()> {
        self.0.once_after.read(hook)
    }

    pub fn intercept(&self, interceptor: Function) {
        self.0.interceptors.lock().push(interceptor);
    }

    /// Remove `hook` from every hook list of this method.
    pub fn off(&self, hook: &Function) {
        for stream in self.streams() {
            stream.off(hook);
        }
        self.0.interceptors.lock().retain(|f| !f.ptr_eq(hook));
    }

    pub fn off_all(&self) {
        for stream in self.streams() {
            stream.off_all();
        }
        self.0.interceptors.lock().clear();
    }

    fn streams(&self) -> [&Stream; 4] {
        [&self.0.before, &self.0.after, &self.0.once_before, &self.0.once_after]
    }

    fn this(&self) -> Value {
        self.0.owner.upgrade().map(Value::Object).unwrap_or_default()
    }

    /// Run hooks and the target.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.0.before.write(args)?;
        self.0.once_before.write(args)?;

        let interceptors = self.0.interceptors.lock().clone();
        let result = run_chain(&self.this(), &interceptors, &self.0.target, args)?;

        let mut with_result = args.to_vec();
        with_result.push(result.clone());
        self.0.after.write(&with_result)?;
        self.0.once_after.write(&with_result)?;
        Ok(result)
    }

    /// The bindable as a method value.
    pub fn function(&self) -> Function {
        let bindable = self.clone();
        Function::named(&self.0.name, move |_, args| bindable.call(args))
    }
}

fn run_chain(this: &Value, interceptors: &[Function], target: &Function, args: &[Value]) -> Result<Value> {
    let Some((outer, inner)) = interceptors.split_first() else {
        return target.call(this, args);
    };
    let (rest, target_clone, this_clone) = (inner.to_vec(), target.clone(), this.clone());
    let next = Function::named("next", move |_, next_args| {
        run_chain(&this_clone, &rest, &target_clone, next_args)
    });
    let mut with_next = args.to_vec();
    with_next.push(Value::Func(next));
    outer.call(this, &with_next)
}

/// `foo` -> `Foo`.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Names of the hook members wired to the bindable `name`:
/// `(before, after, intercept, once_before, once_after)`.
pub(crate) fn hook_names(name: &str) -> [String; 5] {
    let cap = capitalize(name);
    [
        format!("before{cap}"),
        format!("after{cap}"),
        format!("intercept{cap}"),
        format!("onceBefore{cap}"),
        format!("onceAfter{cap}"),
    ]
}

impl fmt::Debug for Bindable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindable")
            .field("name", &self.0.name)
            .field("interceptors", &self.0.interceptors.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prototype::{prototype, Definition};

    fn owner() -> Instance {
        prototype(Definition::new("Owner")).unwrap().instantiate(&[]).unwrap()
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> Function {
        let log = log.clone();
        Function::new(move |_, args| {
            let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
            log.lock().push(format!("{label}({})", rendered.join(",")));
            Ok(Value::Undefined)
        })
    }

    #[test]
    fn hooks_run_around_the_target() {
        let owner = owner();
        let log = Arc::new(Mutex::new(Vec::new()));
        let target_log = log.clone();
        let target = Function::new(move |_, args| {
            target_log.lock().push("target".into());
            Ok(Value::from(args[0].as_f64().unwrap_or(0.0) + 1.0))
        });
        let b = Bindable::new("inc", target, &owner);
        b.on_before(&recorder(&log, "before")).unwrap();
        b.on_after(&recorder(&log, "after")).unwrap();
        b.once_after(&recorder(&log, "onceAfter")).unwrap();

        assert_eq!(b.call(&[Value::from(1)]).unwrap(), Value::from(2));
        b.call(&[Value::from(5)]).unwrap();
        assert_eq!(
            *log.lock(),
            ["before(1)", "target", "after(1,2)", "onceAfter(1,2)", "before(5)", "target", "after(5,6)"]
        );
    }

    #[test]
    fn interceptors_wrap_in_registration_order() {
        let owner = owner();
        let b = Bindable::new("id", Function::new(|_, args| Ok(args[0].clone())), &owner);
        let wrap = |label: &'static str| {
            Function::new(move |this, args| {
                let next = args.last().cloned().unwrap_or_default();
                let inner = next.call(this, &args[..args.len() - 1])?;
                Ok(Value::str(format!("{label}[{}]", inner.as_str().unwrap_or_default())))
            })
        };
        b.intercept(wrap("outer"));
        b.intercept(wrap("inner"));
        assert_eq!(b.call(&[Value::from("x")]).unwrap(), Value::from("outer[inner[x]]"));
    }

    #[test]
    fn off_removes_a_hook_everywhere() {
        let owner = owner();
        let log = Arc::new(Mutex::new(Vec::new()));
        let b = Bindable::new("noop", Function::new(|_, _| Ok(Value::Null)), &owner);
        let hook = recorder(&log, "hook");
        b.on_before(&hook).unwrap();
        b.on_after(&hook).unwrap();
        b.off(&hook);
        b.call(&[]).unwrap();
        assert!(log.lock().is_empty());
        assert_eq!(hook.queued_count(), 0);
    }

    #[test]
    fn hook_names_follow_the_convention() {
        assert_eq!(
            hook_names("save"),
            ["beforeSave", "afterSave", "interceptSave", "onceBeforeSave", "onceAfterSave"]
        );
    }
}
