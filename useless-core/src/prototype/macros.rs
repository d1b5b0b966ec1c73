//! Macro registry.
//!
//! Macros are compile-time transforms. Three kinds are registered
//! process-wide, once at startup:
//!
//! - *always* macros run against every compiled definition
//! - *member* macros run on members with a given name
//! - *tag* macros run on members carrying a given keyword
//!
//! A fourth kind, local tag macros, is declared per type
//! (`Definition::macro_tag`) and inherited by descendants.
//!
//! The built-in `$log` tag macro is always registered: it wraps the member
//! so that every call is traced.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::RwLock;

use super::compiler::Compilation;
use crate::component::log_calls;
use crate::error::Result;
use crate::tags::{self, Keyword, LOG};
use crate::value::Value;

/// Transform of one member: `(compilation, name, value) -> value`.
pub type MemberMacro = Arc<dyn Fn(&Compilation, &str, Value) -> Result<Value> + Send + Sync>;

/// Transform of a whole compilation.
pub type AlwaysMacro = Arc<dyn Fn(&mut Compilation) -> Result<()> + Send + Sync>;

struct MacroRegistry {
    always: RwLock<Vec<AlwaysMacro>>,
    by_name: DashMap<String, Vec<MemberMacro>>,
    by_tag: DashMap<Keyword, Vec<MemberMacro>>,
}

static MACROS: OnceLock<MacroRegistry> = OnceLock::new();

fn registry() -> &'static MacroRegistry {
    MACROS.get_or_init(|| {
        let by_tag: DashMap<Keyword, Vec<MemberMacro>> = DashMap::new();
        by_tag.insert(LOG, vec![Arc::new(log_macro)]);
        MacroRegistry {
            always: RwLock::new(Vec::new()),
            by_name: DashMap::new(),
            by_tag,
        }
    })
}

fn log_macro(compilation: &Compilation, name: &str, value: Value) -> Result<Value> {
    match tags::unwrap(&value) {
        Value::Func(f) => {
            let label = format!("{}.{name}", compilation.name);
            Ok(tags::extend(&value, &Value::Func(log_calls(&label, f))))
        }
        _ => Ok(value),
    }
}

pub fn register_always<F>(transform: F)
where
    F: Fn(&mut Compilation) -> Result<()> + Send + Sync + 'static,
{
    registry().always.write().push(Arc::new(transform));
}

pub fn register_member_macro<F>(name: &str, transform: F)
where
    F: Fn(&Compilation, &str, Value) -> Result<Value> + Send + Sync + 'static,
{
    registry()
        .by_name
        .entry(name.to_owned())
        .or_default()
        .push(Arc::new(transform));
}

pub fn register_tag_macro<F>(keyword: Keyword, transform: F)
where
    F: Fn(&Compilation, &str, Value) -> Result<Value> + Send + Sync + 'static,
{
    registry().by_tag.entry(keyword).or_default().push(Arc::new(transform));
}

pub(crate) fn always() -> Vec<AlwaysMacro> {
    registry().always.read().clone()
}

pub(crate) fn by_name(name: &str) -> Vec<MemberMacro> {
    registry().by_name.get(name).map(|m| m.clone()).unwrap_or_default()
}

pub(crate) fn by_tag(keyword: Keyword) -> Vec<MemberMacro> {
    registry().by_tag.get(&keyword).map(|m| m.clone()).unwrap_or_default()
}
