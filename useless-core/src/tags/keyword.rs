//! Keywords
//!
//! A [`Keyword`] is an interned annotation name such as `$static` or
//! `$trigger`. Built-in keywords are constants; custom keywords are added
//! through [`Keyword::register`] at startup and live for the rest of the
//! process.
//!
//! # Registry
//!
//! The registry is a process-wide map from name to keyword. Registration is
//! idempotent: registering a name twice returns the same keyword. The
//! compiler uses [`Keyword::lookup`] to recognise grouped-keyword shorthand
//! (`{"$static": {...}}`) in definitions.

use std::fmt;
use std::sync::OnceLock;

use dashmap::DashMap;

use super::tagged::{self, Tagged};
use crate::value::Value;

/// An interned annotation name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keyword(&'static str);

// Compiler keywords
pub const STATIC: Keyword = Keyword("$static");
pub const PROPERTY: Keyword = Keyword("$property");
pub const METHOD: Keyword = Keyword("$method");
pub const MEMOIZED: Keyword = Keyword("$memoized");
pub const FINAL: Keyword = Keyword("$final");
pub const ALIAS: Keyword = Keyword("$alias");
pub const BUILTIN: Keyword = Keyword("$builtin");
pub const RAW: Keyword = Keyword("$raw");
pub const LOG: Keyword = Keyword("$log");
pub const ARGUMENTS: Keyword = Keyword("$arguments");

// Stream definitions
pub const TRIGGER: Keyword = Keyword("$trigger");
pub const TRIGGER_ONCE: Keyword = Keyword("$triggerOnce");
pub const BARRIER: Keyword = Keyword("$barrier");
pub const OBSERVABLE: Keyword = Keyword("$observable");
pub const OBSERVABLE_PROPERTY: Keyword = Keyword("$observableProperty");

// Method wrappers
pub const BINDABLE: Keyword = Keyword("$bindable");
pub const DEBOUNCE: Keyword = Keyword("$debounce");
pub const THROTTLE: Keyword = Keyword("$throttle");
pub const MEMOIZE: Keyword = Keyword("$memoize");
pub const INTERLOCKED: Keyword = Keyword("$interlocked");
pub const MEMOIZE_CPS: Keyword = Keyword("$memoizeCPS");

// Matching
pub const ANY: Keyword = Keyword("$any");

const BUILTINS: &[Keyword] = &[
    STATIC,
    PROPERTY,
    METHOD,
    MEMOIZED,
    FINAL,
    ALIAS,
    BUILTIN,
    RAW,
    LOG,
    ARGUMENTS,
    TRIGGER,
    TRIGGER_ONCE,
    BARRIER,
    OBSERVABLE,
    OBSERVABLE_PROPERTY,
    BINDABLE,
    DEBOUNCE,
    THROTTLE,
    MEMOIZE,
    INTERLOCKED,
    MEMOIZE_CPS,
    ANY,
];

/// Keywords that turn a member into a per-instance stream.
pub const STREAM_KEYWORDS: &[Keyword] = &[TRIGGER, TRIGGER_ONCE, BARRIER, OBSERVABLE];

static REGISTRY: OnceLock<DashMap<&'static str, Keyword>> = OnceLock::new();

fn registry() -> &'static DashMap<&'static str, Keyword> {
    REGISTRY.get_or_init(|| {
        let map = DashMap::new();
        for keyword in BUILTINS {
            map.insert(keyword.0, *keyword);
        }
        map
    })
}

impl Keyword {
    /// Register a custom keyword, or return the existing one with that name.
    ///
    /// Names are leaked on first registration; keywords are meant to be
    /// declared once at startup.
    pub fn register(name: &str) -> Keyword {
        if let Some(existing) = registry().get(name) {
            return *existing;
        }
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        *registry().entry(leaked).or_insert(Keyword(leaked))
    }

    /// Find a registered keyword by name.
    pub fn lookup(name: &str) -> Option<Keyword> {
        registry().get(name).map(|k| *k)
    }

    pub fn name(self) -> &'static str {
        self.0
    }

    pub fn is_stream_definition(self) -> bool {
        STREAM_KEYWORDS.contains(&self)
    }

    // ------------------------------------------------------------------
    // Tagging
    // ------------------------------------------------------------------

    /// One-argument shape: annotate `subject` with this keyword (data `true`).
    pub fn tag(self, subject: impl Into<Value>) -> Value {
        tagged::add(&subject.into(), self, Value::Bool(true))
    }

    /// Two-argument shape: annotate `subject`, carrying `data`.
    pub fn tag_with(self, data: impl Into<Value>, subject: impl Into<Value>) -> Value {
        tagged::add(&subject.into(), self, data.into())
    }

    /// A wrapper carrying only this keyword and no subject.
    pub fn bare(self) -> Value {
        tagged::add(&Value::Undefined, self, Value::Bool(true))
    }

    /// True when `value` carries this keyword.
    pub fn is(self, value: &Value) -> bool {
        matches!(value, Value::Tagged(t) if t.has(self))
    }

    pub fn is_not(self, value: &Value) -> bool {
        !self.is(value)
    }

    /// True when `value` carries this keyword with truthy data.
    pub fn matches(self, value: &Value) -> bool {
        self.get(value).is_some_and(|data| data.is_truthy())
    }

    /// The data attached under this keyword.
    pub fn get(self, value: &Value) -> Option<Value> {
        match value {
            Value::Tagged(t) => t.get(self).cloned(),
            _ => None,
        }
    }

    pub fn unwrap(self, value: &Value) -> Value {
        tagged::unwrap(value)
    }

    /// Borrow the wrapper if `value` carries this keyword.
    pub fn wrapper(self, value: &Value) -> Option<&Tagged> {
        match value {
            Value::Tagged(t) if t.has(self) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyword({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        assert_eq!(Keyword::lookup("$static"), Some(STATIC));
        assert_eq!(Keyword::lookup("$observableProperty"), Some(OBSERVABLE_PROPERTY));
        assert_eq!(Keyword::lookup("$nope"), None);
    }

    #[test]
    fn registration_is_idempotent() {
        let a = Keyword::register("$keywordTestCustom");
        let b = Keyword::register("$keywordTestCustom");
        assert_eq!(a, b);
        assert_eq!(Keyword::lookup("$keywordTestCustom"), Some(a));
    }

    #[test]
    fn keyword_round_trip() {
        for x in [Value::from(1), Value::from("s"), Value::list([1]), Value::Undefined] {
            assert!(STATIC.is(&STATIC.tag(x.clone())));
            assert!(!STATIC.is(&x));
            assert!(STATIC.is_not(&x));
        }
    }

    #[test]
    fn two_argument_shape_carries_data() {
        let v = ALIAS.tag_with("target", Value::Undefined);
        assert_eq!(ALIAS.get(&v), Some(Value::from("target")));
        assert!(ALIAS.matches(&v));
        let off = FINAL.tag_with(false, 1);
        assert!(FINAL.is(&off));
        assert!(!FINAL.matches(&off));
    }

    #[test]
    fn stream_keywords() {
        assert!(TRIGGER.is_stream_definition());
        assert!(BARRIER.is_stream_definition());
        assert!(!BINDABLE.is_stream_definition());
    }
}
