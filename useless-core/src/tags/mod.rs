//! Tag System
//!
//! Tags annotate arbitrary values with named markers ("keywords") without
//! changing the value itself. The compiler reads them to decide how a member
//! is installed (`$static`, `$property`, `$final`, ...), the component layer
//! reads them to decide which members become streams or get wrapped.
//!
//! # Concepts
//!
//! ## Keywords
//!
//! A [`Keyword`] is an interned name. Applying a keyword to a value produces
//! a [`Tagged`] wrapper; applying further keywords extends the same wrapper
//! rather than nesting.
//!
//! ## The algebra
//!
//! [`wrap`], [`unwrap`], [`add`], [`extend`], [`omit`] and [`map`] are total:
//! untagged values behave as wrappers with zero keywords, never as errors.

mod keyword;
mod tagged;

pub use keyword::{
    Keyword, ALIAS, ANY, ARGUMENTS, BARRIER, BINDABLE, BUILTIN, DEBOUNCE, FINAL, INTERLOCKED, LOG,
    MEMOIZE, MEMOIZED, MEMOIZE_CPS, METHOD, OBSERVABLE, OBSERVABLE_PROPERTY, PROPERTY, RAW, STATIC,
    STREAM_KEYWORDS, THROTTLE, TRIGGER, TRIGGER_ONCE,
};
pub use tagged::{add, each, extend, get, is_tagged, keywords, map, omit, unwrap, wrap, Tagged};

use crate::value::Value;

/// The `$any` sentinel: matches anything in `diff`/`undiff`.
pub fn wildcard() -> Value {
    ANY.bare()
}

pub fn is_wildcard(value: &Value) -> bool {
    ANY.is(value)
}

/// True when `value` is a stream definition (`$trigger`, `$barrier`, ...).
pub fn is_stream_definition(value: &Value) -> bool {
    matches!(value, Value::Tagged(t) if t.is_stream_definition())
}
