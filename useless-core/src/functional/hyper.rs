//! Hyper-operators.
//!
//! A [`HyperOperator`] lifts a shallow operator into one that recurses through
//! nested containers. At every level a descend predicate looks at the
//! arguments: if it says "descend", the base operator runs with the hyper
//! operator itself as its element function; otherwise the caller's leaf
//! function is applied. `hyper_map`, `hyper_filter` and `zip_zip` are all
//! produced this way, with no traversal code of their own.

use std::slice;

use super::ops::{filter2, map2, zip2};
use crate::value::{Key, Value};

/// Element function handed to a base operator.
pub type SubOperator<'a> = &'a mut dyn FnMut(&[Value], &Key) -> Value;

/// A shallow operator over its argument list.
pub type BaseOperator = fn(&[Value], SubOperator<'_>) -> Value;

/// Decides whether to descend into the given arguments.
pub type Descend = fn(&[Value]) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
    Variadic,
}

impl Arity {
    fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Unary => n == 1,
            Arity::Binary => n == 2,
            Arity::Variadic => n >= 1,
        }
    }
}

/// A shallow operator lifted to recurse until it reaches trivial leaves.
#[derive(Clone, Copy)]
pub struct HyperOperator {
    arity: Arity,
    base: BaseOperator,
    descend: Descend,
}

impl HyperOperator {
    /// Lift `base`; by default descend while the first argument is a container.
    pub const fn new(arity: Arity, base: BaseOperator) -> Self {
        Self {
            arity,
            base,
            descend: descends_into_first,
        }
    }

    pub const fn descending(self, descend: Descend) -> Self {
        Self {
            arity: self.arity,
            base: self.base,
            descend,
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn apply<F>(&self, args: &[Value], mut leaf: F) -> Value
    where
        F: FnMut(&[Value], &Key) -> Value,
    {
        debug_assert!(
            self.arity.accepts(args.len()),
            "hyper operator of arity {:?} applied to {} arguments",
            self.arity,
            args.len()
        );
        self.apply_at(args, &Key::None, &mut leaf)
    }

    fn apply_at<F>(&self, args: &[Value], key: &Key, leaf: &mut F) -> Value
    where
        F: FnMut(&[Value], &Key) -> Value,
    {
        if (self.descend)(args) {
            (self.base)(args, &mut |sub: &[Value], k: &Key| self.apply_at(sub, k, leaf))
        } else {
            leaf(args, key)
        }
    }
}

/// Descend while the first argument is a list, map or set.
pub fn descends_into_first(args: &[Value]) -> bool {
    args.first().is_some_and(|v| !v.is_trivial())
}

/// Descend while every argument is a container of the same shape.
pub fn descends_into_matching(args: &[Value]) -> bool {
    match args.first() {
        Some(first) if !first.is_trivial() => args.iter().all(|v| v.shape() == first.shape()),
        _ => false,
    }
}

fn first(args: &[Value]) -> Value {
    args.first().cloned().unwrap_or_default()
}

fn map_base(args: &[Value], sub: SubOperator<'_>) -> Value {
    map2(&first(args), |v, k| sub(slice::from_ref(v), k))
}

fn filter_base(args: &[Value], sub: SubOperator<'_>) -> Value {
    filter2(&first(args), |v, k| sub(slice::from_ref(v), k))
}

fn zip_base(args: &[Value], sub: SubOperator<'_>) -> Value {
    zip2(args, |row, k| sub(row, k))
}

pub const HYPER_MAP: HyperOperator = HyperOperator::new(Arity::Unary, map_base);
pub const HYPER_FILTER: HyperOperator = HyperOperator::new(Arity::Unary, filter_base);
pub const ZIP_ZIP: HyperOperator =
    HyperOperator::new(Arity::Variadic, zip_base).descending(descends_into_matching);

/// Map every trivial leaf of a nested structure.
pub fn hyper_map(value: &Value, mut f: impl FnMut(&Value, &Key) -> Value) -> Value {
    HYPER_MAP.apply(slice::from_ref(value), |args, k| f(&first(args), k))
}

/// Tri-state filter applied to every trivial leaf; nested containers are
/// replaced by their filtered versions.
pub fn hyper_filter<R>(value: &Value, mut pred: impl FnMut(&Value, &Key) -> R) -> Value
where
    R: Into<Value>,
{
    HYPER_FILTER.apply(slice::from_ref(value), |args, k| pred(&first(args), k).into())
}

/// Zip structures of matching shape all the way down.
pub fn zip_zip(values: &[Value], f: impl FnMut(&[Value], &Key) -> Value) -> Value {
    ZIP_ZIP.apply(values, f)
}
