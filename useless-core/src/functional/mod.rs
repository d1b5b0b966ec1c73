//! Functional Traversal
//!
//! One implementation of map / filter / zip / reduce / find that works on
//! scalars, sequences, mappings and sets, plus the [`HyperOperator`] lifting
//! that turns any of them into a deep traversal.
//!
//! # Shapes
//!
//! The container shape is detected once per level ([`Shape`]) and dispatched
//! with a `match`. A scalar is treated as the single-element case, so
//! `map2(3, f) == f(3)`.
//!
//! # Filtering
//!
//! Filter predicates are tri-state: `true` keeps, `false` drops, anything
//! else replaces. That collapses filter and map into one operation and is
//! what lets [`nonempty`] replace nested containers by their pruned
//! versions.
//!
//! [`Shape`]: crate::value::Shape

mod hyper;
mod ops;
mod prune;

pub use hyper::{
    descends_into_first, descends_into_matching, hyper_filter, hyper_map, zip_zip, Arity,
    BaseOperator, Descend, HyperOperator, SubOperator, HYPER_FILTER, HYPER_MAP, ZIP_ZIP,
};
pub use ops::{entries, filter2, find2, map2, reduce2, zip2};
pub use prune::{coerce_to_undefined, diff, hyper_match, is_empty_value, nonempty, undiff};
