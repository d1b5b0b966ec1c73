//! Useless Core
//!
//! The object system of the Useless toolbox:
//!
//! - Tags: keyword annotations on arbitrary values
//! - Hyper-operators: structure-preserving traversal, diff and matching
//! - A prototype compiler turning declarative definitions into types with
//!   inheritance, traits, aliases, macros and reflection
//! - Streams: trigger, triggerOnce, barrier and observable channels
//! - Components: compiled types with wired-up streams and a managed lifecycle
//! - Tasks: promises, locks, bounded pools and sequential iteration
//!
//! # Architecture
//!
//! - `value`: the dynamic [`Value`] model and callable [`Function`]s
//! - `tags`: keywords and the tag algebra
//! - `functional`: `map2`/`filter2`/`zip2`/`reduce2` and hyper-operators
//! - `object`: instances, members and property definitions
//! - `prototype`: definitions, compiler passes and compiled types
//! - `stream`: multicast channels and postponed delivery
//! - `component`: the component root type and lifecycle
//! - `task`: asynchronous coordination on tokio
//!
//! # Example
//!
//! ```rust,ignore
//! use useless_core::prototype::{prototype, Definition};
//! use useless_core::value::Value;
//!
//! let point = prototype(
//!     Definition::new("Point")
//!         .member("x", 0)
//!         .method("norm", |this, _| {
//!             let x = this.property("x")?.as_f64().unwrap_or(0.0);
//!             Ok(Value::from(x.abs()))
//!         }),
//! )?;
//! let p = point.instantiate(&[Value::map([("x", -3)])])?;
//! assert_eq!(p.call("norm", &[])?, Value::from(3));
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod functional;
pub mod object;
pub mod prototype;
pub mod stream;
pub mod tags;
pub mod task;
pub mod value;

pub use component::Component;
pub use config::Config;
pub use error::{Error, Result};
pub use object::Instance;
pub use prototype::{define_trait, extends, prototype, singleton, Definition, Prototype};
pub use stream::Stream;
pub use tags::Keyword;
pub use task::{Lock, Promise, TaskPool};
pub use value::{Function, Value};
