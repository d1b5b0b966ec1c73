//! Stream Primitives
//!
//! Multicast channels with one read/write calling convention and four
//! buffering policies (trigger, triggerOnce, barrier, observable).
//!
//! # How It Works
//!
//! 1. A reader is a [`Function`](crate::value::Function). Reading enqueues it
//!    under a fresh [`ReaderId`] and records a back-reference on the function.
//!
//! 2. A write snapshots the queue, releases every lock, and calls the readers
//!    in registration order.
//!
//! 3. Unbinding goes through the back-references, so
//!    `Function::off_everywhere` removes a reader from every stream it is in.
//!
//! 4. Replays to late readers may be postponed; postponed readers run after
//!    the outermost dispatch loop on the current thread (see [`schedule`]).

mod channel;
mod reader;
pub mod schedule;

pub use channel::{Stream, StreamKind, StreamOptions};
pub(crate) use reader::QueuedBy;
pub use reader::ReaderId;
