//! Asynchronous Coordination
//!
//! Everything here is cooperative: "waiting" means registering a
//! continuation, never blocking a thread.
//!
//! - [`Promise`]: a shared, cloneable eventual value
//! - [`Lock`] and [`interlocked`]: at most one body in flight at a time
//! - [`TaskPool`]: bounded concurrency with an optional per-task time limit
//! - [`sequence`]: one-at-a-time iteration over container entries
//!
//! Async tests and applications drive these on a tokio runtime.

mod lock;
mod pool;
mod promise;
pub mod sequence;

pub use lock::{interlocked, Lock};
pub use pool::TaskPool;
pub use promise::Promise;
