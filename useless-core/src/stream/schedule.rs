//! Dispatch Scheduling
//!
//! Tracks whether a stream dispatch loop is running on the current thread and
//! holds readers whose delivery was postponed.
//!
//! # Implementation
//!
//! Each dispatch enters a [`DispatchScope`]; scopes nest. Postponed readers
//! are queued thread-locally and run, in FIFO order, when the outermost scope
//! is dropped. Readers that run during the drain may write to streams and
//! postpone further readers; those are picked up by the same drain.
//!
//! A postponed reader has no caller to return an error to, so its errors are
//! logged and dropped.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::marker::PhantomData;

use tracing::warn;

use crate::value::{Function, Value};

struct Postponed {
    reader: Function,
    this: Value,
    args: Vec<Value>,
}

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
    static POSTPONED: RefCell<VecDeque<Postponed>> = const { RefCell::new(VecDeque::new()) };
}

/// Guard marking a running dispatch loop. Not `Send`: scopes belong to the
/// thread that entered them.
pub struct DispatchScope {
    _thread_bound: PhantomData<*const ()>,
}

/// Enter a dispatch scope.
pub fn enter() -> DispatchScope {
    DEPTH.with(|d| d.set(d.get() + 1));
    DispatchScope {
        _thread_bound: PhantomData,
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        let depth = DEPTH.with(|d| {
            let next = d.get().saturating_sub(1);
            d.set(next);
            next
        });
        if depth == 0 && !DRAINING.with(Cell::get) {
            drain();
        }
    }
}

/// True while a dispatch loop is running on this thread.
pub fn is_dispatching() -> bool {
    DEPTH.with(Cell::get) > 0
}

/// Number of readers waiting for the current dispatch loop to finish.
pub fn pending() -> usize {
    POSTPONED.with(|q| q.borrow().len())
}

/// Queue `reader` to run after the outermost dispatch on this thread ends.
///
/// Outside any dispatch the reader runs immediately.
pub fn postpone(reader: Function, this: Value, args: Vec<Value>) {
    POSTPONED.with(|q| q.borrow_mut().push_back(Postponed { reader, this, args }));
    if !is_dispatching() && !DRAINING.with(Cell::get) {
        drain();
    }
}

struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|d| d.set(false));
    }
}

fn drain() {
    DRAINING.with(|d| d.set(true));
    let _guard = DrainGuard;
    while let Some(next) = POSTPONED.with(|q| q.borrow_mut().pop_front()) {
        let _scope = enter();
        if let Err(error) = next.reader.call(&next.this, &next.args) {
            warn!(reader = ?next.reader, %error, "postponed reader failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Function {
        let log = log.clone();
        Function::new(move |_, _| {
            log.lock().push(tag);
            Ok(Value::Undefined)
        })
    }

    #[test]
    fn postponed_runs_after_outermost_scope() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let _outer = enter();
            {
                let _inner = enter();
                postpone(recorder(&log, "late"), Value::Undefined, vec![]);
                log.lock().push("inner");
            }
            assert_eq!(pending(), 1);
            log.lock().push("outer");
        }
        assert_eq!(*log.lock(), vec!["inner", "outer", "late"]);
        assert!(!is_dispatching());
    }

    #[test]
    fn postpone_outside_dispatch_runs_now() {
        let log = Arc::new(Mutex::new(Vec::new()));
        postpone(recorder(&log, "now"), Value::Undefined, vec![]);
        assert_eq!(*log.lock(), vec!["now"]);
        assert_eq!(pending(), 0);
    }

    #[test]
    fn failing_postponed_reader_does_not_stop_drain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let _scope = enter();
            postpone(
                Function::new(|_, _| Err(crate::Error::custom("boom"))),
                Value::Undefined,
                vec![],
            );
            postpone(recorder(&log, "after"), Value::Undefined, vec![]);
        }
        assert_eq!(*log.lock(), vec!["after"]);
    }
}
