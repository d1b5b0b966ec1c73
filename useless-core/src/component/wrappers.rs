//! Method wrappers applied by member tags.
//!
//! Each wrapper takes a function and returns a new one with the same name.
//! The component constructor applies them per instance, so caches and timers
//! are never shared between instances.
//!
//! | Tag | Wrapper |
//! |---|---|
//! | `$log` | [`log_calls`] |
//! | `$memoize` | [`memoize`] |
//! | `$memoizeCPS` | [`memoize_cps`] |
//! | `$debounce` | [`debounce`] |
//! | `$throttle` | [`throttle`] |
//! | `$interlocked` | [`interlocked`](crate::task::interlocked) |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::task::Promise;
use crate::value::{Function, Value};

fn wrapped_name(f: &Function, fallback: &str) -> String {
    f.name().unwrap_or(fallback).to_owned()
}

fn render_args(args: &[Value]) -> String {
    args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Trace every call of `f` at `info` level under `label`.
pub fn log_calls(label: &str, f: Function) -> Function {
    let label: Arc<str> = Arc::from(label);
    let name = wrapped_name(&f, &label);
    Function::named(name, move |this, args| {
        let rendered = render_args(args);
        match f.call(this, args) {
            Ok(result) => {
                info!(target: "useless::log", "{label}({rendered}) -> {result}");
                Ok(result)
            }
            Err(error) => {
                info!(target: "useless::log", "{label}({rendered}) failed: {error}");
                Err(error)
            }
        }
    })
}

/// Cache results by argument list. Failed calls are not cached.
pub fn memoize(f: Function) -> Function {
    let cache: Mutex<Vec<(Vec<Value>, Value)>> = Mutex::new(Vec::new());
    Function::named(wrapped_name(&f, "memoized"), move |this, args| {
        if let Some((_, hit)) = cache.lock().iter().find(|(key, _)| key.as_slice() == args) {
            return Ok(hit.clone());
        }
        let result = f.call(this, args)?;
        cache.lock().push((args.to_vec(), result.clone()));
        Ok(result)
    })
}

/// Cache the promise of an asynchronous function by argument list.
///
/// Concurrent calls with equal arguments share one promise. A rejected
/// promise is evicted on the next call, which then retries.
pub fn memoize_cps(f: Function) -> Function {
    let cache: Mutex<Vec<(Vec<Value>, Promise)>> = Mutex::new(Vec::new());
    Function::named(wrapped_name(&f, "memoizedCPS"), move |this, args| {
        {
            let mut entries = cache.lock();
            entries.retain(|(_, promise)| !matches!(promise.peek(), Some(Err(_))));
            if let Some((_, hit)) = entries.iter().find(|(key, _)| key.as_slice() == args) {
                return Ok(Value::Promise(hit.clone()));
            }
        }
        let promise = match f.call(this, args)? {
            Value::Promise(promise) => promise,
            value => Promise::new(async move { value.settle().await }),
        };
        cache.lock().push((args.to_vec(), promise.clone()));
        Ok(Value::Promise(promise))
    })
}

/// Run `f` once calls have stopped arriving for `window`, with the arguments
/// of the last call.
///
/// Calls return `Undefined` right away. Outside a tokio runtime there is no
/// timer, so every call goes straight through.
pub fn debounce(f: Function, window: Duration) -> Function {
    let generation = Arc::new(AtomicU64::new(0));
    Function::named(wrapped_name(&f, "debounced"), move |this, args| {
        let Ok(handle) = Handle::try_current() else {
            return f.call(this, args);
        };
        let mine = generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (generation, f, this, args) = (generation.clone(), f.clone(), this.clone(), args.to_vec());
        handle.spawn(async move {
            tokio::time::sleep(window).await;
            if generation.load(Ordering::SeqCst) != mine {
                return;
            }
            if let Err(error) = f.call(&this, &args) {
                warn!(%error, "debounced call failed");
            }
        });
        Ok(Value::Undefined)
    })
}

#[derive(Default)]
struct ThrottleState {
    cooling: bool,
    trailing: Option<(Value, Vec<Value>)>,
    /// Leading-edge time, used when no runtime is available.
    last_leading: Option<Instant>,
}

/// Run `f` at most once per `window`.
///
/// The first call runs immediately. Calls during the window collapse into one
/// trailing call with the latest arguments, run when the window closes.
/// Outside a tokio runtime the trailing call is dropped.
pub fn throttle(f: Function, window: Duration) -> Function {
    let state = Arc::new(Mutex::new(ThrottleState::default()));
    Function::named(wrapped_name(&f, "throttled"), move |this, args| {
        let Ok(handle) = Handle::try_current() else {
            let now = Instant::now();
            {
                let mut st = state.lock();
                if st.last_leading.is_some_and(|t| now.duration_since(t) < window) {
                    return Ok(Value::Undefined);
                }
                st.last_leading = Some(now);
            }
            return f.call(this, args);
        };

        {
            let mut st = state.lock();
            if st.cooling {
                st.trailing = Some((this.clone(), args.to_vec()));
                return Ok(Value::Undefined);
            }
            st.cooling = true;
        }
        let result = f.call(this, args);

        let (state, f) = (state.clone(), f.clone());
        handle.spawn(async move {
            loop {
                tokio::time::sleep(window).await;
                let next = {
                    let mut st = state.lock();
                    match st.trailing.take() {
                        Some(call) => call,
                        None => {
                            st.cooling = false;
                            break;
                        }
                    }
                };
                if let Err(error) = f.call(&next.0, &next.1) {
                    warn!(%error, "throttled call failed");
                }
            }
        });
        result
    })
}
