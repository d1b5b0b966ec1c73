//! Per-instance component state.
//!
//! # States
//!
//! ```text
//! Constructed -> Initializing -> Live -> Destroying -> Destroyed
//!                      \___________________^
//! ```
//!
//! `init` is only legal from `Constructed`; `destroy` from any state before
//! `Destroying`. Everything else is a programmer error and fails loudly.

use std::fmt;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::bindable::Bindable;
use crate::object::{Instance, WeakInstance};
use crate::stream::Stream;
use crate::task::Promise;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Initializing,
    Live,
    Destroying,
    Destroyed,
}

impl LifecycleState {
    pub fn name(self) -> &'static str {
        match self {
            LifecycleState::Constructed => "constructed",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Live => "live",
            LifecycleState::Destroying => "destroying",
            LifecycleState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hidden state attached to every component instance.
///
/// No lock here is held while user code runs.
pub struct Lifecycle {
    pub(super) state: Mutex<LifecycleState>,
    /// Configuration after `$defaults` were applied.
    pub(super) cfg: Value,
    pub(super) parent: Mutex<Option<WeakInstance>>,
    pub(super) children: Mutex<Vec<Instance>>,
    pub(super) streams: Mutex<IndexMap<String, Stream>>,
    pub(super) bindables: Mutex<IndexMap<String, Bindable>>,
    /// Opens once `init` and its hooks have settled.
    pub(super) initialized: Stream,
    /// Continuation of an asynchronous `init`.
    pub(super) pending_init: Mutex<Option<Promise>>,
}

impl Lifecycle {
    pub(super) fn new(cfg: Value) -> Self {
        Self {
            state: Mutex::new(LifecycleState::Constructed),
            cfg,
            parent: Mutex::new(None),
            children: Mutex::new(Vec::new()),
            streams: Mutex::new(IndexMap::new()),
            bindables: Mutex::new(IndexMap::new()),
            initialized: Stream::barrier(),
            pending_init: Mutex::new(None),
        }
    }

    pub(super) fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub(super) fn set_state(&self, state: LifecycleState) {
        *self.state.lock() = state;
    }

    pub(super) fn parent(&self) -> Option<Instance> {
        self.parent.lock().as_ref().and_then(WeakInstance::upgrade)
    }

    pub(super) fn stream(&self, name: &str) -> Option<Stream> {
        self.streams.lock().get(name).cloned()
    }

    pub(super) fn add_stream(&self, name: &str, stream: Stream) {
        self.streams.lock().insert(name.to_owned(), stream);
    }

    pub(super) fn bindable(&self, name: &str) -> Option<Bindable> {
        self.bindables.lock().get(name).cloned()
    }

    pub(super) fn add_bindable(&self, name: &str, bindable: Bindable) {
        self.bindables.lock().insert(name.to_owned(), bindable);
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state())
            .field("children", &self.children.lock().len())
            .field("streams", &self.streams.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}
