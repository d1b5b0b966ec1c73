//! Stream Implementation
//!
//! A [`Stream`] is a multicast channel with one calling convention: calling
//! it with a function registers a reader, calling it with anything else
//! writes. The four kinds differ only in what a write does to the queue and
//! what a late reader sees.
//!
//! # Kinds
//!
//! | Kind | Write | Read |
//! |---|---|---|
//! | trigger | dispatch to the queue, keep it | enqueue |
//! | triggerOnce | dispatch, then clear the queue | enqueue unless already queued |
//! | barrier | first write latches and dispatches, later writes do nothing | replay the latched value, or enqueue |
//! | observable | dispatch `(new, previous)` only if the value changed | enqueue, replay the current value if any |
//!
//! # Locking
//!
//! The queue and latch are behind `parking_lot` mutexes, and both are released
//! before any reader runs: readers are free to read, write or unbind the
//! stream they are called from. The latch is always taken before the queue.
//!
//! A failing reader does not stop the multicast: every reader is called and
//! the first error is returned once the dispatch is over.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use super::reader::{QueuedBy, ReaderId};
use super::schedule;
use crate::error::Result;
use crate::object::{Instance, WeakInstance};
use crate::tags::{Keyword, BARRIER, OBSERVABLE, TRIGGER, TRIGGER_ONCE};
use crate::value::{Function, Value};

static STREAM_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_stream_id() -> u64 {
    STREAM_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Trigger,
    TriggerOnce,
    Barrier,
    Observable,
}

impl StreamKind {
    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Trigger => "trigger",
            StreamKind::TriggerOnce => "triggerOnce",
            StreamKind::Barrier => "barrier",
            StreamKind::Observable => "observable",
        }
    }

    pub fn keyword(self) -> Keyword {
        match self {
            StreamKind::Trigger => TRIGGER,
            StreamKind::TriggerOnce => TRIGGER_ONCE,
            StreamKind::Barrier => BARRIER,
            StreamKind::Observable => OBSERVABLE,
        }
    }

    pub fn from_keyword(keyword: Keyword) -> Option<Self> {
        [
            StreamKind::Trigger,
            StreamKind::TriggerOnce,
            StreamKind::Barrier,
            StreamKind::Observable,
        ]
        .into_iter()
        .find(|kind| kind.keyword() == keyword)
    }

    /// The stream kind declared by a tagged member, if any.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Tagged(t) => t.keywords().keys().find_map(|k| Self::from_keyword(*k)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Replays to late readers are postponed until the current dispatch ends.
    pub postpones: bool,
    /// Observables compare by reference instead of structurally.
    pub track_reference: bool,
}

#[derive(Default)]
struct Latch {
    value: Value,
    has_value: bool,
}

pub(crate) struct StreamInner {
    id: u64,
    kind: StreamKind,
    options: StreamOptions,
    pub(crate) queue: Mutex<BTreeMap<ReaderId, Function>>,
    latch: Mutex<Latch>,
    context: RwLock<Option<WeakInstance>>,
}

/// A callable multicast channel. Clones share the same queue.
#[derive(Clone)]
pub struct Stream(Arc<StreamInner>);

impl Stream {
    pub fn new(kind: StreamKind) -> Self {
        Self::with_options(kind, StreamOptions::default())
    }

    pub fn with_options(kind: StreamKind, options: StreamOptions) -> Self {
        Self(Arc::new(StreamInner {
            id: next_stream_id(),
            kind,
            options,
            queue: Mutex::new(BTreeMap::new()),
            latch: Mutex::new(Latch::default()),
            context: RwLock::new(None),
        }))
    }

    pub fn trigger() -> Self {
        Self::new(StreamKind::Trigger)
    }

    pub fn trigger_once() -> Self {
        Self::new(StreamKind::TriggerOnce)
    }

    pub fn barrier() -> Self {
        Self::new(StreamKind::Barrier)
    }

    pub fn observable() -> Self {
        Self::new(StreamKind::Observable)
    }

    /// An observable that already holds `initial`.
    pub fn observable_with(initial: Value, options: StreamOptions) -> Self {
        let stream = Self::with_options(StreamKind::Observable, options);
        *stream.0.latch.lock() = Latch {
            value: initial,
            has_value: true,
        };
        stream
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> StreamKind {
        self.0.kind
    }

    pub fn options(&self) -> StreamOptions {
        self.0.options
    }

    pub fn ptr_eq(&self, other: &Stream) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Readers are called with this instance as `this`. Held weakly.
    pub fn set_context(&self, owner: &Instance) {
        *self.0.context.write() = Some(owner.downgrade());
    }

    fn context(&self) -> Value {
        self.0
            .context
            .read()
            .as_ref()
            .and_then(WeakInstance::upgrade)
            .map(Value::Object)
            .unwrap_or_default()
    }

    /// The latched (barrier) or current (observable) value.
    pub fn value(&self) -> Value {
        self.0.latch.lock().value.clone()
    }

    pub fn has_value(&self) -> bool {
        self.0.latch.lock().has_value
    }

    pub fn reader_count(&self) -> usize {
        self.0.queue.lock().len()
    }

    // ------------------------------------------------------------------
    // Unified convention
    // ------------------------------------------------------------------

    /// Read when the first argument is a function, write otherwise.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        match args.first() {
            Some(Value::Func(reader)) => {
                self.read(reader)?;
                Ok(Value::Undefined)
            }
            _ => {
                self.write(args)?;
                Ok(Value::Undefined)
            }
        }
    }

    /// This stream as a plain function value.
    pub fn as_function(&self) -> Function {
        let stream = self.clone();
        Function::named(self.kind().name(), move |_, args| stream.call(args))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn read(&self, reader: &Function) -> Result<()> {
        let _scope = schedule::enter();
        match self.kind() {
            StreamKind::Trigger => self.enqueue(reader),
            StreamKind::TriggerOnce => {
                let queued = self.0.queue.lock().values().any(|f| f.ptr_eq(reader));
                if !queued {
                    self.enqueue(reader);
                }
            }
            // The latch stays locked while enqueueing so a concurrent write
            // either sees this reader in its queue or latches after the check.
            StreamKind::Barrier => {
                let latched = {
                    let latch = self.0.latch.lock();
                    if !latch.has_value {
                        self.enqueue(reader);
                    }
                    latch.has_value.then(|| latch.value.clone())
                };
                if let Some(value) = latched {
                    return self.replay(reader, vec![value]);
                }
            }
            StreamKind::Observable => {
                let current = {
                    let latch = self.0.latch.lock();
                    self.enqueue(reader);
                    latch.has_value.then(|| latch.value.clone())
                };
                if let Some(value) = current {
                    return self.replay(reader, vec![value]);
                }
            }
        }
        Ok(())
    }

    fn enqueue(&self, reader: &Function) {
        let entry = ReaderId::new();
        self.0.queue.lock().insert(entry, reader.clone());
        reader.enroll(QueuedBy {
            stream_id: self.id(),
            stream: Arc::downgrade(&self.0),
            entry,
        });
    }

    fn replay(&self, reader: &Function, args: Vec<Value>) -> Result<()> {
        let this = self.context();
        if self.0.options.postpones {
            schedule::postpone(reader.clone(), this, args);
            Ok(())
        } else {
            reader.call(&this, &args).map(drop)
        }
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    pub fn write(&self, args: &[Value]) -> Result<()> {
        let first = args.first().cloned().unwrap_or_default();
        let (readers, delivered) = match self.kind() {
            StreamKind::Trigger => (self.snapshot(), args.to_vec()),
            StreamKind::TriggerOnce => (self.take_queue(), args.to_vec()),
            StreamKind::Barrier => {
                {
                    let mut latch = self.0.latch.lock();
                    if latch.has_value {
                        return Ok(());
                    }
                    *latch = Latch {
                        value: first.clone(),
                        has_value: true,
                    };
                }
                (self.take_queue(), vec![first])
            }
            StreamKind::Observable => {
                let previous = {
                    let mut latch = self.0.latch.lock();
                    let unchanged = latch.has_value
                        && if self.0.options.track_reference {
                            latch.value.same(&first)
                        } else {
                            latch.value.is_equal(&first)
                        };
                    if unchanged {
                        return Ok(());
                    }
                    latch.has_value = true;
                    std::mem::replace(&mut latch.value, first.clone())
                };
                (self.snapshot(), vec![first, previous])
            }
        };
        self.dispatch(&readers, &delivered)
    }

    fn snapshot(&self) -> Vec<Function> {
        self.0.queue.lock().values().cloned().collect()
    }

    fn take_queue(&self) -> Vec<Function> {
        let taken = std::mem::take(&mut *self.0.queue.lock());
        taken
            .into_iter()
            .map(|(entry, reader)| {
                reader.withdraw(self.id(), entry);
                reader
            })
            .collect()
    }

    fn dispatch(&self, readers: &[Function], args: &[Value]) -> Result<()> {
        trace!(stream = self.id(), kind = self.kind().name(), readers = readers.len(), "dispatch");
        let _scope = schedule::enter();
        let this = self.context();
        let mut first_error = None;
        for reader in readers {
            if let Err(err) = reader.call(&this, args) {
                warn!(stream = self.id(), error = %err, "reader failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // ------------------------------------------------------------------
    // Unbind
    // ------------------------------------------------------------------

    /// Remove every queue entry of `reader`.
    pub fn off(&self, reader: &Function) {
        let removed: Vec<ReaderId> = {
            let mut queue = self.0.queue.lock();
            let entries: Vec<ReaderId> = queue
                .iter()
                .filter(|(_, f)| f.ptr_eq(reader))
                .map(|(entry, _)| *entry)
                .collect();
            for entry in &entries {
                queue.remove(entry);
            }
            entries
        };
        for entry in removed {
            reader.withdraw(self.id(), entry);
        }
    }

    /// Flush the whole queue.
    pub fn off_all(&self) {
        self.take_queue();
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("readers", &self.reader_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
