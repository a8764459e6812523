//! The reactive value cell.

use core::fmt;
use core::future::Future;

use portable_atomic_util::Arc;
use spin::Mutex;

use crate::observer::{self, CellId, ListenerSet, SharedListeners};
use crate::{scope, Subscriber, Trace, ValueState};

/// Deepest chain of `notify()` calls a single cell will serve, on one thread,
/// from inside its own fan-out. Anything deeper is dropped.
pub const MAX_NOTIFY_DEPTH: usize = 32;

struct States<T, E> {
    current: ValueState<T, E>,
    previous: ValueState<T, E>,
}

struct Inner<T, E> {
    id: CellId,
    states: Mutex<States<T, E>>,
    listeners: SharedListeners,
}

/// Per-thread count of `notify()` calls in flight for each cell.
///
/// Only calls made from inside a fan-out on the same thread count as nesting;
/// concurrent notifies from other threads never do.
#[cfg(not(feature = "no_std"))]
mod depth {
    use alloc::collections::btree_map::{BTreeMap, Entry};
    use core::cell::RefCell;

    use crate::CellId;

    std::thread_local! {
        static IN_FLIGHT: RefCell<BTreeMap<CellId, usize>> = const { RefCell::new(BTreeMap::new()) };
    }

    pub(super) fn enter(cell: CellId) -> usize {
        IN_FLIGHT.with(|in_flight| {
            let mut in_flight = in_flight.borrow_mut();
            let count = in_flight.entry(cell).or_insert(0);
            *count += 1;
            *count - 1
        })
    }

    pub(super) fn leave(cell: CellId) {
        // The slot may already be gone during thread teardown.
        let _ = IN_FLIGHT.try_with(|in_flight| {
            if let Entry::Occupied(mut count) = in_flight.borrow_mut().entry(cell) {
                *count.get_mut() -= 1;
                if *count.get() == 0 {
                    count.remove();
                }
            }
        });
    }
}

/// Single global count under `no_std`, where the host is single-threaded.
#[cfg(feature = "no_std")]
mod depth {
    use alloc::collections::btree_map::{BTreeMap, Entry};

    use spin::Mutex;

    use crate::CellId;

    static IN_FLIGHT: Mutex<BTreeMap<CellId, usize>> = Mutex::new(BTreeMap::new());

    pub(super) fn enter(cell: CellId) -> usize {
        let mut in_flight = IN_FLIGHT.lock();
        let count = in_flight.entry(cell).or_insert(0);
        *count += 1;
        *count - 1
    }

    pub(super) fn leave(cell: CellId) {
        if let Entry::Occupied(mut count) = IN_FLIGHT.lock().entry(cell) {
            *count.get_mut() -= 1;
            if *count.get() == 0 {
                count.remove();
            }
        }
    }
}

/// Marks one `notify()` as in flight until dropped, unwinding included.
struct NotifyDepth {
    cell: CellId,
    depth: usize,
}

impl NotifyDepth {
    fn enter(cell: CellId) -> Self {
        Self {
            cell,
            depth: depth::enter(cell),
        }
    }
}

impl Drop for NotifyDepth {
    fn drop(&mut self) {
        depth::leave(self.cell);
    }
}

/// A value that remembers who read it.
///
/// `Value` holds a [`ValueState`] plus a construction-time snapshot of it
/// (`previous`). Reading the state through [`current`](Self::current),
/// [`previous`](Self::previous) or [`last_known_value`](Self::last_known_value)
/// registers the ambient observer, if a capture session is running.
///
/// Setters only change the state. Nobody hears about it until
/// [`notify`](Self::notify) is called, which lets callers update several cells
/// and flush a single rebuild.
///
/// Cloning a `Value` yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tracked_value::{capture, Subscriber, Value, ValueState};
///
/// let count: Value<i32, String> = Value::new(0);
///
/// let rebuilds = Arc::new(AtomicUsize::new(0));
/// let counter = rebuilds.clone();
/// let subscriber = Subscriber::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// // Reading inside a capture session subscribes.
/// let shown = capture(&subscriber, || count.last_known_value());
/// assert_eq!(shown, Some(0));
///
/// count.set_value(42);
/// assert_eq!(rebuilds.load(Ordering::SeqCst), 0);
///
/// count.notify();
/// assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
/// assert_eq!(count.peek(), ValueState::Present(42));
/// ```
pub struct Value<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Value<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone, E> Value<T, E> {
    /// Creates a cell holding `Present(seed)`.
    pub fn new(seed: T) -> Self {
        Self::from_seed(Some(seed))
    }

    /// Creates a cell whose `current` and `previous` both start as
    /// `Present(seed)`, or `Absent` when there is no seed.
    pub fn from_seed(seed: Option<T>) -> Self {
        match seed {
            Some(seed) => Self::with_states(ValueState::Present(seed.clone()), ValueState::Present(seed)),
            None => Self::empty(),
        }
    }
}

impl<T, E> Value<T, E> {
    /// Creates a cell holding `Absent`.
    pub fn empty() -> Self {
        Self::with_states(ValueState::Absent, ValueState::Absent)
    }

    fn with_states(current: ValueState<T, E>, previous: ValueState<T, E>) -> Self {
        let id = CellId::next();
        tracing::trace!(cell = %id, present = current.is_present(), "created value");
        Self {
            inner: Arc::new(Inner {
                id,
                states: Mutex::new(States { current, previous }),
                listeners: Arc::new(Mutex::new(ListenerSet::default())),
            }),
        }
    }

    /// Identity shared by every clone of this cell.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Number of observers currently registered on this cell.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Sets `current` to `Present(value)`. Does not notify.
    pub fn set_value(&self, value: T) {
        self.replace_current(ValueState::Present(value));
    }

    /// Sets `current` to `Loading`. Does not notify.
    pub fn set_waiting(&self) {
        self.replace_current(ValueState::Loading);
    }

    /// Sets `current` to `Failed(error, trace)`. Does not notify.
    pub fn set_error(&self, error: E, trace: Trace) {
        self.replace_current(ValueState::Failed(error, trace));
    }

    /// Sets `current` to `Absent`. Does not notify.
    pub fn reset(&self) {
        self.replace_current(ValueState::Absent);
    }

    fn replace_current(&self, next: ValueState<T, E>) {
        // The old state is dropped after the lock is released.
        let _old = core::mem::replace(&mut self.inner.states.lock().current, next);
    }

    /// Calls every registered observer once.
    ///
    /// Observers are collected before any of them runs, so an observer may
    /// read, mutate or even notify this cell again. Nested notifies on the
    /// same cell and thread are served up to [`MAX_NOTIFY_DEPTH`] levels deep.
    /// A panicking observer propagates, and the cell stays usable afterwards.
    pub fn notify(&self) {
        let guard = NotifyDepth::enter(self.inner.id);
        let depth = guard.depth;
        if depth >= MAX_NOTIFY_DEPTH {
            tracing::warn!(cell = %self.inner.id, depth, "notify recursion limit reached, dropping notify");
            return;
        }

        let listeners = self.inner.listeners.lock().snapshot();
        tracing::debug!(cell = %self.inner.id, listeners = listeners.len(), depth, "notify");
        for listener in &listeners {
            listener.deliver();
        }
    }

    fn track(&self, subscriber: Option<&Subscriber>) {
        if let Some(subscriber) = subscriber {
            observer::register(subscriber.inner(), self.inner.id, &self.inner.listeners);
        }
    }

    fn track_ambient(&self) {
        if let Some(active) = scope::active() {
            observer::register(&active, self.inner.id, &self.inner.listeners);
        }
    }
}

impl<T: Clone, E: Clone> Value<T, E> {
    /// The live state. Registers the ambient observer, if any.
    pub fn current(&self) -> ValueState<T, E> {
        self.track_ambient();
        self.peek()
    }

    /// The construction-time snapshot. Registers the ambient observer, if any.
    ///
    /// This is the state the cell was created with; later transitions never
    /// update it.
    pub fn previous(&self) -> ValueState<T, E> {
        self.track_ambient();
        self.inner.states.lock().previous.clone()
    }

    /// The payload of `current` when it is `Present`. Registers the ambient
    /// observer, if any.
    pub fn last_known_value(&self) -> Option<T> {
        self.current().into_value()
    }

    /// Like [`current`](Self::current), but registers exactly the given
    /// subscriber instead of the ambient one. `None` registers nobody.
    pub fn current_in(&self, subscriber: Option<&Subscriber>) -> ValueState<T, E> {
        self.track(subscriber);
        self.peek()
    }

    /// Like [`previous`](Self::previous), with an explicit subscriber.
    pub fn previous_in(&self, subscriber: Option<&Subscriber>) -> ValueState<T, E> {
        self.track(subscriber);
        self.inner.states.lock().previous.clone()
    }

    /// Like [`last_known_value`](Self::last_known_value), with an explicit
    /// subscriber.
    pub fn last_known_value_in(&self, subscriber: Option<&Subscriber>) -> Option<T> {
        self.current_in(subscriber).into_value()
    }

    /// The live state, without registering anybody.
    pub fn peek(&self) -> ValueState<T, E> {
        self.inner.states.lock().current.clone()
    }

    /// Drives `producer` to completion, publishing each step.
    ///
    /// The cell goes to `Loading` and notifies, then stores the outcome
    /// (`Present` on `Ok`, `Failed` with a captured [`Trace`] on `Err`) and
    /// notifies again.
    pub async fn load<F>(&self, producer: F)
    where
        F: Future<Output = Result<T, E>>,
    {
        self.set_waiting();
        self.notify();

        match producer.await {
            Ok(value) => self.set_value(value),
            Err(error) => {
                tracing::debug!(cell = %self.inner.id, "producer failed");
                self.set_error(error, capture_trace());
            }
        }
        self.notify();
    }
}

#[cfg(not(feature = "no_std"))]
fn capture_trace() -> Trace {
    Trace::capture()
}

#[cfg(feature = "no_std")]
fn capture_trace() -> Trace {
    Trace::empty()
}

impl<T, E> Default for Value<T, E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Value<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states = self.inner.states.lock();
        f.debug_struct("Value")
            .field("id", &self.inner.id)
            .field("current", &states.current)
            .field("previous", &states.previous)
            .finish()
    }
}
