//! Observers and the subscriber handles that own them.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use portable_atomic_util::{Arc, Weak};
use spin::Mutex;

use crate::Value;

/// Something that wants to hear about changes to the cells it read.
///
/// Closures implement this trait via the blanket implementation, so a
/// subscriber is usually built straight from one:
///
/// ```rust
/// use tracked_value::Subscriber;
///
/// let subscriber = Subscriber::new(|| println!("something I read changed"));
/// assert!(subscriber.is_live());
/// ```
pub trait Observer {
    /// Called once per [`Value::notify`] on every cell this observer is
    /// registered on. Takes no arguments: the observer re-reads what it needs.
    fn on_notify(&self);
}

impl<F> Observer for F
where
    F: Fn(),
{
    fn on_notify(&self) {
        self()
    }
}

static NEXT_OBSERVER_ID: AtomicUsize = AtomicUsize::new(1);
static NEXT_CELL_ID: AtomicUsize = AtomicUsize::new(1);

/// Process-unique identity of a [`Subscriber`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(usize);

impl ObserverId {
    fn next() -> Self {
        ObserverId(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Process-unique identity of a [`Value`] cell, shared by all its clones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(usize);

impl CellId {
    pub(crate) fn next() -> Self {
        CellId(NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Per-cell listener collection, keyed by observer id.
///
/// Holds weak references only: a cell never keeps an observer alive.
#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: BTreeMap<ObserverId, Weak<SubscriberInner>>,
}

pub(crate) type SharedListeners = Arc<Mutex<ListenerSet>>;

impl ListenerSet {
    /// Returns `false` when the observer was already present.
    fn insert(&mut self, id: ObserverId, subscriber: Weak<SubscriberInner>) -> bool {
        match self.entries.entry(id) {
            alloc::collections::btree_map::Entry::Occupied(_) => false,
            alloc::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(subscriber);
                true
            }
        }
    }

    fn remove(&mut self, id: ObserverId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Upgrades every listener that is still alive, dropping the rest.
    pub(crate) fn snapshot(&mut self) -> Vec<Arc<SubscriberInner>> {
        let mut alive = Vec::with_capacity(self.entries.len());
        self.entries.retain(|_, weak| match weak.upgrade() {
            Some(subscriber) => {
                alive.push(subscriber);
                true
            }
            None => false,
        });
        alive
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) struct SubscriberInner {
    id: ObserverId,
    observer: Box<dyn Observer + Send + Sync>,
    live: AtomicBool,
    /// Cells this subscriber is registered on, so it can remove itself later.
    subscriptions: Mutex<BTreeMap<CellId, Weak<Mutex<ListenerSet>>>>,
}

/// Forgets cells whose last handle is gone.
fn prune_dropped_cells(subscriptions: &mut BTreeMap<CellId, Weak<Mutex<ListenerSet>>>) {
    subscriptions.retain(|_, listeners| listeners.upgrade().is_some());
}

impl SubscriberInner {
    pub(crate) fn id(&self) -> ObserverId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Forwards a notification unless the subscriber has been disposed.
    pub(crate) fn deliver(&self) {
        if self.is_live() {
            self.observer.on_notify();
        } else {
            tracing::trace!(observer = %self.id, "dropping notification for disposed observer");
        }
    }

    fn unsubscribe_all(&self) -> usize {
        let subscriptions = core::mem::take(&mut *self.subscriptions.lock());
        let count = subscriptions.len();
        for (cell, listeners) in subscriptions {
            if let Some(listeners) = listeners.upgrade() {
                listeners.lock().remove(self.id);
            } else {
                tracing::trace!(observer = %self.id, %cell, "cell already dropped");
            }
        }
        count
    }
}

/// Registers `subscriber` on a cell's listener set and records the cell in
/// the subscriber's own tracking set. Both sides are idempotent.
pub(crate) fn register(subscriber: &Arc<SubscriberInner>, cell: CellId, listeners: &SharedListeners) {
    if !subscriber.is_live() {
        return;
    }

    let fresh = listeners
        .lock()
        .insert(subscriber.id, Arc::downgrade(subscriber));

    let mut subscriptions = subscriber.subscriptions.lock();
    if !subscriptions.contains_key(&cell) {
        subscriptions.insert(cell, Arc::downgrade(listeners));
        prune_dropped_cells(&mut subscriptions);
    }
    drop(subscriptions);

    if fresh {
        tracing::trace!(observer = %subscriber.id, %cell, "registered listener");
    }
}

/// Owning handle for an [`Observer`].
///
/// A subscriber remembers every cell it got registered on (through a capture
/// session or an explicit `*_in` read) so that it can take itself off all of
/// them again. Dropping the handle disposes it.
///
/// # Example
///
/// ```rust
/// use tracked_value::{Subscriber, Value};
///
/// let count: Value<i32, String> = Value::new(0);
/// let subscriber = Subscriber::new(|| {});
///
/// count.current_in(Some(&subscriber));
/// assert!(subscriber.is_subscribed_to(&count));
///
/// subscriber.unsubscribe_all();
/// assert_eq!(count.listener_count(), 0);
/// ```
pub struct Subscriber {
    inner: Arc<SubscriberInner>,
}

impl Subscriber {
    pub fn new<O>(observer: O) -> Self
    where
        O: Observer + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(SubscriberInner {
                id: ObserverId::next(),
                observer: Box::new(observer),
                live: AtomicBool::new(true),
                subscriptions: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.inner.id
    }

    /// `false` once [`dispose`](Self::dispose) ran. A disposed subscriber
    /// ignores notifications and is never registered again.
    pub fn is_live(&self) -> bool {
        self.inner.is_live()
    }

    /// Number of distinct live cells this subscriber is registered on.
    pub fn subscription_count(&self) -> usize {
        let mut subscriptions = self.inner.subscriptions.lock();
        prune_dropped_cells(&mut subscriptions);
        subscriptions.len()
    }

    pub fn is_subscribed_to<T, E>(&self, value: &Value<T, E>) -> bool {
        self.inner.subscriptions.lock().contains_key(&value.id())
    }

    /// Removes this subscriber from every cell it is registered on.
    ///
    /// The subscriber stays live and may be registered again by later reads.
    pub fn unsubscribe_all(&self) {
        let count = self.inner.unsubscribe_all();
        if count > 0 {
            tracing::debug!(observer = %self.inner.id, cells = count, "unsubscribed");
        }
    }

    /// Marks the subscriber dead and unsubscribes it everywhere.
    ///
    /// Safe to call more than once.
    pub fn dispose(&self) {
        if self.inner.live.swap(false, Ordering::AcqRel) {
            tracing::debug!(observer = %self.inner.id, "disposing observer");
        }
        self.unsubscribe_all();
    }

    /// Runs `f` with this subscriber as the ambient observer.
    ///
    /// Shorthand for [`capture`](crate::capture).
    pub fn capture<R>(&self, f: impl FnOnce() -> R) -> R {
        crate::scope::capture(self, f)
    }

    pub(crate) fn inner(&self) -> &Arc<SubscriberInner> {
        &self.inner
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.inner.id)
            .field("live", &self.is_live())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}
