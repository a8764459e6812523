//! Ambient observer slot used for implicit registration.
//!
//! A capture session installs a [`Subscriber`] as the active observer. Every
//! tracked read on a [`Value`](crate::Value) during the session registers that
//! subscriber on the cell. Sessions nest with stack discipline: the
//! [`CaptureGuard`] restores whatever was active before it, on every exit
//! path, unwinding included.
//!
//! With `std` the slot is thread-local, so captures on different threads never
//! see each other. Under the `no_std` feature there is a single global slot and
//! the host must stay single-threaded.

use core::marker::PhantomData;

use portable_atomic_util::Arc;

use crate::observer::{ObserverId, SubscriberInner};
use crate::Subscriber;

type Slot = Option<Arc<SubscriberInner>>;

#[cfg(not(feature = "no_std"))]
mod slot {
    use core::cell::RefCell;

    use super::Slot;

    std::thread_local! {
        static ACTIVE: RefCell<Slot> = const { RefCell::new(None) };
    }

    pub(super) fn replace(next: Slot) -> Slot {
        ACTIVE.with(|active| active.replace(next))
    }

    pub(super) fn get() -> Slot {
        ACTIVE.with(|active| active.borrow().clone())
    }
}

#[cfg(feature = "no_std")]
mod slot {
    use spin::Mutex;

    use super::Slot;

    static ACTIVE: Mutex<Slot> = Mutex::new(None);

    pub(super) fn replace(next: Slot) -> Slot {
        core::mem::replace(&mut *ACTIVE.lock(), next)
    }

    pub(super) fn get() -> Slot {
        ACTIVE.lock().clone()
    }
}

/// The subscriber tracked reads should currently register, if any.
pub(crate) fn active() -> Option<Arc<SubscriberInner>> {
    slot::get()
}

/// Id of the ambient observer, `None` outside any capture session.
pub fn active_observer() -> Option<ObserverId> {
    slot::get().map(|subscriber| subscriber.id())
}

/// Restores the previously active observer when dropped.
///
/// Returned by [`begin_capture`]. The guard is tied to the thread that created
/// it.
#[must_use = "the capture session ends as soon as the guard is dropped"]
pub struct CaptureGuard {
    installed: Option<ObserverId>,
    prior: Slot,
    _not_send: PhantomData<*const ()>,
}

impl CaptureGuard {
    fn install(next: Slot) -> Self {
        let installed = next.as_ref().map(|subscriber| subscriber.id());
        let prior = slot::replace(next);
        tracing::trace!(
            observer = ?installed,
            prior = ?prior.as_ref().map(|subscriber| subscriber.id()),
            "begin capture"
        );
        Self {
            installed,
            prior,
            _not_send: PhantomData,
        }
    }

    /// Ends the session explicitly. Equivalent to dropping the guard.
    pub fn end(self) {}
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let prior = self.prior.take();
        let restored = prior.as_ref().map(|subscriber| subscriber.id());
        let replaced = slot::replace(prior);
        let replaced = replaced.as_ref().map(|subscriber| subscriber.id());

        if replaced != self.installed {
            tracing::warn!(
                expected = ?self.installed,
                found = ?replaced,
                "capture sessions ended out of order"
            );
        }
        tracing::trace!(observer = ?self.installed, restored = ?restored, "end capture");
    }
}

/// Starts a capture session for `subscriber`.
///
/// Until the returned guard is dropped, tracked reads register `subscriber`.
///
/// ```rust
/// use tracked_value::{active_observer, begin_capture, Subscriber};
///
/// let subscriber = Subscriber::new(|| {});
/// {
///     let _guard = begin_capture(&subscriber);
///     assert_eq!(active_observer(), Some(subscriber.id()));
/// }
/// assert_eq!(active_observer(), None);
/// ```
pub fn begin_capture(subscriber: &Subscriber) -> CaptureGuard {
    CaptureGuard::install(Some(subscriber.inner().clone()))
}

/// Runs `f` inside a capture session for `subscriber` and returns its result.
pub fn capture<R>(subscriber: &Subscriber, f: impl FnOnce() -> R) -> R {
    let _guard = begin_capture(subscriber);
    f()
}

/// Runs `f` with no ambient observer, so reads inside it register nobody.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = CaptureGuard::install(None);
    f()
}
