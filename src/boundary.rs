//! A rebuild boundary: re-runs a build function whenever a value it read is
//! notified.

use core::marker::PhantomData;

use flume::Receiver;

use crate::{Renderer, Subscriber};

/// Re-runs a build function when any [`Value`](crate::Value) it read is
/// notified, and hands each output to a [`Renderer`].
///
/// The boundary owns a [`Subscriber`] whose observer only queues a rebuild
/// request. Requests are processed by the host, through
/// [`process_rebuilds`](Self::process_rebuilds) or
/// [`next_rebuild`](Self::next_rebuild). Any number of pending requests
/// collapse into a single rebuild.
///
/// Each build runs inside a fresh capture session, after dropping the
/// previous build's subscriptions, so the boundary only listens to what its
/// latest build actually read.
///
/// # Type Parameters
///
/// * `Output` - What the build function produces
/// * `Build` - The build function
/// * `Render` - Where outputs go (implements [`Renderer`])
///
/// # Example
///
/// ```rust
/// use tracked_value::{Boundary, TestRenderer, Value};
///
/// let count: Value<u32, ()> = Value::new(1);
/// let renderer = TestRenderer::new();
///
/// let reader = count.clone();
/// let mut boundary = Boundary::new(
///     move || format!("count = {:?}", reader.last_known_value()),
///     renderer.clone(),
/// );
/// boundary.mount();
///
/// count.set_value(2);
/// count.notify();
/// assert!(boundary.process_rebuilds());
///
/// assert_eq!(renderer.last().as_deref(), Some("count = Some(2)"));
/// ```
pub struct Boundary<Output, Build, Render>
where
    Build: FnMut() -> Output,
    Render: Renderer<Output>,
{
    build: Build,
    renderer: Render,
    subscriber: Subscriber,
    requests: Receiver<()>,
    mounted: bool,
    builds: usize,
    _output: PhantomData<Output>,
}

impl<Output, Build, Render> Boundary<Output, Build, Render>
where
    Build: FnMut() -> Output,
    Render: Renderer<Output>,
{
    /// Creates an unmounted boundary. Nothing is built until
    /// [`mount`](Self::mount).
    pub fn new(build: Build, renderer: Render) -> Self {
        let (sender, requests) = flume::unbounded();
        let subscriber = Subscriber::new(move || {
            sender.send(()).ok();
        });

        Self {
            build,
            renderer,
            subscriber,
            requests,
            mounted: false,
            builds: 0,
            _output: PhantomData,
        }
    }

    /// Builds and renders for the first time. Does nothing if already mounted
    /// or after [`unmount`](Self::unmount).
    pub fn mount(&mut self) {
        if self.mounted || !self.subscriber.is_live() {
            return;
        }
        self.mounted = true;
        tracing::debug!(observer = %self.subscriber.id(), "mounting boundary");
        self.rebuild();
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Number of builds performed, the mount build included.
    pub fn build_count(&self) -> usize {
        self.builds
    }

    /// The subscriber this boundary registers on the values it reads.
    pub fn subscriber(&self) -> &Subscriber {
        &self.subscriber
    }

    /// Handles every queued rebuild request with one rebuild.
    ///
    /// Returns whether a rebuild happened. Requests that arrive while
    /// unmounted are discarded.
    pub fn process_rebuilds(&mut self) -> bool {
        let pending = self.requests.try_iter().count();
        if pending == 0 || !self.mounted {
            return false;
        }
        tracing::trace!(observer = %self.subscriber.id(), pending, "processing rebuild requests");
        self.rebuild();
        true
    }

    /// Waits for the next rebuild request, then behaves like
    /// [`process_rebuilds`](Self::process_rebuilds).
    ///
    /// Returns `false` immediately when the boundary is not mounted.
    pub async fn next_rebuild(&mut self) -> bool {
        if !self.mounted {
            return false;
        }
        if self.requests.recv_async().await.is_err() {
            return false;
        }
        let _ = self.requests.try_iter().count();
        self.rebuild();
        true
    }

    /// Stops listening. The subscriber is disposed, so stale notifications
    /// from values this boundary used to read are ignored.
    pub fn unmount(&mut self) {
        if !self.subscriber.is_live() {
            return;
        }
        tracing::debug!(observer = %self.subscriber.id(), "unmounting boundary");
        self.mounted = false;
        self.subscriber.dispose();
        let _ = self.requests.try_iter().count();
    }

    fn rebuild(&mut self) {
        self.subscriber.unsubscribe_all();

        let build = &mut self.build;
        let output = self.subscriber.capture(build);

        self.builds += 1;
        tracing::trace!(
            observer = %self.subscriber.id(),
            builds = self.builds,
            tracked = self.subscriber.subscription_count(),
            "rebuilt"
        );
        self.renderer.render(output);
    }
}

impl<Output, Build, Render> Drop for Boundary<Output, Build, Render>
where
    Build: FnMut() -> Output,
    Render: Renderer<Output>,
{
    fn drop(&mut self) {
        self.unmount();
    }
}
