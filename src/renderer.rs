//! Sink for the output of a rebuild boundary.

#[cfg(any(test, feature = "testing"))]
use alloc::vec::Vec;

#[cfg(any(test, feature = "testing"))]
use portable_atomic_util::Arc;
#[cfg(any(test, feature = "testing"))]
use spin::Mutex;

/// Receives what a [`Boundary`](crate::Boundary) builds.
///
/// Implement this to hand build output to whatever actually displays it
/// (a widget tree, a terminal frame, a test buffer).
///
/// # Example
///
/// ```rust
/// use tracked_value::Renderer;
///
/// struct Console;
///
/// impl Renderer<String> for Console {
///     fn render(&mut self, line: String) {
///         println!("{line}");
///     }
/// }
/// ```
pub trait Renderer<Output> {
    /// Called after every build, including the first one at mount time.
    fn render(&mut self, output: Output);
}

/// Renderer that records every output for later assertions.
///
/// Only available with the `testing` feature. Clones share the same record,
/// so keep one clone and hand the other to the boundary.
///
/// ```rust
/// use tracked_value::{Boundary, TestRenderer, Value};
///
/// let name: Value<&'static str, ()> = Value::new("ada");
/// let renderer = TestRenderer::new();
///
/// let reader = name.clone();
/// let mut boundary = Boundary::new(move || reader.last_known_value(), renderer.clone());
/// boundary.mount();
///
/// renderer.with_renders(|renders| assert_eq!(renders, &[Some("ada")]));
/// ```
#[cfg(any(test, feature = "testing"))]
pub struct TestRenderer<Output> {
    renders: Arc<Mutex<Vec<Output>>>,
}

#[cfg(any(test, feature = "testing"))]
impl<Output> Clone for TestRenderer<Output> {
    fn clone(&self) -> Self {
        Self {
            renders: self.renders.clone(),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl<Output> Renderer<Output> for TestRenderer<Output> {
    fn render(&mut self, output: Output) {
        self.renders.lock().push(output);
    }
}

#[cfg(any(test, feature = "testing"))]
impl<Output> Default for TestRenderer<Output> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "testing"))]
impl<Output> TestRenderer<Output> {
    pub fn new() -> Self {
        Self {
            renders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of outputs rendered so far.
    pub fn count(&self) -> usize {
        self.renders.lock().len()
    }

    /// Runs `f` against everything rendered so far, oldest first.
    pub fn with_renders<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Vec<Output>) -> R,
    {
        let renders = self.renders.lock();
        f(&renders)
    }
}

#[cfg(any(test, feature = "testing"))]
impl<Output: Clone> TestRenderer<Output> {
    /// The most recent output, if anything was rendered.
    pub fn last(&self) -> Option<Output> {
        self.renders.lock().last().cloned()
    }
}
