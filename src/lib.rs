#![cfg_attr(feature = "no_std", no_std)]

//! A small reactive value cell with implicit subscriber tracking.
//!
//! A [`Value`] holds one of four lifecycle states ([`ValueState`]): a present
//! value, nothing, loading, or a failure. Code that reads a value inside a
//! capture session is silently registered as one of its observers. Mutating a
//! value never notifies anybody on its own; the caller decides when to flush
//! with [`Value::notify`], so several related changes produce one rebuild.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use tracked_value::{capture, Subscriber, Trace, Value, ValueState};
//!
//! let user: Value<String, String> = Value::empty();
//! let greeting: Value<&'static str, String> = Value::new("hello");
//!
//! let rebuilds = Arc::new(AtomicUsize::new(0));
//! let counter = rebuilds.clone();
//! let view = Subscriber::new(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! // Both reads register `view`.
//! capture(&view, || {
//!     let _ = user.current();
//!     let _ = greeting.current();
//! });
//! assert_eq!(view.subscription_count(), 2);
//!
//! user.set_waiting();
//! user.notify();
//! assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
//!
//! user.set_error("timed out".to_string(), Trace::from("fetch_user"));
//! user.notify();
//! assert!(matches!(user.peek(), ValueState::Failed(..)));
//! assert_eq!(rebuilds.load(Ordering::SeqCst), 2);
//!
//! // Dropping the subscriber takes it off every value it read.
//! drop(view);
//! assert_eq!(user.listener_count(), 0);
//! ```

extern crate alloc;

// Module declarations
mod boundary;
mod observer;
mod renderer;
mod scope;
mod state;
mod value;

// Public re-exports
pub use boundary::Boundary;
pub use observer::{CellId, Observer, ObserverId, Subscriber};
pub use renderer::Renderer;
pub use scope::{active_observer, begin_capture, capture, untracked, CaptureGuard};
pub use state::{Trace, ValueState};
pub use value::{Value, MAX_NOTIFY_DEPTH};

// Test utilities (only available with 'testing' feature or during tests)
#[cfg(any(test, feature = "testing"))]
pub use renderer::TestRenderer;
