//! The closed set of lifecycle states a [`Value`](crate::Value) can be in.

use alloc::string::String;
use core::fmt;

/// Lifecycle state of a tracked value.
///
/// Exactly one variant is active at a time. There is no "stale value while
/// reloading": `Loading` and `Failed` carry no payload, so a consumer that
/// needs the last good value must keep it itself.
///
/// # Example
///
/// ```rust
/// use tracked_value::{Trace, ValueState};
///
/// fn describe(state: &ValueState<u32, String>) -> String {
///     match state {
///         ValueState::Present(n) => format!("{n} items"),
///         ValueState::Absent => "nothing yet".to_string(),
///         ValueState::Loading => "loading...".to_string(),
///         ValueState::Failed(error, _trace) => format!("failed: {error}"),
///     }
/// }
///
/// assert_eq!(describe(&ValueState::Present(3)), "3 items");
/// assert_eq!(describe(&ValueState::Failed("offline".into(), Trace::empty())), "failed: offline");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueState<T, E> {
    /// A concrete value is available.
    Present(T),
    /// No value was ever supplied, or the cell was reset.
    Absent,
    /// A value is being produced; nothing is available yet.
    Loading,
    /// The last attempt to produce a value failed.
    ///
    /// Both the error and the trace are stored verbatim.
    Failed(E, Trace),
}

impl<T, E> ValueState<T, E> {
    /// `Present(seed)` when a seed is given, `Absent` otherwise.
    pub fn from_seed(seed: Option<T>) -> Self {
        match seed {
            Some(value) => ValueState::Present(value),
            None => ValueState::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, ValueState::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ValueState::Absent)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ValueState::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ValueState::Failed(..))
    }

    /// The payload of `Present`, `None` for every other variant.
    pub fn value(&self) -> Option<&T> {
        match self {
            ValueState::Present(value) => Some(value),
            _ => None,
        }
    }

    /// Consumes the state, keeping only a `Present` payload.
    pub fn into_value(self) -> Option<T> {
        match self {
            ValueState::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            ValueState::Failed(error, _) => Some(error),
            _ => None,
        }
    }

    pub fn trace(&self) -> Option<&Trace> {
        match self {
            ValueState::Failed(_, trace) => Some(trace),
            _ => None,
        }
    }

    /// Borrowing view of the state.
    pub fn as_ref(&self) -> ValueState<&T, &E> {
        match self {
            ValueState::Present(value) => ValueState::Present(value),
            ValueState::Absent => ValueState::Absent,
            ValueState::Loading => ValueState::Loading,
            ValueState::Failed(error, trace) => ValueState::Failed(error, trace.clone()),
        }
    }

    /// Maps the `Present` payload, leaving the other variants untouched.
    pub fn map<U, F>(self, f: F) -> ValueState<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            ValueState::Present(value) => ValueState::Present(f(value)),
            ValueState::Absent => ValueState::Absent,
            ValueState::Loading => ValueState::Loading,
            ValueState::Failed(error, trace) => ValueState::Failed(error, trace),
        }
    }
}

impl<T, E> Default for ValueState<T, E> {
    fn default() -> Self {
        ValueState::Absent
    }
}

/// Opaque diagnostic attached to [`ValueState::Failed`].
///
/// The cell never looks inside a trace. It exists so that whoever renders a
/// failure can show where it came from.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Trace(Option<String>);

impl Trace {
    /// A trace carrying no diagnostic.
    pub fn empty() -> Self {
        Trace(None)
    }

    /// Captures the current backtrace, if backtraces are enabled for the
    /// process (`RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`).
    #[cfg(not(feature = "no_std"))]
    pub fn capture() -> Self {
        let backtrace = std::backtrace::Backtrace::capture();
        match backtrace.status() {
            std::backtrace::BacktraceStatus::Captured => Trace(Some(backtrace.to_string())),
            _ => Trace(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<&str> for Trace {
    fn from(text: &str) -> Self {
        Trace(Some(String::from(text)))
    }
}

impl From<String> for Trace {
    fn from(text: String) -> Self {
        Trace(Some(text))
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(text) => f.debug_tuple("Trace").field(text).finish(),
            None => f.write_str("Trace(<empty>)"),
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(text) => f.write_str(text),
            None => Ok(()),
        }
    }
}
