//! Deferred objects in the style of `jQuery.Deferred`.
//!
//! A [`Deferred`] represents the one-time completion of some operation. It
//! starts [`State::Pending`] and settles exactly once, either resolved or
//! rejected, carrying a context (the receiver handed to every callback) and an
//! argument pack. Callbacks registered with `done`, `fail` and `always` before
//! settlement are queued and run in registration order when it happens;
//! callbacks registered afterwards run immediately if they match the settled
//! state. Progress callbacks are invoked live by `notify` while pending and
//! are never replayed.
//!
//! A [`Promise`] is the read-only side of a deferred: it can register
//! callbacks and inspect the state, but not settle.
//!
//! Two combinators derive new promises from existing ones:
//!
//! * [`Promise::pipe`] filters a settlement, optionally substituting another
//!   observable whose settlement is then mirrored;
//! * [`when`] joins several observables, resolving once all resolve and
//!   rejecting as soon as one rejects.
//!
//! Dispatch is synchronous. `resolve`, `reject` and `notify` run every
//! applicable callback before returning, so a callback that settles another
//! deferred re-enters the engine on the same stack. Long `pipe`/`when` chains
//! therefore grow the call stack by a few frames per link.
//!
//! # Examples
//!
//! ```
//! use deferred::{when, Deferred, Piped, State};
//! use std::sync::{Arc, Mutex};
//!
//! let a: Deferred<i32, String> = Deferred::new();
//! let b: Deferred<i32, String> = Deferred::new();
//! let doubled = a.pipe_done(|_, n| Piped::Value(n * 2));
//! let both = when((&doubled, &b));
//!
//! let seen = Arc::new(Mutex::new(None));
//! let sink = seen.clone();
//! both.done(move |_, pair| *sink.lock().unwrap() = Some(*pair));
//!
//! b.resolve(7);
//! assert_eq!(both.state(), State::Pending);
//! a.resolve(5);
//! assert_eq!(*seen.lock().unwrap(), Some((10, 7)));
//! ```

use std::fmt;

/// Emits a `tracing` event at trace level, or nothing without the `tracing`
/// feature.
macro_rules! trace {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        {
            ::tracing::trace!($($arg)+);
        }
    };
}

pub mod adapter;
mod callbacks;
mod deferred;
mod observable;
mod pipe;
mod promise;
mod when;

pub use callbacks::{flatten, AlwaysFn, Callbacks, DoneFn, FailFn, ProgressFn};
pub use deferred::Deferred;
pub use observable::Observable;
pub use pipe::Piped;
pub use promise::{Promise, Settled};
pub use when::{when, when_all, When};

/// Errors surfaced when awaiting a [`Promise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Every [`Deferred`] handle was dropped while still pending, so the
    /// promise can never settle.
    #[error("every deferred handle was dropped before it settled")]
    DeferredDropped,
}

/// Settlement state of a deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Resolved,
    Rejected,
}

impl State {
    pub fn is_settled(self) -> bool {
        self != State::Pending
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Pending => "pending",
            State::Resolved => "resolved",
            State::Rejected => "rejected",
        })
    }
}

/// Marker for argument packs and contexts carried by a deferred.
///
/// Settlements are shared between every handle and may be observed from any
/// thread, so values must be `Send + Sync + 'static`.
pub trait Payload: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Payload for T {}
