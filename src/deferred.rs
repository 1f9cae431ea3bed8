//! The settlement cell shared by every handle, and the [`Deferred`] producer
//! handle that drives it.
use crate::{
    callbacks::{AlwaysFn, Callbacks, DoneFn, FailFn, ProgressFn},
    Error, Payload, Promise, State,
};
use parking_lot::{Mutex, MutexGuard};
use std::{
    fmt, mem,
    sync::Arc,
    task::{Poll, Waker},
};

#[derive(Debug)]
pub(crate) struct Settlement<T, E, C> {
    pub(crate) context: C,
    pub(crate) outcome: Result<T, E>,
}

struct Inner<T, E, P, C> {
    /// Receiver used by `resolve`, `reject` and `notify`.
    context: C,
    settlement: Option<Arc<Settlement<T, E, C>>>,
    done: Vec<DoneFn<T, C>>,
    fail: Vec<FailFn<E, C>>,
    always: Vec<AlwaysFn<T, E, C>>,
    progress: Vec<ProgressFn<P, C>>,
    wakers: Vec<Waker>,
    /// Live `Deferred` handles. Zero while pending means nothing can settle
    /// this cell any more.
    producers: usize,
}

impl<T, E, P, C> Inner<T, E, P, C> {
    fn state(&self) -> State {
        match self.settlement.as_deref() {
            None => State::Pending,
            Some(Settlement { outcome: Ok(_), .. }) => State::Resolved,
            Some(Settlement { outcome: Err(_), .. }) => State::Rejected,
        }
    }

    fn accepts_callbacks(&self) -> bool {
        self.settlement.is_none() && self.producers > 0
    }
}

/// Callbacks taken out of the cell. Dropped only after the lock is released,
/// since a callback may own a handle to the very same cell.
struct Queues<T, E, P, C> {
    done: Vec<DoneFn<T, C>>,
    fail: Vec<FailFn<E, C>>,
    always: Vec<AlwaysFn<T, E, C>>,
    progress: Vec<ProgressFn<P, C>>,
    wakers: Vec<Waker>,
}

impl<T, E, P, C> Queues<T, E, P, C> {
    fn take(inner: &mut Inner<T, E, P, C>) -> Self {
        Queues {
            done: mem::take(&mut inner.done),
            fail: mem::take(&mut inner.fail),
            always: mem::take(&mut inner.always),
            progress: mem::take(&mut inner.progress),
            wakers: mem::take(&mut inner.wakers),
        }
    }
}

pub(crate) struct Shared<T, E, P, C> {
    inner: Mutex<Inner<T, E, P, C>>,
}

impl<T, E, P, C> Shared<T, E, P, C> {
    fn new(context: C) -> Self {
        Shared {
            inner: Mutex::new(Inner {
                context,
                settlement: None,
                done: Vec::new(),
                fail: Vec::new(),
                always: Vec::new(),
                progress: Vec::new(),
                wakers: Vec::new(),
                producers: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, E, P, C>> {
        self.inner.lock()
    }

    pub(crate) fn state(&self) -> State {
        self.lock().state()
    }

    pub(crate) fn default_context(&self) -> C
    where
        C: Clone,
    {
        self.lock().context.clone()
    }

    fn acquire(&self) {
        self.lock().producers += 1;
    }

    /// Drops one producer. When the last one goes while pending, queued
    /// callbacks are discarded and awaiting futures are woken.
    fn release(&self) {
        let abandoned = {
            let mut inner = self.lock();
            inner.producers -= 1;
            if inner.producers > 0 || inner.settlement.is_some() {
                return;
            }
            trace!(
                done = inner.done.len(),
                fail = inner.fail.len(),
                always = inner.always.len(),
                "last deferred handle dropped while pending"
            );
            Queues::take(&mut inner)
        };
        abandoned.wakers.into_iter().for_each(Waker::wake);
    }

    pub(crate) fn outcome(&self) -> Option<Result<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        let settlement = self.lock().settlement.clone()?;
        Some(settlement.outcome.clone())
    }

    pub(crate) fn poll_settled(&self, waker: &Waker) -> Poll<Result<Result<T, E>, Error>>
    where
        T: Clone,
        E: Clone,
    {
        let mut inner = self.lock();
        if let Some(settlement) = inner.settlement.clone() {
            drop(inner);
            return Poll::Ready(Ok(settlement.outcome.clone()));
        }
        if inner.producers == 0 {
            return Poll::Ready(Err(Error::DeferredDropped));
        }
        if !inner.wakers.iter().any(|queued| queued.will_wake(waker)) {
            inner.wakers.push(waker.clone());
        }
        Poll::Pending
    }

    pub(crate) fn on_done(&self, callback: DoneFn<T, C>) {
        let mut inner = self.lock();
        let Some(settlement) = inner.settlement.clone() else {
            if inner.accepts_callbacks() {
                inner.done.push(callback);
            }
            return;
        };
        drop(inner);
        if let Ok(value) = &settlement.outcome {
            callback(&settlement.context, value);
        }
    }

    pub(crate) fn on_fail(&self, callback: FailFn<E, C>) {
        let mut inner = self.lock();
        let Some(settlement) = inner.settlement.clone() else {
            if inner.accepts_callbacks() {
                inner.fail.push(callback);
            }
            return;
        };
        drop(inner);
        if let Err(error) = &settlement.outcome {
            callback(&settlement.context, error);
        }
    }

    pub(crate) fn on_always(&self, callback: AlwaysFn<T, E, C>) {
        let mut inner = self.lock();
        let Some(settlement) = inner.settlement.clone() else {
            if inner.accepts_callbacks() {
                inner.always.push(callback);
            }
            return;
        };
        drop(inner);
        callback(&settlement.context, settlement.outcome.as_ref());
    }

    pub(crate) fn on_progress(&self, callback: ProgressFn<P, C>) {
        let mut inner = self.lock();
        if inner.accepts_callbacks() {
            inner.progress.push(callback);
        }
    }

    /// Moves a pending cell to its terminal state and drains the queues.
    /// Returns `false` if the cell had already settled.
    fn settle(&self, context: C, outcome: Result<T, E>) -> bool {
        let mut inner = self.lock();
        if inner.settlement.is_some() {
            trace!(state = %inner.state(), "settle ignored, deferred already settled");
            return false;
        }
        let settlement = Arc::new(Settlement { context, outcome });
        inner.settlement = Some(Arc::clone(&settlement));
        let queues = Queues::take(&mut inner);
        trace!(
            state = %inner.state(),
            done = queues.done.len(),
            fail = queues.fail.len(),
            always = queues.always.len(),
            "deferred settled"
        );
        drop(inner);

        let Settlement { context, outcome } = &*settlement;
        match outcome {
            Ok(value) => queues
                .done
                .into_iter()
                .for_each(|callback| callback(context, value)),
            Err(error) => queues
                .fail
                .into_iter()
                .for_each(|callback| callback(context, error)),
        }
        for callback in queues.always {
            callback(context, outcome.as_ref());
        }
        queues.wakers.into_iter().for_each(Waker::wake);
        // Settled cells never notify again.
        drop(queues.progress);
        true
    }

    fn notify(&self, context: &C, progress: &P) {
        let callbacks = {
            let inner = self.lock();
            if inner.settlement.is_some() {
                trace!(state = %inner.state(), "notify ignored, deferred already settled");
                return;
            }
            inner.progress.clone()
        };
        trace!(callbacks = callbacks.len(), "deferred notified");
        for callback in &callbacks {
            callback(context, progress);
        }
    }
}

/// The producer side of a deferred: registers callbacks like a [`Promise`]
/// and additionally settles or notifies.
///
/// Handles are cheap to clone and all refer to the same settlement cell.
/// `resolve` and `reject` (and their `*_with` forms) are no-ops once the cell
/// has settled; the first call wins.
///
/// The type parameters are the resolution pack `T`, the rejection pack `E`,
/// the progress pack `P` and the context `C` handed to callbacks as their
/// receiver. Several positional arguments are passed as a tuple.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, State};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let fired = Arc::new(AtomicUsize::new(0));
/// let counter = fired.clone();
/// let ready: Deferred<(i32, &str)> = Deferred::new();
/// ready.done(move |_, (number, word)| {
///     assert_eq!((*number, *word), (123, "foo"));
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
/// ready.resolve((123, "foo")).reject(());
///
/// assert_eq!(ready.state(), State::Resolved);
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
pub struct Deferred<T = (), E = (), P = (), C = ()> {
    promise: Promise<T, E, P, C>,
}

impl<T, E, P, C> Deferred<T, E, P, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    /// Creates a pending deferred whose default context is `C::default()`.
    pub fn new() -> Self
    where
        C: Default,
    {
        Self::with_context(C::default())
    }

    /// Creates a pending deferred that settles and notifies with `context`
    /// unless a `*_with` variant supplies another one.
    pub fn with_context(context: C) -> Self {
        Deferred {
            promise: Promise::from_shared(Arc::new(Shared::new(context))),
        }
    }

    /// Creates a pending deferred and runs `init` on it before returning.
    pub fn new_with<F>(init: F) -> Self
    where
        C: Default,
        F: FnOnce(&Self),
    {
        let deferred = Self::new();
        init(&deferred);
        deferred
    }

    pub fn state(&self) -> State {
        self.promise.state()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == State::Resolved
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == State::Rejected
    }

    /// The read-only view of this deferred. Every call returns a handle equal
    /// to the previous ones.
    pub fn promise(&self) -> Promise<T, E, P, C> {
        self.promise.clone()
    }

    /// A clone of the settled pack, or `None` while pending.
    pub fn outcome(&self) -> Option<Result<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        self.promise.outcome()
    }

    pub fn done<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&C, &T) + Send + 'static,
    {
        self.promise.done(callback);
        self
    }

    pub fn fail<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&C, &E) + Send + 'static,
    {
        self.promise.fail(callback);
        self
    }

    pub fn always<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&C, Result<&T, &E>) + Send + 'static,
    {
        self.promise.always(callback);
        self
    }

    /// Registers a progress callback. Ignored once settled.
    pub fn progress<F>(&self, callback: F) -> &Self
    where
        F: Fn(&C, &P) + Send + Sync + 'static,
    {
        self.promise.progress(callback);
        self
    }

    pub fn done_all<I>(&self, callbacks: I) -> &Self
    where
        I: IntoIterator<Item = Callbacks<DoneFn<T, C>>>,
    {
        self.promise.done_all(callbacks);
        self
    }

    pub fn fail_all<I>(&self, callbacks: I) -> &Self
    where
        I: IntoIterator<Item = Callbacks<FailFn<E, C>>>,
    {
        self.promise.fail_all(callbacks);
        self
    }

    pub fn always_all<I>(&self, callbacks: I) -> &Self
    where
        I: IntoIterator<Item = Callbacks<AlwaysFn<T, E, C>>>,
    {
        self.promise.always_all(callbacks);
        self
    }

    pub fn progress_all<I>(&self, callbacks: I) -> &Self
    where
        I: IntoIterator<Item = Callbacks<ProgressFn<P, C>>>,
    {
        self.promise.progress_all(callbacks);
        self
    }

    /// Registers a done, a fail and a progress callback at once.
    ///
    /// To leave a slot out, chain only the registrations you need, e.g.
    /// `deferred.done(..).fail(..)`.
    pub fn then<D, F, G>(&self, done: D, fail: F, progress: G) -> &Self
    where
        D: FnOnce(&C, &T) + Send + 'static,
        F: FnOnce(&C, &E) + Send + 'static,
        G: Fn(&C, &P) + Send + Sync + 'static,
    {
        self.done(done).fail(fail).progress(progress)
    }

    /// Resolves with the default context.
    pub fn resolve(&self, value: T) -> &Self {
        let context = self.promise.shared().default_context();
        self.resolve_with(context, value)
    }

    pub fn resolve_with(&self, context: C, value: T) -> &Self {
        self.promise.shared().settle(context, Ok(value));
        self
    }

    /// Rejects with the default context.
    pub fn reject(&self, error: E) -> &Self {
        let context = self.promise.shared().default_context();
        self.reject_with(context, error)
    }

    pub fn reject_with(&self, context: C, error: E) -> &Self {
        self.promise.shared().settle(context, Err(error));
        self
    }

    /// Runs the currently registered progress callbacks with the default
    /// context. Nothing is stored: callbacks registered later never see it.
    pub fn notify(&self, progress: P) -> &Self {
        let context = self.promise.shared().default_context();
        self.notify_with(context, progress)
    }

    pub fn notify_with(&self, context: C, progress: P) -> &Self {
        self.promise.shared().notify(&context, &progress);
        self
    }
}

impl<T, E, P, C> Default for Deferred<T, E, P, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E, P, C> Clone for Deferred<T, E, P, C> {
    fn clone(&self) -> Self {
        self.promise.shared().acquire();
        Deferred {
            promise: self.promise.clone(),
        }
    }
}

impl<T, E, P, C> Drop for Deferred<T, E, P, C> {
    /// Dropping the last handle of a pending deferred abandons it.
    fn drop(&mut self) {
        self.promise.shared().release();
    }
}

impl<T, E, P, C> PartialEq for Deferred<T, E, P, C> {
    fn eq(&self, other: &Self) -> bool {
        self.promise == other.promise
    }
}

impl<T, E, P, C> Eq for Deferred<T, E, P, C> {}

impl<T, E, P, C> fmt::Debug for Deferred<T, E, P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.promise.shared().state())
            .finish()
    }
}
