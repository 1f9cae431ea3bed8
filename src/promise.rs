//! The read-only [`Promise`] view over a deferred, and the [`Settled`]
//! future for awaiting it.
use crate::{
    callbacks::{flatten, AlwaysFn, Callbacks, DoneFn, FailFn, ProgressFn},
    deferred::Shared,
    Error, Payload, State,
};
use std::{
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// Observer handle over a [`Deferred`](crate::Deferred).
///
/// A promise can register callbacks and inspect the state but cannot settle
/// the deferred. Two promises are equal when they observe the same deferred.
pub struct Promise<T = (), E = (), P = (), C = ()> {
    shared: Arc<Shared<T, E, P, C>>,
}

impl<T, E, P, C> Promise<T, E, P, C> {
    pub(crate) fn from_shared(shared: Arc<Shared<T, E, P, C>>) -> Self {
        Promise { shared }
    }

    pub(crate) fn shared(&self) -> &Shared<T, E, P, C> {
        &self.shared
    }

    pub fn state(&self) -> State {
        self.shared.state()
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
}

impl<T, E, P, C> Promise<T, E, P, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    /// Runs `callback` once resolved, immediately if that already happened.
    pub fn done<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&C, &T) + Send + 'static,
    {
        self.shared.on_done(Box::new(callback));
        self
    }

    /// Runs `callback` once rejected, immediately if that already happened.
    pub fn fail<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&C, &E) + Send + 'static,
    {
        self.shared.on_fail(Box::new(callback));
        self
    }

    /// Runs `callback` once settled either way.
    pub fn always<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&C, Result<&T, &E>) + Send + 'static,
    {
        self.shared.on_always(Box::new(callback));
        self
    }

    pub fn progress<F>(&self, callback: F) -> &Self
    where
        F: Fn(&C, &P) + Send + Sync + 'static,
    {
        self.shared.on_progress(Arc::new(callback));
        self
    }

    pub fn done_all<I>(&self, callbacks: I) -> &Self
    where
        I: IntoIterator<Item = Callbacks<DoneFn<T, C>>>,
    {
        for callback in flatten(callbacks) {
            self.shared.on_done(callback);
        }
        self
    }

    pub fn fail_all<I>(&self, callbacks: I) -> &Self
    where
        I: IntoIterator<Item = Callbacks<FailFn<E, C>>>,
    {
        for callback in flatten(callbacks) {
            self.shared.on_fail(callback);
        }
        self
    }

    pub fn always_all<I>(&self, callbacks: I) -> &Self
    where
        I: IntoIterator<Item = Callbacks<AlwaysFn<T, E, C>>>,
    {
        for callback in flatten(callbacks) {
            self.shared.on_always(callback);
        }
        self
    }

    pub fn progress_all<I>(&self, callbacks: I) -> &Self
    where
        I: IntoIterator<Item = Callbacks<ProgressFn<P, C>>>,
    {
        for callback in flatten(callbacks) {
            self.shared.on_progress(callback);
        }
        self
    }

    /// Registers a done, a fail and a progress callback at once. Chain
    /// `done(..).fail(..)` instead to leave a slot out.
    pub fn then<D, F, G>(&self, done: D, fail: F, progress: G) -> &Self
    where
        D: FnOnce(&C, &T) + Send + 'static,
        F: FnOnce(&C, &E) + Send + 'static,
        G: Fn(&C, &P) + Send + Sync + 'static,
    {
        self.done(done).fail(fail).progress(progress)
    }

    pub fn outcome(&self) -> Option<Result<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        self.shared.outcome()
    }

    /// A future that completes when the deferred settles.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::Deferred;
    /// use futures::executor::block_on;
    /// use std::thread;
    ///
    /// let ready: Deferred<String, String> = Deferred::new();
    /// let promise = ready.promise();
    /// let waiter = thread::spawn(move || block_on(promise.settled()));
    /// ready.resolve("🍓".into());
    /// assert_eq!(waiter.join().unwrap(), Ok(Ok("🍓".to_string())));
    /// ```
    pub fn settled(&self) -> Settled<T, E, P, C>
    where
        T: Clone,
        E: Clone,
    {
        Settled {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E, P, C> Clone for Promise<T, E, P, C> {
    fn clone(&self) -> Self {
        Promise {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E, P, C> PartialEq for Promise<T, E, P, C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T, E, P, C> Eq for Promise<T, E, P, C> {}

impl<T, E, P, C> fmt::Debug for Promise<T, E, P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish()
    }
}

/// Future returned by [`Promise::settled`].
///
/// Resolves to `Ok(Ok(value))` or `Ok(Err(error))` with a clone of the
/// settled pack, or to `Err(Error::DeferredDropped)` if the deferred was
/// abandoned while pending.
pub struct Settled<T, E, P, C> {
    shared: Arc<Shared<T, E, P, C>>,
}

impl<T: Clone, E: Clone, P, C> Future for Settled<T, E, P, C> {
    type Output = Result<Result<T, E>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.shared.poll_settled(cx.waker())
    }
}

impl<T, E, P, C> IntoFuture for Promise<T, E, P, C>
where
    T: Payload + Clone,
    E: Payload + Clone,
    P: Payload,
    C: Payload + Clone,
{
    type Output = Result<Result<T, E>, Error>;
    type IntoFuture = Settled<T, E, P, C>;

    fn into_future(self) -> Self::IntoFuture {
        Settled {
            shared: self.shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Deferred, Error, Promise, State};
    use futures::executor::block_on;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
    };

    #[test]
    fn test_promise_is_memoized() {
        let ready: Deferred = Deferred::new();
        assert_eq!(ready.promise(), ready.promise());
        let other: Deferred = Deferred::new();
        assert_ne!(ready.promise(), other.promise());
    }

    #[test]
    fn test_promise_observes_resolution() {
        let ready: Deferred = Deferred::new();
        let promise = ready.promise();
        let done = Arc::new(AtomicUsize::new(0));
        let fail = Arc::new(AtomicUsize::new(0));
        let always = Arc::new(AtomicUsize::new(0));
        let (d, f, a) = (done.clone(), fail.clone(), always.clone());
        promise
            .done(move |_, _| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .fail(move |_, _| {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .always(move |_, _| {
                a.fetch_add(1, Ordering::SeqCst);
            });
        ready.resolve(());
        assert_eq!(promise.state(), State::Resolved);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(fail.load(Ordering::SeqCst), 0);
        assert_eq!(always.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_promise_late_fail_gets_context() {
        let ready: Deferred<(), (i32, &str), (), Vec<i32>> = Deferred::new();
        let promise = ready.promise();
        ready.reject_with(vec![9], (1234, "foo"));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        promise.fail(move |context, (code, word)| {
            assert_eq!(context, &vec![9]);
            assert_eq!((*code, *word), (1234, "foo"));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_await_rejection() {
        let ready: Deferred<u8, String> = Deferred::new();
        let promise = ready.promise();
        let waiter = thread::spawn(move || block_on(async { promise.await }));
        ready.reject("reject!!".into());
        assert_eq!(waiter.join().unwrap(), Ok(Err("reject!!".to_string())));
    }

    #[test]
    fn test_two_waiters() {
        let ready: Deferred<String> = Deferred::new();
        let first = ready.promise();
        let second = ready.promise();
        let task1 = thread::spawn(move || block_on(first.settled()));
        let task2 = thread::spawn(move || block_on(second.settled()));
        ready.resolve("🍓".into());
        assert_eq!(task1.join().unwrap(), Ok(Ok("🍓".to_string())));
        assert_eq!(task2.join().unwrap(), Ok(Ok("🍓".to_string())));
    }

    #[test]
    fn test_await_abandoned_deferred() {
        let ready: Deferred<String> = Deferred::new();
        let promise: Promise<String> = ready.promise();
        let waiter = thread::spawn(move || block_on(promise.settled()));
        let producer = thread::spawn(move || drop(ready));
        producer.join().expect("The producer thread has panicked");
        assert_eq!(waiter.join().unwrap(), Err(Error::DeferredDropped));
    }

    #[test]
    fn test_abandoned_deferred_keeps_settled_value() {
        let ready: Deferred<i32> = Deferred::new();
        let promise = ready.promise();
        ready.resolve(4);
        drop(ready);
        assert_eq!(block_on(promise.settled()), Ok(Ok(4)));
        assert_eq!(promise.outcome(), Some(Ok(4)));
    }
}
