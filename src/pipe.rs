//! Chaining: deriving a promise from filtering another one's settlement.
use crate::{Deferred, Observable, Payload, Promise};

/// What a [`Promise::pipe`] filter hands back.
///
/// `Value` settles the downstream promise with the source's context and the
/// filtered pack. `Observable` defers the downstream promise to another
/// observable, whose settlement (kind, context and pack) it then mirrors.
pub enum Piped<V, T, E, C> {
    Value(V),
    Observable(Box<dyn Observable<Value = T, Error = E, Context = C>>),
}

impl<V, T, E, C> Piped<V, T, E, C> {
    pub fn follow<O>(observable: O) -> Self
    where
        O: Observable<Value = T, Error = E, Context = C> + 'static,
    {
        Piped::Observable(Box::new(observable))
    }
}

impl<V, T, E, P, C> From<Promise<T, E, P, C>> for Piped<V, T, E, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    fn from(promise: Promise<T, E, P, C>) -> Self {
        Piped::follow(promise)
    }
}

impl<V, T, E, P, C> From<Deferred<T, E, P, C>> for Piped<V, T, E, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    fn from(deferred: Deferred<T, E, P, C>) -> Self {
        Piped::follow(deferred.promise())
    }
}

/// Settles `downstream` the way `nested` settles.
fn mirror<T, E, P, C>(
    nested: &dyn Observable<Value = T, Error = E, Context = C>,
    downstream: &Deferred<T, E, P, C>,
) where
    T: Payload + Clone,
    E: Payload + Clone,
    P: Payload,
    C: Payload + Clone,
{
    let resolved = downstream.clone();
    nested.on_done(Box::new(move |context: &C, value: &T| {
        resolved.resolve_with(context.clone(), value.clone());
    }));
    let rejected = downstream.clone();
    nested.on_fail(Box::new(move |context: &C, error: &E| {
        rejected.reject_with(context.clone(), error.clone());
    }));
}

impl<T, E, P, C> Promise<T, E, P, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    /// Wires a fresh downstream deferred to this promise's settlement.
    fn chain<U, F, D, R>(&self, on_done: D, on_fail: R) -> Promise<U, F, P, C>
    where
        U: Payload,
        F: Payload,
        D: FnOnce(&C, &T, &Deferred<U, F, P, C>) + Send + 'static,
        R: FnOnce(&C, &E, &Deferred<U, F, P, C>) + Send + 'static,
    {
        let downstream = Deferred::with_context(self.shared().default_context());
        let resolved = downstream.clone();
        self.done(move |context, value| on_done(context, value, &resolved));
        let rejected = downstream.clone();
        self.fail(move |context, error| on_fail(context, error, &rejected));
        downstream.promise()
    }

    /// Returns a promise settled from this one's settlement through
    /// `done_filter` or `fail_filter`.
    ///
    /// A filter returning [`Piped::Value`] resolves (done filter) or rejects
    /// (fail filter) the returned promise with the source context and that
    /// value. A filter returning [`Piped::Observable`] leaves the returned
    /// promise pending until the nested observable settles, then mirrors it.
    /// Progress is not forwarded.
    ///
    /// A panicking filter unwinds out of the `resolve` or `reject` call that
    /// ran it, leaving the returned promise pending.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Deferred, Piped};
    ///
    /// let source: Deferred<i32, String> = Deferred::new();
    /// let parsed = source.pipe(
    ///     |_, n| Piped::Value(n.to_string()),
    ///     |_, e| Piped::Value(e.len()),
    /// );
    /// source.reject("not found".into());
    /// assert_eq!(parsed.outcome(), Some(Err(9)));
    /// ```
    pub fn pipe<U, F, D, R>(&self, done_filter: D, fail_filter: R) -> Promise<U, F, P, C>
    where
        U: Payload + Clone,
        F: Payload + Clone,
        D: FnOnce(&C, &T) -> Piped<U, U, F, C> + Send + 'static,
        R: FnOnce(&C, &E) -> Piped<F, U, F, C> + Send + 'static,
    {
        self.chain(
            move |context, value, downstream| match done_filter(context, value) {
                Piped::Value(value) => {
                    downstream.resolve_with(context.clone(), value);
                }
                Piped::Observable(nested) => mirror(&*nested, downstream),
            },
            move |context, error, downstream| match fail_filter(context, error) {
                Piped::Value(error) => {
                    downstream.reject_with(context.clone(), error);
                }
                Piped::Observable(nested) => mirror(&*nested, downstream),
            },
        )
    }

    /// Like [`pipe`](Self::pipe) with only a done filter. Rejections pass
    /// through unchanged.
    pub fn pipe_done<U, D>(&self, done_filter: D) -> Promise<U, E, P, C>
    where
        U: Payload + Clone,
        E: Clone,
        D: FnOnce(&C, &T) -> Piped<U, U, E, C> + Send + 'static,
    {
        self.pipe(done_filter, |_, error| Piped::Value(error.clone()))
    }

    /// Like [`pipe`](Self::pipe) with only a fail filter. Resolutions pass
    /// through unchanged.
    pub fn pipe_fail<F, R>(&self, fail_filter: R) -> Promise<T, F, P, C>
    where
        T: Clone,
        F: Payload + Clone,
        R: FnOnce(&C, &E) -> Piped<F, T, F, C> + Send + 'static,
    {
        self.pipe(|_, value| Piped::Value(value.clone()), fail_filter)
    }

    /// A new promise that settles exactly as this one does.
    pub fn pipe_through(&self) -> Promise<T, E, P, C>
    where
        T: Clone,
        E: Clone,
    {
        self.chain(
            |context, value, downstream| {
                downstream.resolve_with(context.clone(), value.clone());
            },
            |context, error, downstream| {
                downstream.reject_with(context.clone(), error.clone());
            },
        )
    }
}

impl<T, E, P, C> Deferred<T, E, P, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    /// See [`Promise::pipe`].
    pub fn pipe<U, F, D, R>(&self, done_filter: D, fail_filter: R) -> Promise<U, F, P, C>
    where
        U: Payload + Clone,
        F: Payload + Clone,
        D: FnOnce(&C, &T) -> Piped<U, U, F, C> + Send + 'static,
        R: FnOnce(&C, &E) -> Piped<F, U, F, C> + Send + 'static,
    {
        self.promise().pipe(done_filter, fail_filter)
    }

    pub fn pipe_done<U, D>(&self, done_filter: D) -> Promise<U, E, P, C>
    where
        U: Payload + Clone,
        E: Clone,
        D: FnOnce(&C, &T) -> Piped<U, U, E, C> + Send + 'static,
    {
        self.promise().pipe_done(done_filter)
    }

    pub fn pipe_fail<F, R>(&self, fail_filter: R) -> Promise<T, F, P, C>
    where
        T: Clone,
        F: Payload + Clone,
        R: FnOnce(&C, &E) -> Piped<F, T, F, C> + Send + 'static,
    {
        self.promise().pipe_fail(fail_filter)
    }

    pub fn pipe_through(&self) -> Promise<T, E, P, C>
    where
        T: Clone,
        E: Clone,
    {
        self.promise().pipe_through()
    }
}

#[cfg(test)]
mod tests {
    use super::Piped;
    use crate::{Deferred, Promise, State};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_pipe_doubles_value() {
        let source: Deferred<i32> = Deferred::new();
        let doubled = source.pipe_done(|_, n| Piped::Value(n * 2));
        assert_eq!(doubled.state(), State::Pending);
        source.resolve(5);
        assert_eq!(doubled.outcome(), Some(Ok(10)));
    }

    #[test]
    fn test_pipe_on_settled_source() {
        let source: Deferred<i32> = Deferred::new();
        source.resolve(5);
        let doubled = source.pipe_done(|_, n| Piped::Value(n * 2));
        assert_eq!(doubled.outcome(), Some(Ok(10)));
    }

    #[test]
    fn test_pipe_keeps_source_context() {
        let source: Deferred<i32, (), (), &str> = Deferred::new();
        let piped = source.pipe_done(|_, n| Piped::Value(n + 1));
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        piped.done(move |context, n| *sink.lock().unwrap() = Some((*context, *n)));
        source.resolve_with("source", 1);
        assert_eq!(*seen.lock().unwrap(), Some(("source", 2)));
    }

    #[test]
    fn test_pipe_follows_nested_deferred() {
        let source: Deferred<i32, String> = Deferred::new();
        let inner: Deferred<String, String> = Deferred::new();
        let nested = inner.clone();
        let piped: Promise<String, String> = source.pipe_done(move |_, _| nested.into());

        source.resolve(1);
        assert_eq!(piped.state(), State::Pending);
        inner.reject("inner failed".into());
        assert_eq!(piped.outcome(), Some(Err("inner failed".to_string())));
    }

    #[test]
    fn test_pipe_nested_resolution_mirrors_context() {
        let source: Deferred<i32, (), (), u8> = Deferred::new();
        let inner: Deferred<&str, (), (), u8> = Deferred::new();
        let piped = source.pipe_done({
            let inner = inner.promise();
            move |_, _| Piped::follow(inner)
        });
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        piped.done(move |context, word| *sink.lock().unwrap() = Some((*context, *word)));

        source.resolve_with(1, 0);
        inner.resolve_with(2, "inner");
        assert_eq!(*seen.lock().unwrap(), Some((2, "inner")));
    }

    #[test]
    fn test_fail_filter_rejects_once_with_filtered_value() {
        let source: Deferred<(), &str> = Deferred::new();
        let piped = source.pipe_fail(|_, reason| Piped::Value(reason.len()));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        piped.fail(move |_, len| sink.lock().unwrap().push(*len));
        source.reject("four");
        assert_eq!(*calls.lock().unwrap(), vec![4]);
        assert_eq!(piped.outcome(), Some(Err(4)));
    }

    #[test]
    fn test_fail_filter_can_recover() {
        let source: Deferred<i32, &str> = Deferred::new();
        let recovery: Deferred<i32, usize> = Deferred::new();
        recovery.resolve(0);
        let piped = source.pipe(
            |_, n| Piped::Value(*n),
            {
                let recovery = recovery.promise();
                move |_, _| Piped::follow(recovery)
            },
        );
        source.reject("offline");
        assert_eq!(piped.outcome(), Some(Ok(0)));
    }

    #[test]
    fn test_pipe_through_mirrors() {
        let source: Deferred<i32, i32> = Deferred::new();
        let mirrored = source.pipe_through();
        assert_ne!(mirrored, source.promise());
        source.reject(3);
        assert_eq!(mirrored.outcome(), Some(Err(3)));
    }

    #[test]
    fn test_progress_is_not_forwarded() {
        let source: Deferred<(), (), u8> = Deferred::new();
        let piped = source.pipe_through();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        piped.progress(move |_, step| sink.lock().unwrap().push(*step));
        source.notify(1);
        assert!(seen.lock().unwrap().is_empty());
    }
}
