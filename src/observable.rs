use crate::{
    callbacks::{DoneFn, FailFn},
    Deferred, Payload, Promise, State,
};

/// Anything that settles like a deferred and accepts `done`/`fail`
/// registrations.
///
/// [`Piped::Observable`](crate::Piped::Observable) and [`when`](crate::when)
/// take observables through this trait. It is object safe, so a filter can
/// hand back any observable as a `Box<dyn Observable<..>>`.
pub trait Observable {
    type Value: Payload;
    type Error: Payload;
    type Context: Payload;

    fn on_done(&self, callback: DoneFn<Self::Value, Self::Context>);

    fn on_fail(&self, callback: FailFn<Self::Error, Self::Context>);

    fn state(&self) -> State;
}

impl<T, E, P, C> Observable for Promise<T, E, P, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    type Value = T;
    type Error = E;
    type Context = C;

    fn on_done(&self, callback: DoneFn<T, C>) {
        self.shared().on_done(callback);
    }

    fn on_fail(&self, callback: FailFn<E, C>) {
        self.shared().on_fail(callback);
    }

    fn state(&self) -> State {
        Promise::state(self)
    }
}

impl<T, E, P, C> Observable for Deferred<T, E, P, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    type Value = T;
    type Error = E;
    type Context = C;

    fn on_done(&self, callback: DoneFn<T, C>) {
        self.promise().on_done(callback);
    }

    fn on_fail(&self, callback: FailFn<E, C>) {
        self.promise().on_fail(callback);
    }

    fn state(&self) -> State {
        Deferred::state(self)
    }
}

impl<O: Observable + ?Sized> Observable for &O {
    type Value = O::Value;
    type Error = O::Error;
    type Context = O::Context;

    fn on_done(&self, callback: DoneFn<Self::Value, Self::Context>) {
        (**self).on_done(callback);
    }

    fn on_fail(&self, callback: FailFn<Self::Error, Self::Context>) {
        (**self).on_fail(callback);
    }

    fn state(&self) -> State {
        (**self).state()
    }
}

impl<O: Observable + ?Sized> Observable for Box<O> {
    type Value = O::Value;
    type Error = O::Error;
    type Context = O::Context;

    fn on_done(&self, callback: DoneFn<Self::Value, Self::Context>) {
        (**self).on_done(callback);
    }

    fn on_fail(&self, callback: FailFn<Self::Error, Self::Context>) {
        (**self).on_fail(callback);
    }

    fn state(&self) -> State {
        (**self).state()
    }
}
