//! Aggregation: one promise settled by the joint settlement of several
//! observables.
use crate::{Deferred, Observable, Payload, Promise};
use parking_lot::Mutex;
use std::{mem, sync::Arc};

/// Collects resolution packs until every input has resolved.
struct Join<S> {
    slots: S,
    remaining: usize,
}

/// The promise returned by an aggregation over inputs like `O`.
type Aggregate<O, R> = Promise<R, <O as Observable>::Error, (), <O as Observable>::Context>;

/// Registers `input` with the aggregate: resolution stores its pack through
/// `store` and resolves the aggregate with `finish` once nothing remains;
/// rejection rejects the aggregate at once with the input's context and pack.
fn track<O, S, R, F>(
    input: &O,
    aggregate: &Deferred<R, O::Error, (), O::Context>,
    join: &Arc<Mutex<Join<S>>>,
    store: F,
    finish: fn(S) -> Option<R>,
) where
    O: Observable,
    O::Value: Clone,
    O::Error: Clone,
    O::Context: Clone,
    S: Default + Send + 'static,
    R: Payload,
    F: FnOnce(&mut S, O::Value) + Send + 'static,
{
    let resolved = aggregate.clone();
    let join = Arc::clone(join);
    input.on_done(Box::new(move |_: &O::Context, value: &O::Value| {
        let complete = {
            let mut join = join.lock();
            store(&mut join.slots, value.clone());
            join.remaining -= 1;
            (join.remaining == 0).then(|| mem::take(&mut join.slots))
        };
        if let Some(values) = complete.and_then(finish) {
            trace!("every aggregated input resolved");
            resolved.resolve(values);
        }
    }));
    let rejected = aggregate.clone();
    input.on_fail(Box::new(move |context: &O::Context, error: &O::Error| {
        trace!("aggregated input rejected");
        rejected.reject_with(context.clone(), error.clone());
    }));
}

/// Inputs accepted by [`when`].
///
/// * `()` gives an already resolved promise with an empty pack.
/// * A single `&Deferred` or `&Promise` gives that input's own promise.
/// * A tuple of two to six observables sharing an `Error` and `Context` type
///   gives a promise resolved with the tuple of their packs, in input order,
///   once all of them resolve. The first rejection rejects it with that
///   input's context and pack; later settlements have no effect.
pub trait When {
    type Output;

    fn when(self) -> Self::Output;
}

/// Joins observables, see [`When`].
///
/// # Examples
///
/// ```
/// use deferred::{when, Deferred, State};
///
/// let a: Deferred<(i32, i32), &str> = Deferred::new();
/// let b: Deferred<(i32, i32), &str> = Deferred::new();
/// let c: Deferred<(i32, i32), &str> = Deferred::new();
/// let all = when((&a, &b, &c));
///
/// b.resolve((3, 4));
/// a.resolve((1, 2));
/// assert_eq!(all.state(), State::Pending);
/// c.resolve((5, 6));
/// assert_eq!(all.outcome(), Some(Ok(((1, 2), (3, 4), (5, 6)))));
/// ```
pub fn when<W: When>(inputs: W) -> W::Output {
    inputs.when()
}

impl When for () {
    type Output = Promise;

    fn when(self) -> Promise {
        let resolved: Deferred = Deferred::new();
        resolved.resolve(());
        resolved.promise()
    }
}

impl<'a, T, E, P, C> When for &'a Deferred<T, E, P, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    type Output = Promise<T, E, P, C>;

    fn when(self) -> Self::Output {
        self.promise()
    }
}

impl<'a, T, E, P, C> When for &'a Promise<T, E, P, C>
where
    T: Payload,
    E: Payload,
    P: Payload,
    C: Payload + Clone,
{
    type Output = Promise<T, E, P, C>;

    fn when(self) -> Self::Output {
        self.clone()
    }
}

macro_rules! when_tuple {
    ($len:literal; $first:ident $first_index:tt $(, $rest:ident $rest_index:tt)+) => {
        impl<$first, $($rest),+> When for ($first, $($rest),+)
        where
            $first: Observable,
            $first::Value: Clone,
            $first::Error: Clone,
            $first::Context: Clone + Default,
            $(
                $rest: Observable<Error = $first::Error, Context = $first::Context>,
                $rest::Value: Clone,
            )+
        {
            type Output = Aggregate<$first, ($first::Value, $($rest::Value),+)>;

            #[allow(non_snake_case)]
            fn when(self) -> Self::Output {
                let aggregate = Deferred::new();
                let join = Arc::new(Mutex::new(Join {
                    slots: <(Option<$first::Value>, $(Option<$rest::Value>),+)>::default(),
                    remaining: $len,
                }));
                let finish = |slots: (Option<$first::Value>, $(Option<$rest::Value>),+)| match slots {
                    (Some($first), $(Some($rest)),+) => Some(($first, $($rest),+)),
                    _ => None,
                };
                track(
                    &self.$first_index,
                    &aggregate,
                    &join,
                    |slots, value| slots.$first_index = Some(value),
                    finish,
                );
                $(
                    track(
                        &self.$rest_index,
                        &aggregate,
                        &join,
                        |slots, value| slots.$rest_index = Some(value),
                        finish,
                    );
                )+
                aggregate.promise()
            }
        }
    };
}

when_tuple!(2; A 0, B 1);
when_tuple!(3; A 0, B 1, D 2);
when_tuple!(4; A 0, B 1, D 2, F 3);
when_tuple!(5; A 0, B 1, D 2, F 3, G 4);
when_tuple!(6; A 0, B 1, D 2, F 3, G 4, H 5);

/// Joins a runtime-sized collection of observables of one type.
///
/// Resolves with the packs in input order once every input resolved, so an
/// empty collection resolves at once with an empty `Vec`. The first rejection
/// rejects with that input's context and pack.
pub fn when_all<I>(inputs: I) -> Aggregate<I::Item, Vec<<I::Item as Observable>::Value>>
where
    I: IntoIterator,
    I::Item: Observable,
    <I::Item as Observable>::Value: Clone,
    <I::Item as Observable>::Error: Clone,
    <I::Item as Observable>::Context: Clone + Default,
{
    let inputs: Vec<I::Item> = inputs.into_iter().collect();
    let aggregate: Deferred<Vec<_>, _, (), _> = Deferred::new();
    if inputs.is_empty() {
        aggregate.resolve(Vec::new());
        return aggregate.promise();
    }
    let join = Arc::new(Mutex::new(Join {
        slots: inputs.iter().map(|_| None).collect::<Vec<_>>(),
        remaining: inputs.len(),
    }));
    for (index, input) in inputs.iter().enumerate() {
        track(
            input,
            &aggregate,
            &join,
            move |slots: &mut Vec<Option<_>>, value| slots[index] = Some(value),
            |slots| slots.into_iter().collect(),
        );
    }
    aggregate.promise()
}

#[cfg(test)]
mod tests {
    use super::{when, when_all};
    use crate::{Deferred, Promise, State};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    #[test]
    fn test_when_without_inputs_is_resolved() {
        let promise: Promise = when(());
        assert_eq!(promise.state(), State::Resolved);
        assert_eq!(promise.outcome(), Some(Ok(())));
    }

    #[test]
    fn test_when_single_input_returns_its_promise() {
        let ready: Deferred<i32> = Deferred::new();
        assert_eq!(when(&ready), ready.promise());
        let promise = ready.promise();
        assert_eq!(when(&promise), promise);
    }

    #[test]
    fn test_when_resolves_in_input_order() {
        let deferreds: Vec<Deferred<(i32, i32), &str>> = (0..3).map(|_| Deferred::new()).collect();
        let promise = when((&deferreds[0], &deferreds[1], &deferreds[2]));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        promise.done(move |_, all| {
            assert_eq!(*all, ((1, 2), (3, 4), (5, 6)));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        deferreds[1].resolve((3, 4));
        assert_eq!(promise.state(), State::Pending);
        deferreds[0].resolve((1, 2));
        assert_eq!(promise.state(), State::Pending);
        deferreds[2].resolve((5, 6));
        assert_eq!(promise.state(), State::Resolved);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_when_rejects_on_first_rejection() {
        let a: Deferred<(), (&str, i32), (), u8> = Deferred::new();
        let b: Deferred<(), (&str, i32), (), u8> = Deferred::new();
        let c: Deferred<(), (&str, i32), (), u8> = Deferred::new();
        let promise = when((&a, &b, &c));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        promise.fail(move |context, reason| sink.lock().unwrap().push((*context, *reason)));

        a.resolve(());
        assert_eq!(promise.state(), State::Pending);
        b.reject_with(7, ("foo", 1234));
        assert_eq!(promise.state(), State::Rejected);
        c.resolve(());
        a.reject(("late", 0));
        assert_eq!(promise.state(), State::Rejected);
        assert_eq!(*seen.lock().unwrap(), vec![(7, ("foo", 1234))]);
    }

    #[test]
    fn test_when_mixes_pack_types() {
        let count: Deferred<usize, String> = Deferred::new();
        let name: Deferred<String, String> = Deferred::new();
        let joined = when((count.promise(), &name));
        name.resolve("seesaw".into());
        count.resolve(2);
        assert_eq!(joined.outcome(), Some(Ok((2, "seesaw".to_string()))));
    }

    #[test]
    fn test_when_six_inputs() {
        let inputs: Vec<Deferred<u8>> = (0..6).map(|_| Deferred::new()).collect();
        let all = when((
            &inputs[0], &inputs[1], &inputs[2], &inputs[3], &inputs[4], &inputs[5],
        ));
        for (value, input) in inputs.iter().enumerate().rev() {
            assert_eq!(all.state(), State::Pending);
            input.resolve(value as u8);
        }
        assert_eq!(all.outcome(), Some(Ok((0, 1, 2, 3, 4, 5))));
    }

    #[test]
    fn test_when_with_already_settled_inputs() {
        let a: Deferred<i32> = Deferred::new();
        let b: Deferred<i32> = Deferred::new();
        a.resolve(1);
        b.resolve(2);
        assert_eq!(when((&a, &b)).outcome(), Some(Ok((1, 2))));
    }

    #[test]
    fn test_when_all_collects_in_order() {
        let inputs: Vec<Deferred<u8>> = (0..4).map(|_| Deferred::new()).collect();
        let all = when_all(&inputs);
        for (value, input) in inputs.iter().enumerate().rev() {
            input.resolve(value as u8);
        }
        assert_eq!(all.outcome(), Some(Ok(vec![0, 1, 2, 3])));
    }

    #[test]
    fn test_when_all_empty_and_single() {
        let none: Vec<Deferred<u8>> = Vec::new();
        assert_eq!(when_all(&none).outcome(), Some(Ok(Vec::new())));

        let one: Deferred<u8> = Deferred::new();
        let all = when_all([one.promise()]);
        one.resolve(9);
        assert_eq!(all.outcome(), Some(Ok(vec![9])));
    }

    #[test]
    fn test_when_all_rejects() {
        let inputs: Vec<Deferred<u8, &str>> = (0..3).map(|_| Deferred::new()).collect();
        let all = when_all(inputs.iter());
        inputs[2].reject("third");
        inputs[0].resolve(0);
        assert_eq!(all.outcome(), Some(Err("third")));
    }
}
