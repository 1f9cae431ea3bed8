//! Glue for APIs that report completion through `success` / `error`
//! callbacks instead of returning a promise.
use crate::{Deferred, Payload, Promise};

/// Callback slots handed to a callback-style request.
pub struct Handlers<T, E> {
    pub success: Option<Box<dyn FnOnce(T) + Send>>,
    pub error: Option<Box<dyn FnOnce(E) + Send>>,
}

impl<T, E> Default for Handlers<T, E> {
    fn default() -> Self {
        Handlers {
            success: None,
            error: None,
        }
    }
}

impl<T, E> Handlers<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.success = Some(Box::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(E) + Send + 'static,
    {
        self.error = Some(Box::new(callback));
        self
    }
}

/// Issues a callback-style request and returns a promise of its completion.
///
/// Both slots of `handlers` are wrapped: the caller's own callback, if any,
/// runs first with the result, then a fresh deferred is resolved (`success`)
/// or rejected (`error`) with it. `send` receives the wrapped handlers and is
/// expected to start the request.
///
/// # Examples
///
/// ```
/// use deferred::adapter::{adapt, Handlers};
///
/// let promise = adapt(Handlers::<String, u16>::new(), |handlers| {
///     if let Some(error) = handlers.error {
///         error(404);
///     }
/// });
/// assert_eq!(promise.outcome(), Some(Err(404)));
/// ```
pub fn adapt<T, E, S>(handlers: Handlers<T, E>, send: S) -> Promise<T, E>
where
    T: Payload + Clone,
    E: Payload + Clone,
    S: FnOnce(Handlers<T, E>),
{
    let deferred: Deferred<T, E> = Deferred::new();
    let Handlers { success, error } = handlers;

    let resolver = deferred.clone();
    let rejecter = deferred.clone();
    let wrapped = Handlers::new()
        .on_success(move |value: T| {
            if let Some(success) = success {
                success(value.clone());
            }
            resolver.resolve(value);
        })
        .on_error(move |reason: E| {
            if let Some(error) = error {
                error(reason.clone());
            }
            rejecter.reject(reason);
        });
    send(wrapped);
    deferred.promise()
}
