//! Callback shapes and the normalization of nested callback lists.
use std::sync::Arc;

/// Runs once with the settlement context and the resolution pack.
pub type DoneFn<T, C> = Box<dyn FnOnce(&C, &T) + Send>;
/// Runs once with the settlement context and the rejection pack.
pub type FailFn<E, C> = Box<dyn FnOnce(&C, &E) + Send>;
/// Runs once with the settlement context and whichever pack settled.
pub type AlwaysFn<T, E, C> = Box<dyn FnOnce(&C, Result<&T, &E>) + Send>;
/// Runs on every `notify` while pending.
pub type ProgressFn<P, C> = Arc<dyn Fn(&C, &P) + Send + Sync>;

/// A possibly nested list of callbacks, as accepted by the `*_all`
/// registration methods.
///
/// # Examples
///
/// ```
/// use deferred::{flatten, Callbacks};
///
/// let nested = vec![
///     Callbacks::One(1),
///     Callbacks::Absent,
///     Callbacks::from(vec![2, 3]),
///     Callbacks::from(None),
///     Callbacks::Many(vec![Callbacks::from(vec![4]), Callbacks::One(5)]),
/// ];
/// assert_eq!(flatten(nested), vec![1, 2, 3, 4, 5]);
/// ```
pub enum Callbacks<F> {
    One(F),
    Many(Vec<Callbacks<F>>),
    /// A missing slot. Skipped silently.
    Absent,
}

impl<F> Callbacks<F> {
    /// Flattens into encounter order, dropping absent entries.
    pub fn flatten(self) -> Vec<F> {
        let mut flat = Vec::new();
        self.flatten_into(&mut flat);
        flat
    }

    fn flatten_into(self, flat: &mut Vec<F>) {
        match self {
            Callbacks::One(callback) => flat.push(callback),
            Callbacks::Many(items) => {
                for item in items {
                    item.flatten_into(flat);
                }
            }
            Callbacks::Absent => {}
        }
    }
}

/// Flattens a sequence of callback entries into a single ordered list.
pub fn flatten<F, I>(items: I) -> Vec<F>
where
    I: IntoIterator<Item = Callbacks<F>>,
{
    let mut flat = Vec::new();
    for item in items {
        item.flatten_into(&mut flat);
    }
    flat
}

impl<F> Default for Callbacks<F> {
    fn default() -> Self {
        Callbacks::Absent
    }
}

impl<F> From<Option<F>> for Callbacks<F> {
    fn from(callback: Option<F>) -> Self {
        callback.map_or(Callbacks::Absent, Callbacks::One)
    }
}

impl<F> From<Vec<F>> for Callbacks<F> {
    fn from(callbacks: Vec<F>) -> Self {
        Callbacks::Many(callbacks.into_iter().map(Callbacks::One).collect())
    }
}

impl<F> FromIterator<Callbacks<F>> for Callbacks<F> {
    fn from_iter<I: IntoIterator<Item = Callbacks<F>>>(iter: I) -> Self {
        Callbacks::Many(iter.into_iter().collect())
    }
}
