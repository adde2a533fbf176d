//! One-to-many synchronous notification.
//!
//! A [`Subject`] keeps an ordered list of [`Observer`] callbacks and invokes
//! all of them, on the calling thread, every time [`Subject::notify`] runs.
//! Observers are identified by the `Arc` they were registered with, so the
//! same handle is needed to remove one again.

use std::sync::Arc;

/// A registered callback.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Wrap a closure into an [`Observer`].
pub fn observer<T, F>(callback: F) -> Observer<T>
where
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// An ordered list of observers sharing one payload type.
pub struct Subject<T> {
    observers: Vec<Observer<T>>,
}

impl<T> Subject<T> {
    /// Create a subject with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Register an observer. It runs after every observer registered before it.
    pub fn add_observer(&mut self, observer: Observer<T>) {
        self.observers.push(observer);
    }

    /// Remove a previously registered observer.
    ///
    /// Returns `true` if it was found.
    pub fn remove_observer(&mut self, observer: &Observer<T>) -> bool {
        match self
            .observers
            .iter()
            .position(|registered| Arc::ptr_eq(registered, observer))
        {
            Some(pos) => {
                self.observers.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Invoke every observer with `payload`, in registration order.
    pub fn notify(&self, payload: &T) {
        for observer in &self.observers {
            observer(payload);
        }
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` if nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Drop every observer.
    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_notify_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subject = Subject::<u32>::new();

        let first = Arc::clone(&log);
        subject.add_observer(observer(move |v: &u32| first.lock().push(("first", *v))));
        let second = Arc::clone(&log);
        subject.add_observer(observer(move |v: &u32| second.lock().push(("second", *v))));

        subject.notify(&7);
        subject.notify(&8);

        assert_eq!(
            *log.lock(),
            vec![("first", 7), ("second", 7), ("first", 8), ("second", 8)]
        );
    }

    #[test]
    fn test_remove_observer_by_handle() {
        let hits = Arc::new(Mutex::new(0));
        let mut subject = Subject::<()>::new();

        let counter = Arc::clone(&hits);
        let handle = observer(move |_: &()| *counter.lock() += 1);
        subject.add_observer(Arc::clone(&handle));
        subject.notify(&());

        assert!(subject.remove_observer(&handle));
        assert!(!subject.remove_observer(&handle));
        subject.notify(&());

        assert_eq!(*hits.lock(), 1);
        assert!(subject.is_empty());
    }

    #[test]
    fn test_identical_closures_are_distinct_observers() {
        let mut subject = Subject::<u8>::new();
        let a = observer(|_: &u8| {});
        let b = observer(|_: &u8| {});
        subject.add_observer(Arc::clone(&a));
        subject.add_observer(Arc::clone(&b));
        assert!(subject.remove_observer(&a));
        assert_eq!(subject.len(), 1);
    }
}
