//! Subscriber lists and RAII subscriptions.
//!
//! Callbacks are notified in registration order. A callback removed while a
//! notification is in progress (by itself or by an earlier callback) is not
//! called for that notification or any later one.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type Callback<E> = Rc<dyn Fn(&E)>;

struct Entry<E> {
    id: u64,
    alive: Rc<Cell<bool>>,
    callback: Callback<E>,
}

struct RegistryInner<E> {
    next_id: u64,
    entries: Vec<Entry<E>>,
}

/// Single-threaded list of event callbacks.
pub(crate) struct Subscribers<E> {
    inner: Rc<RefCell<RegistryInner<E>>>,
}

impl<E: 'static> Subscribers<E> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register `callback`. The returned subscription removes it.
    pub(crate) fn subscribe(&self, callback: Callback<E>) -> Subscription {
        let alive = Rc::new(Cell::new(true));
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push(Entry {
                id,
                alive: alive.clone(),
                callback,
            });
            id
        };

        let registry: Weak<RefCell<RegistryInner<E>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            alive.set(false);
            if let Some(inner) = registry.upgrade() {
                inner.borrow_mut().entries.retain(|entry| entry.id != id);
            }
        })
    }

    pub(crate) fn notify(&self, event: &E) {
        let targets: Vec<(Rc<Cell<bool>>, Callback<E>)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|entry| (entry.alive.clone(), entry.callback.clone()))
            .collect();

        for (alive, callback) in targets {
            if alive.get() {
                callback(event);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Drop every callback.
    pub(crate) fn clear(&self) {
        let entries = std::mem::take(&mut self.inner.borrow_mut().entries);
        for entry in &entries {
            entry.alive.set(false);
        }
    }
}

/// Handle to a registered callback.
///
/// Dropping it unsubscribes. [`Subscription::unsubscribe`] may be called any
/// number of times; only the first call has an effect.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving events.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// False once [`Subscription::unsubscribe`] has run.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Keep the callback registered for as long as its source lives.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
