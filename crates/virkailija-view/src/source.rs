//! Push-based source streams.
//!
//! A source is created as an emitter/stream pair. The emitter belongs to
//! whatever fetches the resource; the stream is handed to consumers. A new
//! subscriber first receives the source's current event (the initial pending
//! envelope, the newest loaded envelope, or a failure) and then every later
//! event in emission order.

use crate::envelope::{ResourceEnvelope, SourceError, SourceEvent};
use crate::registry::{Subscribers, Subscription};
use crate::tick::TickScope;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

struct SourceShared<T> {
    name: String,
    current: RefCell<SourceEvent<T>>,
    subscribers: Subscribers<SourceEvent<T>>,
}

/// Create a source named `name`, starting in the pending state.
pub fn source<T: Clone + 'static>(name: impl Into<String>) -> (SourceEmitter<T>, SourceStream<T>) {
    let shared = Rc::new(SourceShared {
        name: name.into(),
        current: RefCell::new(SourceEvent::pending()),
        subscribers: Subscribers::new(),
    });
    (
        SourceEmitter {
            shared: shared.clone(),
        },
        SourceStream { shared },
    )
}

/// Producer side of a source.
pub struct SourceEmitter<T> {
    shared: Rc<SourceShared<T>>,
}

impl<T: Clone + 'static> SourceEmitter<T> {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Publish `event`.
    ///
    /// A pending envelope after the source has loaded is rejected: a loaded
    /// source only moves on to a newer value or a failure. Returns whether
    /// the event was published.
    ///
    /// Delivery is one tick: a view model fed by this source through several
    /// inputs composes once, after every input has seen the event.
    pub fn emit(&self, event: SourceEvent<T>) -> bool {
        let reverts = matches!(&event, SourceEvent::Envelope(env) if !env.is_loaded())
            && self.shared.current.borrow().is_loaded();
        if reverts {
            warn!(source = %self.shared.name, "ignoring pending envelope after load");
            return false;
        }

        let _tick = TickScope::enter();
        *self.shared.current.borrow_mut() = event.clone();
        self.shared.subscribers.notify(&event);
        true
    }

    pub fn emit_pending(&self) -> bool {
        self.emit(SourceEvent::Envelope(ResourceEnvelope::pending()))
    }

    pub fn emit_loaded(&self, value: T) -> bool {
        self.emit(SourceEvent::loaded(value))
    }

    pub fn emit_failed(&self, error: SourceError) -> bool {
        self.emit(SourceEvent::Failed(error))
    }

    /// Fail with a message, naming this source.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let error = SourceError::new(self.shared.name.clone(), message);
        self.emit_failed(error)
    }

    pub fn stream(&self) -> SourceStream<T> {
        SourceStream {
            shared: self.shared.clone(),
        }
    }
}

/// Consumer side of a source.
pub struct SourceStream<T> {
    shared: Rc<SourceShared<T>>,
}

impl<T> Clone for SourceStream<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + 'static> SourceStream<T> {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The most recent event.
    pub fn current(&self) -> SourceEvent<T> {
        self.shared.current.borrow().clone()
    }

    /// The newest loaded value, if the source is currently loaded.
    pub fn latest(&self) -> Option<T> {
        self.shared.current.borrow().value().cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    /// Receive the current event now and every later event until the
    /// subscription is dropped.
    pub fn subscribe(&self, callback: impl Fn(&SourceEvent<T>) + 'static) -> Subscription {
        let callback: Rc<dyn Fn(&SourceEvent<T>)> = Rc::new(callback);
        let subscription = self.shared.subscribers.subscribe(callback.clone());
        let current = self.current();
        callback(&current);
        subscription
    }
}

impl<T> std::fmt::Debug for SourceStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceStream")
            .field("name", &self.shared.name)
            .finish()
    }
}
