//! Combine-latest view models.
//!
//! A [`CombinedViewModel`] caches the newest value of each input source and
//! composes them whenever an input updates and every input is loaded. Before
//! all inputs have loaded it stays [`ViewStatus::Pending`] and emits nothing.
//! An input failure is emitted downstream at once and blocks composition
//! until that input loads again.
//!
//! # Invariants
//!
//! 1. A ready event is emitted only when every input's newest event is a
//!    loaded envelope, and it is composed from those newest values.
//! 2. Composition inside a [`tick`](crate::tick()) runs once, at tick end.
//! 3. Notification passes never overlap: an input update or failure arriving
//!    while subscribers are being notified is delivered after that pass
//!    finishes, so every subscriber sees events in the same order.
//! 4. After [`CombinedViewModel::dispose`] (or drop) no input reaches the
//!    view model and no subscriber is called.

use crate::envelope::{SourceError, SourceEvent};
use crate::registry::{Subscribers, Subscription};
use crate::source::SourceStream;
use crate::tick::{defer, in_tick, TickScope};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// What a renderer should show for a combined view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus<T> {
    /// Not every input has loaded yet.
    Pending,
    Ready(T),
    Failed(SourceError),
}

impl<T> ViewStatus<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ViewStatus::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewStatus::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// An emission of a combined view model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent<T> {
    Ready(T),
    Failed(SourceError),
}

#[derive(Debug, Clone)]
enum SlotStatus {
    Pending,
    Loaded,
    Failed,
}

type Compose<Out> = Box<dyn Fn() -> Option<Out>>;

struct CombineCore<Out> {
    label: String,
    slots: RefCell<Vec<SlotStatus>>,
    compose: Compose<Out>,
    status: RefCell<ViewStatus<Out>>,
    subscribers: Subscribers<ViewEvent<Out>>,
    inputs: RefCell<Vec<Subscription>>,
    failures: RefCell<Vec<SourceError>>,
    scheduled: Cell<bool>,
    /// An input loaded a value that has not been composed yet.
    stale: Cell<bool>,
    composing: Cell<bool>,
    dirty: Cell<bool>,
    disposed: Cell<bool>,
    emissions: Cell<u64>,
}

impl<Out: Clone + 'static> CombineCore<Out> {
    fn on_input(self: &Rc<Self>, slot: usize, event: SlotEvent) {
        if self.disposed.get() {
            return;
        }

        match event {
            SlotEvent::Pending => self.set_slot(slot, SlotStatus::Pending),
            SlotEvent::Loaded => {
                self.set_slot(slot, SlotStatus::Loaded);
                self.stale.set(true);
                self.request_compose();
            }
            SlotEvent::Failed(error) => {
                self.set_slot(slot, SlotStatus::Failed);
                warn!(view = %self.label, error = %error, "input source failed");
                *self.status.borrow_mut() = ViewStatus::Failed(error.clone());
                self.failures.borrow_mut().push(error);
                self.flush();
            }
        }
    }

    fn set_slot(&self, slot: usize, status: SlotStatus) {
        if let Some(entry) = self.slots.borrow_mut().get_mut(slot) {
            *entry = status;
        }
    }

    fn request_compose(self: &Rc<Self>) {
        if !in_tick() {
            self.flush();
            return;
        }
        if self.scheduled.replace(true) {
            return;
        }
        let pending = ScheduledFlush {
            core: Some(Rc::downgrade(self)),
        };
        defer(Box::new(move || pending.run()));
    }

    fn all_loaded(&self) -> bool {
        self.slots
            .borrow()
            .iter()
            .all(|slot| matches!(slot, SlotStatus::Loaded))
    }

    fn flush(&self) {
        if self.composing.get() {
            self.dirty.set(true);
            return;
        }

        self.composing.set(true);
        loop {
            self.dirty.set(false);
            if self.disposed.get() {
                break;
            }
            let failures = std::mem::take(&mut *self.failures.borrow_mut());
            for error in failures {
                self.subscribers.notify(&ViewEvent::Failed(error));
            }
            if self.stale.get() && self.all_loaded() {
                self.stale.set(false);
                if let Some(value) = (self.compose)() {
                    *self.status.borrow_mut() = ViewStatus::Ready(value.clone());
                    self.emissions.set(self.emissions.get() + 1);
                    debug!(view = %self.label, emission = self.emissions.get(), "view composed");
                    self.subscribers.notify(&ViewEvent::Ready(value));
                }
            }
            if !self.dirty.get() {
                break;
            }
        }
        self.composing.set(false);
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let inputs = std::mem::take(&mut *self.inputs.borrow_mut());
        drop(inputs);
        self.subscribers.clear();
        self.failures.borrow_mut().clear();
        debug!(view = %self.label, "view model disposed");
    }
}

/// A composition deferred to the end of the current tick.
///
/// Dropping it unrun (a tick unwinding from a panic) clears the view's
/// scheduled flag so later updates can schedule again.
struct ScheduledFlush<Out: Clone + 'static> {
    core: Option<Weak<CombineCore<Out>>>,
}

impl<Out: Clone + 'static> ScheduledFlush<Out> {
    fn run(mut self) {
        if let Some(core) = self.core.take().and_then(|core| core.upgrade()) {
            core.scheduled.set(false);
            core.flush();
        }
    }
}

impl<Out: Clone + 'static> Drop for ScheduledFlush<Out> {
    fn drop(&mut self) {
        if let Some(core) = self.core.take().and_then(|core| core.upgrade()) {
            core.scheduled.set(false);
        }
    }
}

enum SlotEvent {
    Pending,
    Loaded,
    Failed(SourceError),
}

/// Combine-latest composition over a fixed set of sources.
///
/// Owns its input subscriptions; dropping it tears them down.
pub struct CombinedViewModel<Out> {
    core: Rc<CombineCore<Out>>,
}

impl<Out: Clone + 'static> CombinedViewModel<Out> {
    /// Assemble a view model over `slot_count` inputs.
    ///
    /// `connect` subscribes each input; it runs inside a tick so that inputs
    /// which are already loaded compose once.
    fn build(
        label: String,
        slot_count: usize,
        compose: Compose<Out>,
        connect: impl FnOnce(&Rc<CombineCore<Out>>) -> Vec<Subscription>,
    ) -> Self {
        let core = Rc::new(CombineCore {
            label,
            slots: RefCell::new(vec![SlotStatus::Pending; slot_count]),
            compose,
            status: RefCell::new(ViewStatus::Pending),
            subscribers: Subscribers::new(),
            inputs: RefCell::new(Vec::new()),
            failures: RefCell::new(Vec::new()),
            scheduled: Cell::new(false),
            stale: Cell::new(true),
            composing: Cell::new(false),
            dirty: Cell::new(false),
            disposed: Cell::new(false),
            emissions: Cell::new(0),
        });

        {
            let _tick = TickScope::enter();
            let inputs = connect(&core);
            *core.inputs.borrow_mut() = inputs;
            core.request_compose();
        }

        Self { core }
    }

    /// Name used in log output, derived from the input source names.
    pub fn label(&self) -> &str {
        &self.core.label
    }

    pub fn status(&self) -> ViewStatus<Out> {
        self.core.status.borrow().clone()
    }

    /// The most recently composed value, while the view is ready.
    pub fn latest(&self) -> Option<Out> {
        self.core.status.borrow().ready().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.core.status.borrow().is_ready()
    }

    /// Number of ready events emitted so far.
    pub fn emission_count(&self) -> u64 {
        self.core.emissions.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.disposed.get()
    }

    /// Receive the current ready or failed state now (if any) and every
    /// later emission.
    pub fn subscribe(&self, callback: impl Fn(&ViewEvent<Out>) + 'static) -> Subscription {
        let callback: Rc<dyn Fn(&ViewEvent<Out>)> = Rc::new(callback);
        let subscription = self.core.subscribers.subscribe(callback.clone());
        let current = match &*self.core.status.borrow() {
            ViewStatus::Pending => None,
            ViewStatus::Ready(value) => Some(ViewEvent::Ready(value.clone())),
            ViewStatus::Failed(error) => Some(ViewEvent::Failed(error.clone())),
        };
        if let Some(event) = current {
            callback(&event);
        }
        subscription
    }

    /// Unsubscribe from every input and drop every subscriber. Idempotent.
    pub fn dispose(&self) {
        self.core.dispose();
    }
}

impl<Out> std::fmt::Debug for CombinedViewModel<Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedViewModel")
            .field("label", &self.core.label)
            .field("emissions", &self.core.emissions.get())
            .finish()
    }
}

/// Subscribe `core` to `stream` as input `slot`, caching values in `cell`.
fn wire<T, Out>(
    core: &Rc<CombineCore<Out>>,
    slot: usize,
    stream: &SourceStream<T>,
    cell: Rc<RefCell<Option<T>>>,
) -> Subscription
where
    T: Clone + 'static,
    Out: Clone + 'static,
{
    let core: Weak<CombineCore<Out>> = Rc::downgrade(core);
    stream.subscribe(move |event| {
        let Some(core) = core.upgrade() else {
            return;
        };
        let slot_event = match event {
            SourceEvent::Envelope(env) => match env.result() {
                Some(value) => {
                    *cell.borrow_mut() = Some(value.clone());
                    SlotEvent::Loaded
                }
                None => SlotEvent::Pending,
            },
            SourceEvent::Failed(error) => SlotEvent::Failed(error.clone()),
        };
        core.on_input(slot, slot_event);
    })
}

fn label_of(names: &[&str]) -> String {
    names.join("+")
}

macro_rules! combine_fn {
    ($(#[$meta:meta])* $name:ident, $count:expr; $($src:ident: $ty:ident => $cell:ident @ $slot:expr),+) => {
        $(#[$meta])*
        pub fn $name<$($ty,)+ Out, F>($($src: &SourceStream<$ty>,)+ compose: F) -> CombinedViewModel<Out>
        where
            $($ty: Clone + 'static,)+
            Out: Clone + 'static,
            F: Fn($(&$ty),+) -> Out + 'static,
        {
            $(let $cell: Rc<RefCell<Option<$ty>>> = Rc::new(RefCell::new(None));)+
            let compose_fn: Compose<Out> = {
                $(let $cell = $cell.clone();)+
                Box::new(move || -> Option<Out> {
                    $(let $src = $cell.borrow();)+
                    Some(compose($($src.as_ref()?),+))
                })
            };
            let label = label_of(&[$($src.name()),+]);
            CombinedViewModel::build(label, $count, compose_fn, |core| {
                vec![$(wire(core, $slot, $src, $cell)),+]
            })
        }
    };
}

combine_fn!(
    /// Combine two sources.
    ///
    /// ```
    /// use virkailija_view::{combine2, source};
    ///
    /// let (henkilo_tx, henkilo) = source::<String>("henkilo");
    /// let (orgs_tx, orgs) = source::<Vec<String>>("organisaatiot");
    /// let view = combine2(&henkilo, &orgs, |h, o| format!("{h}: {}", o.len()));
    ///
    /// henkilo_tx.emit_loaded("Matti".into());
    /// assert!(view.latest().is_none());
    /// orgs_tx.emit_loaded(vec!["1.2.246.562.10.1".into()]);
    /// assert_eq!(view.latest().as_deref(), Some("Matti: 1"));
    /// ```
    combine2, 2; a: A => cell_a @ 0, b: B => cell_b @ 1
);

combine_fn!(
    /// Combine three sources.
    combine3, 3; a: A => cell_a @ 0, b: B => cell_b @ 1, c: C => cell_c @ 2
);

combine_fn!(
    /// Combine four sources.
    combine4, 4; a: A => cell_a @ 0, b: B => cell_b @ 1, c: C => cell_c @ 2, d: D => cell_d @ 3
);

/// Combine any number of sources of one type into a list, in input order.
///
/// With no inputs the view is ready immediately with an empty list.
pub fn combine_all<T: Clone + 'static>(sources: &[SourceStream<T>]) -> CombinedViewModel<Vec<T>> {
    let cells: Vec<Rc<RefCell<Option<T>>>> = sources
        .iter()
        .map(|_| Rc::new(RefCell::new(None)))
        .collect();

    let compose_fn: Compose<Vec<T>> = {
        let cells = cells.clone();
        Box::new(move || -> Option<Vec<T>> {
            cells.iter().map(|cell| cell.borrow().clone()).collect()
        })
    };

    let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
    CombinedViewModel::build(label_of(&names), sources.len(), compose_fn, |core| {
        sources
            .iter()
            .zip(cells)
            .enumerate()
            .map(|(slot, (stream, cell))| wire(core, slot, stream, cell))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::source;
    use crate::tick::tick;

    fn record<T: Clone + 'static>(
        view: &CombinedViewModel<T>,
    ) -> (Rc<RefCell<Vec<ViewEvent<T>>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let sub = view.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        (seen, sub)
    }

    #[test]
    fn test_pending_until_all_loaded() {
        let (a_tx, a) = source::<u32>("a");
        let (_b_tx, b) = source::<u32>("b");
        let view = combine2(&a, &b, |a, b| a + b);
        let (seen, _sub) = record(&view);

        a_tx.emit_loaded(1);
        assert_eq!(view.status(), ViewStatus::Pending);
        assert!(seen.borrow().is_empty());
        assert_eq!(view.label(), "a+b");
    }

    #[test]
    fn test_reemits_with_latest_values() {
        let (a_tx, a) = source::<u32>("a");
        let (b_tx, b) = source::<u32>("b");
        let view = combine2(&a, &b, |a, b| (*a, *b));
        let (seen, _sub) = record(&view);

        a_tx.emit_loaded(1);
        b_tx.emit_loaded(10);
        a_tx.emit_loaded(2);
        b_tx.emit_loaded(20);

        assert_eq!(
            *seen.borrow(),
            vec![
                ViewEvent::Ready((1, 10)),
                ViewEvent::Ready((2, 10)),
                ViewEvent::Ready((2, 20)),
            ]
        );
    }

    #[test]
    fn test_already_loaded_inputs_compose_once_at_build() {
        let (a_tx, a) = source::<u32>("a");
        let (b_tx, b) = source::<u32>("b");
        a_tx.emit_loaded(1);
        b_tx.emit_loaded(2);

        let view = combine2(&a, &b, |a, b| a * b);
        assert_eq!(view.emission_count(), 1);

        let (seen, _sub) = record(&view);
        assert_eq!(*seen.borrow(), vec![ViewEvent::Ready(2)]);
    }

    #[test]
    fn test_failure_propagates_and_blocks_until_recovery() {
        let (a_tx, a) = source::<u32>("a");
        let (b_tx, b) = source::<u32>("b");
        let view = combine2(&a, &b, |a, b| a + b);
        let (seen, _sub) = record(&view);

        a_tx.emit_loaded(1);
        b_tx.emit_loaded(1);
        b_tx.fail("boom");
        a_tx.emit_loaded(5);

        assert!(matches!(view.status(), ViewStatus::Failed(_)));
        assert_eq!(seen.borrow().len(), 2);
        assert!(matches!(seen.borrow()[1], ViewEvent::Failed(ref e) if e.source_name() == "b"));

        b_tx.emit_loaded(2);
        assert_eq!(view.latest(), Some(7));
    }

    #[test]
    fn test_same_tick_updates_compose_once() {
        let (a_tx, a) = source::<u32>("a");
        let (b_tx, b) = source::<u32>("b");
        let view = combine2(&a, &b, |a, b| (*a, *b));
        a_tx.emit_loaded(0);
        b_tx.emit_loaded(0);
        let (seen, _sub) = record(&view);

        crate::tick::tick(|| {
            a_tx.emit_loaded(1);
            b_tx.emit_loaded(2);
        });

        assert_eq!(
            *seen.borrow(),
            vec![ViewEvent::Ready((0, 0)), ViewEvent::Ready((1, 2))]
        );
    }

    #[test]
    fn test_dispose_is_idempotent_and_stops_propagation() {
        let (a_tx, a) = source::<u32>("a");
        let (b_tx, b) = source::<u32>("b");
        let view = combine2(&a, &b, |a, b| a + b);
        a_tx.emit_loaded(1);
        b_tx.emit_loaded(1);
        let (seen, _sub) = record(&view);

        view.dispose();
        view.dispose();
        assert!(view.is_disposed());
        assert_eq!(a.subscriber_count(), 0);

        a_tx.emit_loaded(9);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(view.emission_count(), 1);
    }

    #[test]
    fn test_drop_releases_inputs() {
        let (_a_tx, a) = source::<u32>("a");
        let (_b_tx, b) = source::<u32>("b");
        let view = combine2(&a, &b, |a, b| a + b);
        assert_eq!(a.subscriber_count(), 1);
        drop(view);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn test_reentrant_update_does_not_overlap() {
        let (a_tx, a) = source::<u32>("a");
        let view = combine_all(&[a.clone()]);
        let a_tx = Rc::new(a_tx);

        let depth = Rc::new(Cell::new(0));
        let max_depth = Rc::new(Cell::new(0));
        let values = Rc::new(RefCell::new(Vec::new()));
        let (d, m, v, tx) = (depth.clone(), max_depth.clone(), values.clone(), a_tx.clone());
        let _sub = view.subscribe(move |event| {
            d.set(d.get() + 1);
            m.set(m.get().max(d.get()));
            if let ViewEvent::Ready(list) = event {
                v.borrow_mut().push(list[0]);
                if list[0] == 1 {
                    tx.emit_loaded(2);
                }
            }
            d.set(d.get() - 1);
        });

        a_tx.emit_loaded(1);
        assert_eq!(*values.borrow(), vec![1, 2]);
        assert_eq!(max_depth.get(), 1);
    }

    #[test]
    fn test_shared_source_composes_once_per_event() {
        let (a_tx, a) = source::<u32>("a");
        let view = combine2(&a, &a.clone(), |x, y| (*x, *y));
        let (seen, _sub) = record(&view);

        a_tx.emit_loaded(1);
        a_tx.emit_loaded(2);

        assert_eq!(
            *seen.borrow(),
            vec![ViewEvent::Ready((1, 1)), ViewEvent::Ready((2, 2))]
        );
    }

    #[test]
    fn test_failure_during_notification_reaches_every_subscriber_last() {
        let (a_tx, a) = source::<u32>("a");
        let (b_tx, b) = source::<u32>("b");
        let view = combine2(&a, &b, |a, b| a + b);
        let b_tx = Rc::new(b_tx);

        let tx = b_tx.clone();
        let _first = view.subscribe(move |event| {
            if *event == ViewEvent::Ready(3) {
                tx.fail("boom");
            }
        });
        let (seen, _second) = record(&view);

        a_tx.emit_loaded(1);
        b_tx.emit_loaded(2);

        let failure = ViewEvent::Failed(SourceError::new("b", "boom"));
        assert!(matches!(view.status(), ViewStatus::Failed(_)));
        assert_eq!(*seen.borrow(), vec![ViewEvent::Ready(3), failure]);
    }

    #[test]
    fn test_recovery_during_failure_notification_is_ordered() {
        let (a_tx, a) = source::<u32>("a");
        let (b_tx, b) = source::<u32>("b");
        let view = combine2(&a, &b, |a, b| a + b);
        let b_tx = Rc::new(b_tx);
        a_tx.emit_loaded(1);
        b_tx.emit_loaded(1);

        let tx = b_tx.clone();
        let _first = view.subscribe(move |event| {
            if matches!(event, ViewEvent::Failed(_)) {
                tx.emit_loaded(4);
            }
        });
        let (seen, _second) = record(&view);

        b_tx.fail("timeout");

        assert_eq!(view.latest(), Some(5));
        assert_eq!(seen.borrow().len(), 3);
        assert!(matches!(seen.borrow()[1], ViewEvent::Failed(_)));
        assert_eq!(seen.borrow()[2], ViewEvent::Ready(5));
    }

    #[test]
    fn test_combine4_uses_every_input() {
        let (a_tx, a) = source::<u32>("henkilo");
        let (b_tx, b) = source::<&'static str>("l10n");
        let (c_tx, c) = source::<Vec<u32>>("organisaatiot");
        let (d_tx, d) = source::<bool>("passivoitu");
        let view = combine4(&a, &b, &c, &d, |a, b, c, d| {
            format!("{b}:{a}:{}:{d}", c.len())
        });

        tick(|| {
            a_tx.emit_loaded(7);
            b_tx.emit_loaded("fi");
            c_tx.emit_loaded(vec![1, 2]);
        });
        assert_eq!(view.status(), ViewStatus::Pending);

        d_tx.emit_loaded(false);
        assert_eq!(view.latest().as_deref(), Some("fi:7:2:false"));
        assert_eq!(view.label(), "henkilo+l10n+organisaatiot+passivoitu");
        assert_eq!(view.emission_count(), 1);
    }

    #[test]
    fn test_view_recovers_after_panicking_tick() {
        let (a_tx, a) = source::<u32>("a");
        let (b_tx, b) = source::<u32>("b");
        let view = combine2(&a, &b, |a, b| a + b);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tick(|| {
                a_tx.emit_loaded(1);
                b_tx.emit_loaded(2);
                panic!("render failed");
            })
        }));
        assert!(outcome.is_err());
        assert!(!in_tick());
        assert_eq!(view.emission_count(), 0);

        a_tx.emit_loaded(3);
        assert_eq!(view.latest(), Some(5));
    }

    #[test]
    fn test_combine_all_empty_is_ready() {
        let view = combine_all::<u32>(&[]);
        assert_eq!(view.latest(), Some(vec![]));
    }
}
