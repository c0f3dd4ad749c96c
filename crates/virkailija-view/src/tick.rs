//! Propagation ticks.
//!
//! Source events delivered inside a tick update each combined view model's
//! cached inputs immediately, but success composition is deferred until the
//! outermost tick ends, so a view model whose inputs changed several times in
//! one tick composes once from the final values. Failures are not deferred.
//!
//! Ticks nest; only the outermost one flushes. Every emission opens a tick of
//! its own, so outside an explicit tick each event is its own tick.
//!
//! If a tick unwinds from a panic its deferred jobs are dropped without
//! running.

use std::cell::RefCell;

type Job = Box<dyn FnOnce()>;

#[derive(Default)]
struct TickState {
    depth: usize,
    deferred: Vec<Job>,
}

thread_local! {
    static TICK: RefCell<TickState> = RefCell::new(TickState::default());
}

/// RAII guard for one propagation tick.
///
/// ```
/// use virkailija_view::{combine2, source, TickScope};
///
/// let (a_tx, a) = source::<u32>("a");
/// let (b_tx, b) = source::<u32>("b");
/// let sum = combine2(&a, &b, |a, b| a + b);
/// {
///     let _tick = TickScope::enter();
///     a_tx.emit_loaded(1);
///     b_tx.emit_loaded(2);
///     assert_eq!(sum.latest(), None);
/// }
/// assert_eq!(sum.latest(), Some(3));
/// assert_eq!(sum.emission_count(), 1);
/// ```
#[must_use = "the tick ends when the scope is dropped"]
pub struct TickScope {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl TickScope {
    pub fn enter() -> Self {
        TICK.with(|tick| tick.borrow_mut().depth += 1);
        Self {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl Drop for TickScope {
    fn drop(&mut self) {
        let jobs = TICK.with(|tick| {
            let mut tick = tick.borrow_mut();
            tick.depth = tick.depth.saturating_sub(1);
            if tick.depth == 0 {
                std::mem::take(&mut tick.deferred)
            } else {
                Vec::new()
            }
        });

        if std::thread::panicking() {
            return;
        }
        for job in jobs {
            job();
        }
    }
}

/// Run `f` as a single propagation tick.
pub fn tick<R>(f: impl FnOnce() -> R) -> R {
    let _scope = TickScope::enter();
    f()
}

/// Whether a tick is open on this thread.
pub fn in_tick() -> bool {
    TICK.with(|tick| tick.borrow().depth > 0)
}

/// Run `job` when the outermost tick ends, or now if no tick is open.
pub(crate) fn defer(job: Job) {
    let job = TICK.with(|tick| {
        let mut tick = tick.borrow_mut();
        if tick.depth > 0 {
            tick.deferred.push(job);
            None
        } else {
            Some(job)
        }
    });
    if let Some(job) = job {
        job();
    }
}
