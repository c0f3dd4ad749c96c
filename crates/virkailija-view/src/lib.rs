//! Reactive composition of independently loading resources.
//!
//! A view typically needs several resources at once (a person record, its
//! organisations, the localization table). Each resource is a
//! [`SourceStream`] of [`ResourceEnvelope`]s, and a [`CombinedViewModel`]
//! turns a set of them into a single stream that is ready only when every
//! input has loaded.
//!
//! # Concurrency
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). Events propagate
//! synchronously: when an emitter publishes, every subscriber and every
//! downstream view model has run before `emit` returns. Asynchronous fetches
//! live outside, and report back through [`feed_source`] or by calling the
//! emitter directly.
//!
//! # Quick Start
//!
//! ```
//! use virkailija_view::{combine3, source, ViewStatus};
//!
//! let (orgs_tx, orgs) = source::<Vec<String>>("organisaatiot");
//! let (l10n_tx, l10n) = source::<String>("l10n");
//! let (henkilo_tx, henkilo) = source::<String>("henkilo");
//!
//! let view = combine3(&l10n, &henkilo, &orgs, |l10n, henkilo, orgs| {
//!     format!("{l10n}: {henkilo} ({} orgs)", orgs.len())
//! });
//!
//! orgs_tx.emit_loaded(vec![]);
//! l10n_tx.emit_loaded("fi".into());
//! assert_eq!(view.status(), ViewStatus::Pending);
//!
//! henkilo_tx.emit_loaded("Matti".into());
//! assert_eq!(view.latest().as_deref(), Some("fi: Matti (0 orgs)"));
//! ```

mod combine;
mod envelope;
mod feed;
mod registry;
mod source;
mod tick;

pub use combine::{combine2, combine3, combine4, combine_all, CombinedViewModel, ViewEvent, ViewStatus};
pub use envelope::{ResourceEnvelope, SourceError, SourceEvent};
pub use feed::{feed_source, load_once};
pub use registry::Subscription;
pub use source::{source, SourceEmitter, SourceStream};
pub use tick::{in_tick, tick, TickScope};
