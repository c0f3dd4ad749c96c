//! Driving a source from asynchronous fetches.
//!
//! Each item of the fetch stream is published as its own event; the
//! surrounding executor decides when the next item (and so the next tick)
//! arrives. Emitters are single-threaded, so these futures must run on a
//! current-thread runtime or a `LocalSet`.

use crate::envelope::SourceError;
use crate::source::SourceEmitter;
use futures::{pin_mut, Future, Stream, StreamExt};
use tracing::debug;

/// Publish every result of `fetches` through `emitter`.
///
/// Returns the number of events published. Re-fetches (cache invalidation,
/// retries) are simply later items of the stream.
pub async fn feed_source<T, S>(emitter: &SourceEmitter<T>, fetches: S) -> usize
where
    T: Clone + 'static,
    S: Stream<Item = Result<T, SourceError>>,
{
    pin_mut!(fetches);
    let mut published = 0;
    while let Some(item) = fetches.next().await {
        let accepted = match item {
            Ok(value) => emitter.emit_loaded(value),
            Err(error) => emitter.emit_failed(error),
        };
        if accepted {
            published += 1;
        }
    }
    debug!(source = %emitter.name(), published, "fetch stream finished");
    published
}

/// Publish the result of a single fetch through `emitter`.
pub async fn load_once<T, F>(emitter: &SourceEmitter<T>, fetch: F) -> bool
where
    T: Clone + 'static,
    F: Future<Output = Result<T, SourceError>>,
{
    match fetch.await {
        Ok(value) => emitter.emit_loaded(value),
        Err(error) => emitter.emit_failed(error),
    }
}
