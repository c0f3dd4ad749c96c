//! Resource envelopes and source events.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// Marks whether an asynchronously fetched value has arrived.
///
/// A pending envelope never carries a result, and a loaded envelope always
/// does. Serializes as `{"loaded": bool, "result": value | null}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEnvelope<T> {
    result: Option<T>,
}

impl<T> ResourceEnvelope<T> {
    pub fn pending() -> Self {
        Self { result: None }
    }

    pub fn loaded(value: T) -> Self {
        Self {
            result: Some(value),
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.result.is_some()
    }

    #[inline]
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<T> {
        self.result
    }
}

impl<T> Default for ResourceEnvelope<T> {
    fn default() -> Self {
        Self::pending()
    }
}

impl<T: Serialize> Serialize for ResourceEnvelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("ResourceEnvelope", 2)?;
        st.serialize_field("loaded", &self.is_loaded())?;
        st.serialize_field("result", &self.result)?;
        st.end()
    }
}

/// A source failed to produce its value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source '{source_name}' failed: {message}")]
pub struct SourceError {
    source_name: String,
    message: String,
}

impl SourceError {
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One emission of a source stream.
///
/// Failure is its own event kind so that consumers can tell "still loading"
/// from "failed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent<T> {
    Envelope(ResourceEnvelope<T>),
    Failed(SourceError),
}

impl<T> SourceEvent<T> {
    pub fn pending() -> Self {
        SourceEvent::Envelope(ResourceEnvelope::pending())
    }

    pub fn loaded(value: T) -> Self {
        SourceEvent::Envelope(ResourceEnvelope::loaded(value))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, SourceEvent::Envelope(env) if env.is_loaded())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceEvent::Failed(_))
    }

    /// The loaded value, if this event carries one.
    pub fn value(&self) -> Option<&T> {
        match self {
            SourceEvent::Envelope(env) => env.result(),
            SourceEvent::Failed(_) => None,
        }
    }
}

impl<T> From<ResourceEnvelope<T>> for SourceEvent<T> {
    fn from(env: ResourceEnvelope<T>) -> Self {
        SourceEvent::Envelope(env)
    }
}

impl<T> From<SourceError> for SourceEvent<T> {
    fn from(err: SourceError) -> Self {
        SourceEvent::Failed(err)
    }
}
