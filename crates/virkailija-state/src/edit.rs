//! Edit session over a loaded record.
//!
//! ```text
//! ReadOnly --begin_edit--> Editing --commit--> Committing --ok--> ReadOnly
//!                             |                    |
//!                             |                    +--save error--> Editing
//!                             +--discard--> Discarding --> ReadOnly
//! ```
//!
//! Edits are written straight into the live record, so a renderer reading
//! [`EditSession::record`] sees them immediately. The snapshot taken by
//! `begin_edit` exists exactly while the session is editing (including an
//! in-flight commit, which may fall back to editing).

use crate::error::PathError;
use crate::mutate::Mutator;
use crate::path::parse_dotted_with;
use crate::{EditConfig, Path};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Lifecycle state of an [`EditSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    ReadOnly,
    Editing,
    Committing,
    Discarding,
}

impl fmt::Display for EditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditState::ReadOnly => "read-only",
            EditState::Editing => "editing",
            EditState::Committing => "committing",
            EditState::Discarding => "discarding",
        };
        f.write_str(name)
    }
}

/// Failure reported by a [`RecordSaver`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("save failed: {message}")]
pub struct SaveError {
    message: String,
}

impl SaveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from [`EditSession`] operations.
#[derive(Debug, Error)]
pub enum EditError {
    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        state: EditState,
        operation: &'static str,
    },

    /// The field path could not be parsed or traversed.
    #[error(transparent)]
    Path(#[from] PathError),

    /// The save collaborator rejected the record; the session is still editing.
    #[error(transparent)]
    SaveFailed(SaveError),
}

/// Save side of the record store.
#[async_trait]
pub trait RecordSaver: Send + Sync {
    /// Persist the full record.
    async fn save(&self, record: &Value) -> Result<(), SaveError>;
}

#[async_trait]
impl<S: RecordSaver + ?Sized> RecordSaver for Arc<S> {
    async fn save(&self, record: &Value) -> Result<(), SaveError> {
        (**self).save(record).await
    }
}

/// Adapts a synchronous closure into a [`RecordSaver`].
pub struct FnSaver<F>(pub F);

#[async_trait]
impl<F> RecordSaver for FnSaver<F>
where
    F: Fn(&Value) -> Result<(), SaveError> + Send + Sync,
{
    async fn save(&self, record: &Value) -> Result<(), SaveError> {
        (self.0)(record)
    }
}

/// One applied edit, kept until the session commits or discards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldEdit {
    pub path: Path,
    pub value: Value,
}

/// Reversible edit lifecycle for one loaded record.
#[derive(Debug)]
pub struct EditSession {
    record: Value,
    snapshot: Option<Value>,
    state: EditState,
    edits: Vec<FieldEdit>,
    last_save_error: Option<SaveError>,
    mutator: Mutator,
}

impl EditSession {
    /// Wrap a loaded record in a read-only session.
    pub fn new(record: Value) -> Self {
        Self::with_config(record, EditConfig::default())
    }

    pub fn with_config(record: Value, config: EditConfig) -> Self {
        Self {
            record,
            snapshot: None,
            state: EditState::ReadOnly,
            edits: Vec::new(),
            last_save_error: None,
            mutator: Mutator::new(config),
        }
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        self.state == EditState::Editing
    }

    /// The live record, including any uncommitted edits.
    pub fn record(&self) -> &Value {
        &self.record
    }

    /// The record as it was when editing began.
    pub fn snapshot(&self) -> Option<&Value> {
        self.snapshot.as_ref()
    }

    /// Edits applied since `begin_edit`, in order.
    pub fn edits(&self) -> &[FieldEdit] {
        &self.edits
    }

    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty()
    }

    /// The error of the most recent failed commit, cleared by the next
    /// successful commit or a discard.
    pub fn last_save_error(&self) -> Option<&SaveError> {
        self.last_save_error.as_ref()
    }

    pub fn into_record(self) -> Value {
        self.record
    }

    /// Replace the record with a refreshed copy from its source.
    ///
    /// Only allowed while read-only so that a refresh never overwrites
    /// pending edits.
    pub fn replace_record(&mut self, record: Value) -> Result<(), EditError> {
        self.require(EditState::ReadOnly, "replace the record")?;
        self.record = record;
        Ok(())
    }

    pub fn begin_edit(&mut self) -> Result<(), EditError> {
        self.require(EditState::ReadOnly, "begin editing")?;
        self.snapshot = Some(self.record.clone());
        self.transition(EditState::Editing);
        Ok(())
    }

    /// Store `raw` at `path` in the live record.
    ///
    /// The value is stored as received; no coercion to the type of the
    /// value it replaces.
    pub fn apply_field_edit(&mut self, path: &Path, raw: impl Into<Value>) -> Result<(), EditError> {
        self.require(EditState::Editing, "apply an edit")?;
        let value = raw.into();
        self.mutator.set(&mut self.record, path, value.clone())?;
        debug!(path = %path, "applied field edit");
        self.edits.push(FieldEdit {
            path: path.clone(),
            value,
        });
        Ok(())
    }

    /// Like [`EditSession::apply_field_edit`], taking the input's field name.
    pub fn apply_field_input(&mut self, field: &str, raw: impl Into<Value>) -> Result<(), EditError> {
        self.require(EditState::Editing, "apply an edit")?;
        let path = parse_dotted_with(field, self.mutator.config().path_separator)?;
        self.apply_field_edit(&path, raw)
    }

    /// Throw away all edits and return to read-only.
    pub fn discard(&mut self) -> Result<(), EditError> {
        self.require(EditState::Editing, "discard")?;
        self.transition(EditState::Discarding);
        if let Some(snapshot) = self.snapshot.take() {
            self.record = snapshot;
        }
        self.edits.clear();
        self.last_save_error = None;
        self.transition(EditState::ReadOnly);
        Ok(())
    }

    /// Hand the live record to `saver`.
    ///
    /// On success the session returns to read-only and the snapshot is
    /// dropped. On failure it stays in editing with every edit intact. If the
    /// returned future is dropped before the save completes, the session is
    /// left editing.
    pub async fn commit<S>(&mut self, saver: &S) -> Result<(), EditError>
    where
        S: RecordSaver + ?Sized,
    {
        self.require(EditState::Editing, "commit")?;
        self.transition(EditState::Committing);

        let mut guard = CommitGuard {
            state: &mut self.state,
            settled: false,
        };
        let outcome = saver.save(&self.record).await;

        match outcome {
            Ok(()) => {
                guard.settle(EditState::ReadOnly);
                self.snapshot = None;
                self.edits.clear();
                self.last_save_error = None;
                debug!(to = %EditState::ReadOnly, "record committed");
                Ok(())
            }
            Err(err) => {
                guard.settle(EditState::Editing);
                warn!(error = %err, edits = self.edits.len(), "commit failed, edits kept");
                self.last_save_error = Some(err.clone());
                Err(EditError::SaveFailed(err))
            }
        }
    }

    fn require(&self, expected: EditState, operation: &'static str) -> Result<(), EditError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EditError::InvalidTransition {
                state: self.state,
                operation,
            })
        }
    }

    fn transition(&mut self, to: EditState) {
        debug!(from = %self.state, to = %to, "edit session transition");
        self.state = to;
    }
}

/// Returns the session to editing if a commit is abandoned mid-save.
struct CommitGuard<'a> {
    state: &'a mut EditState,
    settled: bool,
}

impl CommitGuard<'_> {
    fn settle(&mut self, to: EditState) {
        *self.state = to;
        self.settled = true;
    }
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *self.state = EditState::Editing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn test_begin_edit_snapshots_record() {
        let mut session = EditSession::new(json!({"etunimet": "Matti"}));
        assert!(session.snapshot().is_none());
        session.begin_edit().unwrap();
        assert_eq!(session.state(), EditState::Editing);
        assert_eq!(session.snapshot(), Some(&json!({"etunimet": "Matti"})));
    }

    #[test]
    fn test_begin_edit_twice_fails() {
        let mut session = EditSession::new(json!({}));
        session.begin_edit().unwrap();
        let err = session.begin_edit().unwrap_err();
        assert!(matches!(
            err,
            EditError::InvalidTransition {
                state: EditState::Editing,
                ..
            }
        ));
        assert_eq!(err.to_string(), "cannot begin editing while editing");
    }

    #[test]
    fn test_operations_require_editing() {
        let mut session = EditSession::new(json!({}));
        assert!(matches!(
            session.apply_field_edit(&path!("a"), "x"),
            Err(EditError::InvalidTransition { .. })
        ));
        assert!(matches!(
            session.discard(),
            Err(EditError::InvalidTransition { .. })
        ));
        assert_eq!(session.record(), &json!({}));
    }

    #[test]
    fn test_edit_is_visible_on_live_record_only() {
        let mut session = EditSession::new(json!({"kutsumanimi": "Matti"}));
        session.begin_edit().unwrap();
        session.apply_field_input("kutsumanimi", "Masa").unwrap();
        assert_eq!(session.record()["kutsumanimi"], "Masa");
        assert_eq!(session.snapshot().unwrap()["kutsumanimi"], "Matti");
        assert!(session.is_dirty());
        assert_eq!(session.edits()[0].path, path!("kutsumanimi"));
    }

    #[test]
    fn test_invalid_path_leaves_record_intact() {
        let mut session = EditSession::new(json!({"sukunimi": "Virtanen"}));
        session.begin_edit().unwrap();
        let err = session.apply_field_input("sukunimi.x", "y").unwrap_err();
        assert!(matches!(err, EditError::Path(PathError::TypeMismatch { .. })));
        assert_eq!(session.record(), &json!({"sukunimi": "Virtanen"}));
        assert!(!session.is_dirty());
        assert_eq!(session.state(), EditState::Editing);
    }

    #[test]
    fn test_discard_restores_snapshot() {
        let original = json!({"a": {"b": "1"}, "list": [{"v": "x"}]});
        let mut session = EditSession::new(original.clone());
        session.begin_edit().unwrap();
        session.apply_field_input("a.b", "2").unwrap();
        session.apply_field_input("list.0.v", "y").unwrap();
        session.apply_field_input("new.field", "z").unwrap();
        session.discard().unwrap();

        assert_eq!(session.record(), &original);
        assert_eq!(session.state(), EditState::ReadOnly);
        assert!(session.snapshot().is_none());
        assert!(session.edits().is_empty());
    }

    #[test]
    fn test_replace_record_only_when_read_only() {
        let mut session = EditSession::new(json!({"v": 1}));
        session.replace_record(json!({"v": 2})).unwrap();
        assert_eq!(session.record()["v"], 2);

        session.begin_edit().unwrap();
        assert!(session.replace_record(json!({"v": 3})).is_err());
        assert_eq!(session.record()["v"], 2);
    }

    #[test]
    fn test_separator_from_config() {
        let config = EditConfig::default().with_path_separator('/');
        let mut session = EditSession::with_config(json!({}), config);
        session.begin_edit().unwrap();
        session.apply_field_input("a/b", "c").unwrap();
        assert_eq!(session.record(), &json!({"a": {"b": "c"}}));
    }
}
