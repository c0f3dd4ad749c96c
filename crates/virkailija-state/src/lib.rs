//! Path-addressed editing of loosely typed records.
//!
//! A loaded entity (a person record, say) is held as a `serde_json::Value`.
//! Form inputs name the location they edit with a field path, and an
//! [`EditSession`] writes each edit into the live record, keeping a snapshot
//! so the whole edit can be discarded or committed through a
//! [`RecordSaver`].
//!
//! # Quick Start
//!
//! ```
//! use virkailija_state::{EditSession, EditState};
//! use serde_json::json;
//!
//! let mut session = EditSession::new(json!({"kutsumanimi": "Matti"}));
//! session.begin_edit().unwrap();
//! session.apply_field_input("kutsumanimi", "Masa").unwrap();
//! assert_eq!(session.record()["kutsumanimi"], "Masa");
//!
//! session.discard().unwrap();
//! assert_eq!(session.state(), EditState::ReadOnly);
//! assert_eq!(session.record()["kutsumanimi"], "Matti");
//! ```

mod bindings;
mod config;
mod edit;
mod error;
mod mutate;
mod path;

pub use bindings::{collect_group_bindings, FieldBinding, GroupLayout};
pub use config::EditConfig;
pub use edit::{EditError, EditSession, EditState, FieldEdit, FnSaver, RecordSaver, SaveError};
pub use error::{value_type_name, PathError, PathResult};
pub use mutate::{get_at_path, set_at_path, set_dotted, Mutator};
pub use path::{parse_dotted, parse_dotted_with, Path, Seg};

pub use serde_json::Value;
