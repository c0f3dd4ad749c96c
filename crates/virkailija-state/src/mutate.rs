//! Writing values into a record by field path.
//!
//! `set_at_path` walks the record along every segment except the last,
//! creating an empty map for each missing (or `null`) intermediate slot, and
//! stores the value at the last segment.
//!
//! Sequences are only ever entered, never created: a segment descends into a
//! sequence by position only when a sequence is already stored there, and a
//! missing slot is always filled with a map, even when the segment is numeric
//! or an explicit index. Writing beneath a list field that has not been
//! populated yet therefore produces a map keyed `"0"`, `"1"`, ... rather than
//! a sequence. Callers that need a sequence must store one first.

use crate::error::{value_type_name, PathError, PathResult};
use crate::path::parse_dotted_with;
use crate::{EditConfig, Path, Seg};
use serde_json::{Map, Value};

/// Path writer carrying an [`EditConfig`].
#[derive(Debug, Clone, Default)]
pub struct Mutator {
    config: EditConfig,
}

impl Mutator {
    pub fn new(config: EditConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    /// Store `value` at `path` inside `root`, returning the mutated root.
    ///
    /// On error the record is left unchanged: intermediate maps are created
    /// only on the way to a slot that cannot fail.
    pub fn set<'a>(&self, root: &'a mut Value, path: &Path, value: Value) -> PathResult<&'a mut Value> {
        if path.is_empty() {
            return Err(PathError::EmptyPath);
        }
        set_in(root, path.segments(), 0, path, value, &self.config)?;
        Ok(root)
    }

    /// Parse `field` with the configured separator and store `value` there.
    pub fn set_field<'a>(
        &self,
        root: &'a mut Value,
        field: &str,
        value: Value,
    ) -> PathResult<&'a mut Value> {
        let path = parse_dotted_with(field, self.config.path_separator)?;
        self.set(root, &path, value)
    }
}

/// Store `value` at `path` with the default configuration.
///
/// ```
/// use virkailija_state::{path, set_at_path};
/// use serde_json::json;
///
/// let mut record = json!({});
/// set_at_path(&mut record, &path!("a", "b", "c"), json!("x")).unwrap();
/// assert_eq!(record, json!({"a": {"b": {"c": "x"}}}));
/// ```
pub fn set_at_path<'a>(root: &'a mut Value, path: &Path, value: Value) -> PathResult<&'a mut Value> {
    Mutator::default().set(root, path, value)
}

/// Store `value` at a dotted field name with the default configuration.
pub fn set_dotted<'a>(root: &'a mut Value, field: &str, value: Value) -> PathResult<&'a mut Value> {
    Mutator::default().set_field(root, field, value)
}

fn set_in(
    current: &mut Value,
    segments: &[Seg],
    consumed: usize,
    full_path: &Path,
    value: Value,
    config: &EditConfig,
) -> PathResult<()> {
    let Some((seg, rest)) = segments.split_first() else {
        *current = value;
        return Ok(());
    };

    match current {
        Value::Object(map) => {
            let key = seg.as_field_name();
            if rest.is_empty() {
                map.insert(key, value);
                return Ok(());
            }
            let child = map.entry(key).or_insert(Value::Null);
            if child.is_null() {
                *child = Value::Object(Map::new());
            }
            set_in(child, rest, consumed + 1, full_path, value, config)
        }
        Value::Array(items) => {
            let here = full_path.prefix(consumed + 1);
            let index = seg
                .as_position()
                .ok_or_else(|| PathError::key_on_sequence(here.clone(), seg.as_field_name()))?;
            let len = items.len();

            if rest.is_empty() {
                if index < len {
                    items[index] = value;
                } else if index == len && config.append_at_sequence_end {
                    items.push(value);
                } else {
                    return Err(PathError::index_out_of_bounds(here, index, len));
                }
                return Ok(());
            }

            let child = items
                .get_mut(index)
                .ok_or_else(|| PathError::index_out_of_bounds(here, index, len))?;
            if child.is_null() {
                *child = Value::Object(Map::new());
            }
            set_in(child, rest, consumed + 1, full_path, value, config)
        }
        scalar => Err(PathError::type_mismatch(
            full_path.prefix(consumed),
            "object or array",
            value_type_name(scalar),
        )),
    }
}

/// Read the value at `path`, using the same key/position rules as the writer.
pub fn get_at_path<'a>(doc: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = doc;
    for seg in path.segments() {
        current = match current {
            Value::Object(map) => map.get(&seg.as_field_name())?,
            Value::Array(items) => items.get(seg.as_position()?)?,
            _ => return None,
        };
    }
    Some(current)
}
