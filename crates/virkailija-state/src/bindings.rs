//! Field bindings for grouped list fields.
//!
//! A record often holds a list of groups, each with a list of typed items
//! (contact groups holding contact details, for example). A renderer needs
//! one input per item, named by the path that an edit to that input must
//! write to.

use crate::Path;
use serde::Deserialize;
use serde_json::Value;

/// Field names describing a group/item layout inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupLayout {
    /// Record field holding the list of groups.
    pub groups: String,
    /// Group field holding the list of items.
    pub items: String,
    /// Item field holding the label (a localization key).
    pub label: String,
    /// Item field holding the editable value.
    pub value: String,
}

impl GroupLayout {
    pub fn new(
        groups: impl Into<String>,
        items: impl Into<String>,
        label: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            groups: groups.into(),
            items: items.into(),
            label: label.into(),
            value: value.into(),
        }
    }
}

/// One editable item and the path its input writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub label: String,
    pub value: Value,
    pub path: Path,
}

impl FieldBinding {
    /// Field name for the form input.
    pub fn input_name(&self) -> String {
        self.path.to_dotted()
    }

    /// Whether the field is shown: always while editing, otherwise only
    /// when it holds a value.
    pub fn visible(&self, read_only: bool) -> bool {
        !read_only || has_value(&self.value)
    }
}

fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Collect bindings for every item of every group, preserving order.
///
/// Groups or items that are not lists yield nothing.
pub fn collect_group_bindings(record: &Value, layout: &GroupLayout) -> Vec<Vec<FieldBinding>> {
    let Some(groups) = record.get(&layout.groups).and_then(Value::as_array) else {
        return Vec::new();
    };

    groups
        .iter()
        .enumerate()
        .map(|(group_idx, group)| {
            let items = group
                .get(&layout.items)
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            items
                .iter()
                .enumerate()
                .map(|(item_idx, item)| FieldBinding {
                    label: item
                        .get(&layout.label)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                    value: item.get(&layout.value).cloned().unwrap_or(Value::Null),
                    path: Path::root()
                        .key(layout.groups.as_str())
                        .index(group_idx)
                        .key(layout.items.as_str())
                        .index(item_idx)
                        .key(layout.value.as_str()),
                })
                .collect()
        })
        .collect()
}
