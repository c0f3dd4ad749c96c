//! Edit configuration.

use serde::Deserialize;

/// Options shared by [`Mutator`](crate::Mutator) and
/// [`EditSession`](crate::EditSession).
///
/// ```
/// use virkailija_state::EditConfig;
///
/// let config = EditConfig::from_json_str(r#"{"path_separator": "/"}"#).unwrap();
/// assert_eq!(config.path_separator, '/');
/// assert!(config.append_at_sequence_end);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Separator between segments of a field name.
    pub path_separator: char,
    /// Whether the last segment may address `len` of an existing sequence,
    /// appending a new element there.
    pub append_at_sequence_end: bool,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            path_separator: '.',
            append_at_sequence_end: true,
        }
    }
}

impl EditConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn with_path_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }

    pub fn with_append_at_sequence_end(mut self, enabled: bool) -> Self {
        self.append_at_sequence_end = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EditConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EditConfig::default());
    }

    #[test]
    fn test_rejects_multi_char_separator() {
        assert!(EditConfig::from_json_str(r#"{"path_separator": "::"}"#).is_err());
    }
}
