//! Diff suppression for configuration snapshots
//!
//! Decides whether two encoded configurations differ in a way the user cares
//! about. Fields whose name starts with [`COMPUTED_MARKER`] belong to the
//! executor and are ignored.

use crate::decode::{canonical_json, decode_map};
use serde::Serialize;
use serde_json::{Map, Value};

/// Prefix that marks a declared field as computed.
pub const COMPUTED_MARKER: char = '@';

/// Whether a field name carries the computed marker
pub fn is_computed(name: &str) -> bool {
    name.starts_with(COMPUTED_MARKER)
}

/// Returns true when `old` and `new` are equivalent after stripping computed
/// fields.
///
/// A side that cannot be decoded compares as empty, so two undecodable
/// snapshots are equivalent while a decodable and an undecodable one are not.
pub fn suppress(old: &str, new: &str) -> bool {
    let equivalent = stripped(old) == stripped(new);
    log::trace!("suppress diff: {equivalent} for {old:?} vs {new:?}");
    equivalent
}

/// Canonical encoding with computed fields removed, empty if undecodable.
fn stripped(encoded: &str) -> Vec<u8> {
    match decode_map(encoded.as_bytes()) {
        Ok(mut map) => {
            map.retain(|name, _| !is_computed(name));
            canonical_json(&map)
        }
        Err(e) => {
            log::debug!("treating undecodable configuration as empty: {e}");
            Vec::new()
        }
    }
}

/// A field that differs between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub name: String,
    pub old: Value,
    pub new: Value,
}

/// Field-level report of what changed between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigDiff {
    /// Fields only in the new snapshot
    pub added: Map<String, Value>,
    /// Fields only in the old snapshot
    pub removed: Map<String, Value>,
    /// Fields present in both with different values
    pub changed: Vec<FieldChange>,
}

impl ConfigDiff {
    /// Compare two encoded snapshots, ignoring computed fields.
    ///
    /// Undecodable snapshots are treated as empty, as in [`suppress`].
    pub fn between(old: &str, new: &str) -> Self {
        let old = fields(old);
        let new = fields(new);
        let mut diff = Self::default();

        for (name, value) in &old {
            match new.get(name) {
                None => {
                    diff.removed.insert(name.clone(), value.clone());
                }
                Some(other) if other != value => diff.changed.push(FieldChange {
                    name: name.clone(),
                    old: value.clone(),
                    new: other.clone(),
                }),
                Some(_) => {}
            }
        }

        for (name, value) in new {
            if !old.contains_key(&name) {
                diff.added.insert(name, value);
            }
        }

        diff
    }

    /// Total number of changed fields
    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

fn fields(encoded: &str) -> Map<String, Value> {
    let mut map = decode_map(encoded.as_bytes()).unwrap_or_default();
    map.retain(|name, _| !is_computed(name));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_snapshots_are_equivalent() {
        assert!(suppress("", ""));
    }

    #[test]
    fn test_declared_change_is_not_suppressed() {
        assert!(!suppress(r#"{"@A": "23", "B": 44}"#, r#"{"@A": 12}"#));
        assert!(!suppress(r#"{"@A": "23", "B": 44}"#, r#"{"@A": 12, "B": "44"}"#));
    }

    #[test]
    fn test_computed_change_is_suppressed() {
        assert!(suppress(r#"{"@A": "23", "B": 44}"#, r#"{"@A": 12, "B": 44}"#));
        assert!(suppress(r#"{"B": 44}"#, r#"{"@created": "now", "B": 44}"#));
    }

    #[test]
    fn test_suppress_is_reflexive() {
        for x in [
            r#"{"album": "white", "tracks": [1, 2]}"#,
            "album: white\n",
            "album = \"white\"\n",
            "{}",
        ] {
            assert!(suppress(x, x), "{x}");
        }
    }

    #[test]
    fn test_encoding_does_not_matter() {
        assert!(suppress(r#"{"album": "white", "year": 1968}"#, "year: 1968\nalbum: white\n"));
    }

    #[test]
    fn test_undecodable_snapshots() {
        assert!(suppress("[not valid", "{{also not"));
        assert!(!suppress("[not valid", r#"{"a": 1}"#));
        assert!(!suppress("[not valid", "{}"));
    }

    #[test]
    fn test_config_diff_report() {
        let diff = ConfigDiff::between(
            r#"{"album": "white", "year": 1968, "@id": "1", "label": "Apple"}"#,
            r#"{"album": "abbey road", "year": 1968, "@id": "2", "tracks": 17}"#,
        );

        assert_eq!(Value::Object(diff.added.clone()), json!({"tracks": 17}));
        assert_eq!(Value::Object(diff.removed.clone()), json!({"label": "Apple"}));
        assert_eq!(
            diff.changed,
            vec![FieldChange {
                name: "album".into(),
                old: json!("white"),
                new: json!("abbey road"),
            }]
        );
        assert_eq!(diff.total(), 3);
    }

    #[test]
    fn test_config_diff_agrees_with_suppress() {
        let old = r#"{"@A": "23", "B": 44}"#;
        let new = r#"{"@A": 12, "B": 44}"#;
        assert!(!ConfigDiff::between(old, new).has_changes());
        assert!(ConfigDiff::between(old, r#"{"B": 45}"#).has_changes());
    }
}
