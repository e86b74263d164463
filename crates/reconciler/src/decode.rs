//! Configuration decoding
//!
//! A resource's declared configuration may be written as JSON, YAML or TOML.
//! Formats are tried in that order and the first one that yields a mapping
//! wins. The result is always re-encoded as canonical JSON: `serde_json::Map`
//! keeps keys sorted, so the same mapping always produces the same bytes and
//! two snapshots can be compared byte for byte.

use crate::error::{Error, Result};
use serde_json::{Map, Number, Value};

/// Decode a configuration blob and re-encode it as canonical JSON.
pub fn decode(raw: &[u8]) -> Result<Vec<u8>> {
    let map = decode_map(raw)?;
    Ok(canonical_json(&map))
}

/// Decode a configuration blob into a mapping.
pub fn decode_map(raw: &[u8]) -> Result<Map<String, Value>> {
    let mut attempts = Vec::with_capacity(3);

    match serde_json::from_slice::<Map<String, Value>>(raw) {
        Ok(map) => return Ok(map),
        Err(e) => attempts.push(format!("json: {e}")),
    }

    let text = String::from_utf8_lossy(raw);

    match from_yaml(&text) {
        Ok(map) => return Ok(map),
        Err(e) => attempts.push(format!("yaml: {e}")),
    }

    match from_toml(&text) {
        Ok(map) => return Ok(map),
        Err(e) => attempts.push(format!("toml: {e}")),
    }

    log::debug!("decode failed: {}", attempts.join("; "));
    Err(Error::Decode {
        input: raw.to_vec(),
        attempts,
    })
}

/// Encode a mapping as canonical JSON.
pub fn canonical_json(map: &Map<String, Value>) -> Vec<u8> {
    // Serializing a map of JSON values cannot fail: keys are strings and
    // non-finite floats are unrepresentable in `Value`.
    serde_json::to_vec(map).unwrap_or_default()
}

/// Canonical JSON as a `String`.
pub fn canonical_string(map: &Map<String, Value>) -> String {
    String::from_utf8_lossy(&canonical_json(map)).into_owned()
}

fn from_yaml(text: &str) -> std::result::Result<Map<String, Value>, String> {
    let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    match yaml_to_json(value) {
        Value::Object(map) => Ok(map),
        other => Err(format!("top level is not a mapping ({})", kind(&other))),
    }
}

fn from_toml(text: &str) -> std::result::Result<Map<String, Value>, String> {
    let table: toml::Table = toml::from_str(text).map_err(|e| e.to_string())?;
    Ok(table
        .into_iter()
        .map(|(k, v)| (k, toml_to_json(v)))
        .collect())
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .filter_map(|(k, v)| yaml_key(k).map(|k| (k, yaml_to_json(v))))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Scalar YAML keys become strings; compound keys have no JSON spelling.
fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Some(s),
        Yaml::Bool(b) => Some(b.to_string()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Null => Some("null".to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        Yaml::Sequence(_) | Yaml::Mapping(_) => {
            log::warn!("dropping YAML entry with a non-scalar key");
            None
        }
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn redecode(raw: &str) -> Value {
        let canonical = decode(raw.as_bytes()).unwrap();
        serde_json::from_slice(&canonical).unwrap()
    }

    #[test]
    fn test_decode_json() {
        assert_eq!(
            redecode(r#"{"album": "white", "tracks": 30}"#),
            json!({"album": "white", "tracks": 30})
        );
    }

    #[test]
    fn test_decode_yaml() {
        let yaml = "album: white\ntracks: 30\nsides:\n  - A\n  - B\n";
        assert_eq!(
            redecode(yaml),
            json!({"album": "white", "tracks": 30, "sides": ["A", "B"]})
        );
    }

    #[test]
    fn test_decode_toml() {
        let toml = "album = \"white\"\ntracks = 30\n\n[label]\nname = \"Apple\"\n";
        assert_eq!(
            redecode(toml),
            json!({"album": "white", "tracks": 30, "label": {"name": "Apple"}})
        );
    }

    #[test]
    fn test_toml_datetime_becomes_string() {
        let toml = "released = 1968-11-22\n";
        assert_eq!(redecode(toml), json!({"released": "1968-11-22"}));
    }

    #[test]
    fn test_yaml_scalar_keys_are_stringified() {
        assert_eq!(redecode("1: one\ntrue: yes\n"), json!({"1": "one", "true": "yes"}));
    }

    #[test]
    fn test_canonical_encoding_is_key_sorted() {
        let a = decode(br#"{"b": 1, "a": {"d": 2, "c": 3}}"#).unwrap();
        let b = decode(b"a:\n  c: 3\n  d: 2\nb: 1\n").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, br#"{"a":{"c":3,"d":2},"b":1}"#.to_vec());
    }

    #[test]
    fn test_decode_error_carries_input() {
        let err = decode(b"[not valid").unwrap_err();
        match err {
            Error::Decode { input, attempts } => {
                assert_eq!(input, b"[not valid".to_vec());
                assert_eq!(attempts.len(), 3);
                assert!(attempts[0].starts_with("json"));
                assert!(attempts[2].starts_with("toml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_error_keeps_raw_bytes_and_reasons() {
        let raw = b"\xff\xfe: [".to_vec();
        let err = decode(&raw).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("json:"), "{message}");
        assert!(message.contains("toml:"), "{message}");
        assert!(matches!(err, Error::Decode { ref input, .. } if *input == raw));
    }

    #[test]
    fn test_top_level_sequence_is_rejected() {
        assert!(decode(b"[1, 2, 3]").is_err());
    }

    #[test]
    fn test_round_trip_is_stable() {
        let once = decode(b"album: white\n").unwrap();
        let twice = decode(&once).unwrap();
        assert_eq!(once, twice);
    }
}
