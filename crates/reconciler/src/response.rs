//! Executor response processing
//!
//! Turns the raw output of an executor into the updated resource record. The
//! caller's record is cloned up front and only the clone is modified, so an
//! error at any step leaves the caller's record untouched.

use crate::decode::canonical_string;
use crate::error::{Error, Result};
use crate::types::{EffectiveParameters, Event, ExecutorResponse, Outcome, ResourceInstance};
use serde_json::{Map, Value};

/// Decode raw executor output.
///
/// Output that is empty or only whitespace is `Null`.
pub fn decode_response(event: Event, raw: &[u8]) -> Result<ExecutorResponse> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(ExecutorResponse::Null);
    }

    serde_json::from_slice::<Value>(raw)
        .map(ExecutorResponse::from)
        .map_err(|e| {
            log::debug!("executor output for {event} is not JSON: {e}");
            Error::ResponseShape {
                event,
                expected: "JSON",
                output: String::from_utf8_lossy(raw).into_owned(),
            }
        })
}

/// Interpret executor output for `event` against the prior record.
pub fn process(
    event: Event,
    raw: &[u8],
    params: &EffectiveParameters,
    instance: &ResourceInstance,
) -> Result<Outcome> {
    match event {
        Event::Exists => match decode_response(event, raw)? {
            ExecutorResponse::Bool(exists) => Ok(Outcome::Exists(exists)),
            other => Err(shape_error(event, "a boolean", &other, raw)),
        },
        Event::Delete => {
            let mut updated = instance.clone();
            updated.identity.clear();
            Ok(Outcome::Applied(updated))
        }
        Event::Create | Event::Read | Event::Update => match decode_response(event, raw)? {
            ExecutorResponse::Object(response) => {
                apply(event, response, raw, params, instance).map(Outcome::Applied)
            }
            other => Err(shape_error(event, "a JSON object", &other, raw)),
        },
    }
}

fn apply(
    event: Event,
    mut response: Map<String, Value>,
    raw: &[u8],
    params: &EffectiveParameters,
    instance: &ResourceInstance,
) -> Result<ResourceInstance> {
    let computed = split_computed(&mut response, params, &instance.computed_config);

    let id = response.remove(&params.id_key);
    let identity = match (event, id) {
        (Event::Create, Some(Value::String(id))) if !id.is_empty() => id,
        (Event::Create, Some(Value::String(_))) => {
            return Err(missing_identity(params, "empty", raw));
        }
        (Event::Create, Some(_)) => return Err(missing_identity(params, "non-string", raw)),
        (Event::Create, None) => return Err(missing_identity(params, "missing", raw)),
        (_, id) => {
            if let Some(id) = id
                .as_ref()
                .and_then(Value::as_str)
                .filter(|id| *id != instance.identity)
            {
                log::debug!(
                    "{event} returned id '{id}' for '{}', keeping the existing one",
                    instance.identity
                );
            }
            instance.identity.clone()
        }
    };

    log::debug!(
        "{event}: {} declared and {} computed fields",
        response.len(),
        computed.len()
    );

    let mut updated = instance.clone();
    updated.identity = identity;
    updated.declared_config = canonical_string(&response);
    updated.computed_config = computed;
    Ok(updated)
}

/// Move computed fields out of `response`, carrying forward prior values
/// for names the executor did not return.
fn split_computed(
    response: &mut Map<String, Value>,
    params: &EffectiveParameters,
    prior: &Map<String, Value>,
) -> Map<String, Value> {
    let mut computed = Map::new();
    for name in &params.computed {
        if let Some(value) = response.remove(name).or_else(|| prior.get(name).cloned()) {
            computed.insert(name.clone(), value);
        }
    }
    computed
}

fn shape_error(event: Event, expected: &'static str, got: &ExecutorResponse, raw: &[u8]) -> Error {
    log::debug!("{event} expected {expected}, executor gave {}", got.shape());
    Error::ResponseShape {
        event,
        expected,
        output: String::from_utf8_lossy(raw).into_owned(),
    }
}

fn missing_identity(params: &EffectiveParameters, reason: &str, raw: &[u8]) -> Error {
    Error::MissingIdentity {
        id_key: params.id_key.clone(),
        reason: reason.to_string(),
        response: String::from_utf8_lossy(raw).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    const RESPONSE: &[u8] = br#"{"id": "42", "created": "26/10/2020 18:55:51", "album": "white"}"#;

    fn params() -> EffectiveParameters {
        EffectiveParameters {
            id_key: "id".into(),
            executor: Some("python3".into()),
            script: Some("hello.py".into()),
            computed: BTreeSet::from(["created".to_string()]),
            ..Default::default()
        }
    }

    fn applied(outcome: Outcome) -> ResourceInstance {
        outcome.into_instance().unwrap()
    }

    #[test]
    fn test_create_splits_identity_declared_and_computed() {
        let instance = ResourceInstance::new(r#"{"album": "white"}"#);
        let updated = applied(process(Event::Create, RESPONSE, &params(), &instance).unwrap());

        assert_eq!(updated.identity, "42");
        assert_eq!(updated.declared_config, r#"{"album":"white"}"#);
        assert_eq!(
            Value::Object(updated.computed_config),
            json!({"created": "26/10/2020 18:55:51"})
        );
    }

    #[test]
    fn test_update_carries_computed_forward() {
        let mut instance = ResourceInstance::new(r#"{"album":"white"}"#);
        instance.identity = "42".into();
        instance.computed_config = json!({"created": "X"}).as_object().cloned().unwrap();

        let updated = applied(
            process(Event::Update, br#"{"album": "abbey road"}"#, &params(), &instance).unwrap(),
        );

        assert_eq!(updated.identity, "42");
        assert_eq!(updated.declared_config, r#"{"album":"abbey road"}"#);
        assert_eq!(Value::Object(updated.computed_config), json!({"created": "X"}));
    }

    #[test]
    fn test_computed_absent_everywhere_is_omitted() {
        let updated = applied(
            process(Event::Create, br#"{"id": "1", "album": "white"}"#, &params(), &ResourceInstance::default())
                .unwrap(),
        );
        assert!(updated.computed_config.is_empty());
    }

    #[test]
    fn test_read_strips_id_but_keeps_identity() {
        let mut instance = ResourceInstance::new("{}");
        instance.identity = "42".into();
        let updated = applied(
            process(Event::Read, br#"{"id": "other", "album": "white"}"#, &params(), &instance).unwrap(),
        );
        assert_eq!(updated.identity, "42");
        assert_eq!(updated.declared_config, r#"{"album":"white"}"#);
    }

    #[test]
    fn test_exists_shapes() {
        let instance = ResourceInstance::default();
        assert_eq!(
            process(Event::Exists, b"true", &params(), &instance).unwrap(),
            Outcome::Exists(true)
        );
        assert_eq!(
            process(Event::Exists, b"false\n", &params(), &instance).unwrap(),
            Outcome::Exists(false)
        );

        let err = process(Event::Exists, br#"{"a":1}"#, &params(), &instance).unwrap_err();
        assert!(matches!(err, Error::ResponseShape { event: Event::Exists, .. }));

        let err = process(Event::Exists, b"", &params(), &instance).unwrap_err();
        assert!(matches!(err, Error::ResponseShape { .. }));
    }

    #[test]
    fn test_create_requires_object() {
        let instance = ResourceInstance::default();
        let outputs: [&[u8]; 4] = [b"", b"true", b"[1, 2]", b"not json"];
        for raw in outputs {
            let err = process(Event::Create, raw, &params(), &instance).unwrap_err();
            assert!(matches!(err, Error::ResponseShape { .. }), "{err}");
        }
    }

    #[test]
    fn test_create_requires_string_identity() {
        let instance = ResourceInstance::default();

        let err = process(Event::Create, br#"{"album": "white"}"#, &params(), &instance).unwrap_err();
        assert!(err.to_string().contains("missing id attribute 'id'"));

        let err = process(Event::Create, br#"{"id": 42}"#, &params(), &instance).unwrap_err();
        assert!(matches!(err, Error::MissingIdentity { ref reason, .. } if reason == "non-string"));

        let err = process(Event::Create, br#"{"id": ""}"#, &params(), &instance).unwrap_err();
        assert!(matches!(err, Error::MissingIdentity { .. }));
    }

    #[test]
    fn test_failure_leaves_record_untouched() {
        let mut instance = ResourceInstance::new(r#"{"album":"white"}"#);
        instance.computed_config = json!({"created": "X"}).as_object().cloned().unwrap();
        let before = instance.clone();

        assert!(process(Event::Create, b"[]", &params(), &instance).is_err());
        assert!(process(Event::Create, br#"{"created": "Y"}"#, &params(), &instance).is_err());
        assert_eq!(instance, before);
    }

    #[test]
    fn test_delete_clears_identity_and_ignores_output() {
        let mut instance = ResourceInstance::new(r#"{"album":"white"}"#);
        instance.identity = "42".into();

        let updated = applied(process(Event::Delete, b"garbage", &params(), &instance).unwrap());
        assert!(!updated.has_identity());
        assert_eq!(updated.declared_config, instance.declared_config);
    }

    #[test]
    fn test_whitespace_output_is_null() {
        assert_eq!(
            decode_response(Event::Read, b" \n\t").unwrap(),
            ExecutorResponse::Null
        );
    }
}
