//! Provider defaults merged with per-resource overrides
//!
//! Every parameter is looked up in the provider configuration first and then
//! in the resource; a value on the resource always wins. This lets one
//! provider block set `executor`, `script` and `id_key` for many resources
//! while any single resource can still point somewhere else.

use crate::error::{Error, Result, describe};
use crate::types::{EffectiveParameters, Event, ResourceInstance};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Something parameter values can be read from
pub trait FieldSource {
    /// Look up a field by name
    fn field(&self, name: &str) -> Option<&Value>;
}

impl FieldSource for Map<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl FieldSource for ResourceInstance {
    fn field(&self, name: &str) -> Option<&Value> {
        self.overrides.get(name)
    }
}

/// Parameters with dedicated handling; never exported as extras
const ESSENTIAL_FIELDS: [&str; 6] = [
    "id_key",
    "executor",
    "script",
    "embedded",
    "computed",
    "environment",
];

const SOURCES: &str = "provider defaults or resource";

/// Resolve a single string parameter.
///
/// Returns the instance value if it is a string, else the provider default if
/// it is a string, else `None`. Whether `None` is fatal for a `required`
/// field is the caller's decision.
pub fn resolve(
    name: &str,
    required: bool,
    defaults: &Map<String, Value>,
    instance: &dyn FieldSource,
) -> Option<String> {
    let from_defaults = defaults.get(name).and_then(Value::as_str);
    let from_instance = instance.field(name).and_then(Value::as_str);
    let resolved = from_instance.or(from_defaults).map(str::to_string);
    log::debug!("resolve {name} (required: {required}) => {resolved:?}");
    resolved
}

/// Build the effective parameters for an event.
///
/// Returns the parameters together with the instance's current identity.
pub fn resolve_essentials(
    event: Event,
    instance: &ResourceInstance,
    provider_config: Option<&Value>,
) -> Result<(EffectiveParameters, String)> {
    let empty = Map::new();
    let defaults = match provider_config {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(other) => return Err(Error::type_mismatch("provider configuration", "a mapping", other)),
    };
    log::debug!("{event} '{}' with provider defaults {defaults:?}", instance.identity);

    let embedded = string_field("embedded", false, defaults, instance)?;
    // A process executor is only needed when no embedded handler is named
    let needs_process = embedded.is_none();
    let id_key = string_field("id_key", true, defaults, instance)?.unwrap_or_default();
    if id_key.trim().is_empty() {
        return Err(Error::TypeMismatch {
            field: "id_key".to_string(),
            expected: "a non-blank string",
            actual: format!("'{id_key}'"),
        });
    }
    let executor = string_field("executor", needs_process, defaults, instance)?;
    let script = string_field("script", needs_process, defaults, instance)?;
    if embedded.is_some() && (executor.is_some() || script.is_some()) {
        log::warn!("embedded handler set; ignoring executor and script for {event}");
    }

    let computed_source = string_field("computed", false, defaults, instance)?;
    let mut computed = match &computed_source {
        Some(raw) => parse_computed(raw)?,
        None => BTreeSet::new(),
    };
    if computed.remove(&id_key) {
        log::warn!("'{id_key}' is the id key and cannot also be a computed field");
    }

    let environment = merge_environment(defaults, instance)?;

    let extras = defaults
        .iter()
        .filter(|(k, _)| !ESSENTIAL_FIELDS.contains(&k.as_str()))
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect();

    let params = EffectiveParameters {
        id_key,
        executor,
        script,
        embedded,
        environment,
        computed,
        computed_source,
        extras,
    };
    log::debug!("effective parameters = {params:?}");
    Ok((params, instance.identity.clone()))
}

/// Resolve a string parameter, rejecting values of any other type.
fn string_field(
    name: &str,
    required: bool,
    defaults: &Map<String, Value>,
    instance: &ResourceInstance,
) -> Result<Option<String>> {
    let resolved = resolve(name, required, defaults, instance);
    let winner = instance
        .field(name)
        .filter(|v| !v.is_null())
        .or_else(|| defaults.get(name).filter(|v| !v.is_null()));

    match (resolved, winner) {
        (_, Some(value)) if !value.is_string() => {
            Err(Error::type_mismatch(name, "a string", value))
        }
        (Some(value), _) => Ok(Some(value)),
        (None, _) if required => Err(Error::MissingField {
            field: name.to_string(),
            sources: SOURCES.to_string(),
        }),
        (None, _) => Ok(None),
    }
}

/// Parse the `computed` parameter: a JSON array of field names.
fn parse_computed(raw: &str) -> Result<BTreeSet<String>> {
    let parsed: Value = serde_json::from_str(raw).map_err(|_| Error::TypeMismatch {
        field: "computed".to_string(),
        expected: "a JSON array of field names",
        actual: format!("'{raw}'"),
    })?;

    let Value::Array(items) = parsed else {
        return Err(Error::type_mismatch(
            "computed",
            "a JSON array of field names",
            &parsed,
        ));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(name),
            other => Err(Error::type_mismatch(
                "computed entry",
                "a field name string",
                &other,
            )),
        })
        .collect()
}

/// Merge the `environment` mappings; resource entries win per key.
fn merge_environment(
    defaults: &Map<String, Value>,
    instance: &ResourceInstance,
) -> Result<BTreeMap<String, String>> {
    let mut merged = BTreeMap::new();
    for source in [defaults.get("environment"), instance.field("environment")] {
        let entries = match source {
            None | Some(Value::Null) => continue,
            Some(Value::Object(entries)) => entries,
            Some(other) => return Err(Error::type_mismatch("environment", "a mapping", other)),
        };
        for (name, value) in entries {
            match value {
                Value::String(s) => {
                    merged.insert(name.clone(), s.clone());
                }
                other => {
                    return Err(Error::TypeMismatch {
                        field: format!("environment.{name}"),
                        expected: "a string",
                        actual: describe(other),
                    });
                }
            }
        }
    }
    Ok(merged)
}
