//! Executor environment construction
//!
//! The executor inherits the ambient process environment plus one variable
//! per effective parameter, named exactly after the parameter. The ambient
//! environment is captured once into an immutable snapshot and passed in
//! explicitly; nothing here reads or mutates the process environment.

use crate::types::{EffectiveParameters, Event, ExecutorRequest};
use std::collections::BTreeMap;

/// Immutable snapshot of the ambient process environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientEnvironment {
    vars: BTreeMap<String, String>,
}

impl AmbientEnvironment {
    /// Snapshot the current process environment.
    ///
    /// Variables that are not valid Unicode are skipped.
    pub fn capture() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// An empty environment, for isolated invocations and tests
    pub fn empty() -> Self {
        Self::default()
    }

    /// Iterate over variables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AmbientEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Entries describing the parameters and identity, without the ambient part.
///
/// Order: string parameters, then `environment` entries by name, then the
/// id-key entry carrying the identity.
pub fn parameter_bindings(params: &EffectiveParameters, identity: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = params
        .string_entries()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for (name, value) in &params.environment {
        log::debug!("with env var from environment: {name}={value}");
        entries.push((name.clone(), value.clone()));
    }

    entries.push((params.id_key.clone(), identity.to_string()));
    entries
}

/// Build the full environment for an executor.
///
/// Ambient variables come first; later entries override earlier ones with
/// the same name.
pub fn build_environment(
    ambient: &AmbientEnvironment,
    params: &EffectiveParameters,
    identity: &str,
) -> Vec<(String, String)> {
    let bindings = parameter_bindings(params, identity);
    let mut entries = Vec::with_capacity(ambient.len() + bindings.len());
    entries.extend(ambient.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    entries.extend(bindings);
    entries
}

impl ExecutorRequest {
    /// Assemble the request for one lifecycle event.
    ///
    /// `config_json` is the canonical JSON of the declared configuration; it
    /// is withheld from `delete`, which works from the identity alone.
    pub fn build(
        event: Event,
        params: &EffectiveParameters,
        identity: &str,
        config_json: &[u8],
        ambient: &AmbientEnvironment,
    ) -> Self {
        let stdin = if event.sends_config() {
            config_json.to_vec()
        } else {
            Vec::new()
        };

        Self {
            event,
            environment: build_environment(ambient, params, identity),
            stdin,
        }
    }

    /// The environment with later duplicates applied, as the executor sees it
    pub fn effective_environment(&self) -> BTreeMap<&str, &str> {
        self.environment
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EffectiveParameters {
        EffectiveParameters {
            id_key: "id".into(),
            executor: Some("python3".into()),
            script: Some("hello.py".into()),
            environment: BTreeMap::from([
                ("X".to_string(), "2".to_string()),
                ("A".to_string(), "1".to_string()),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_environment_order_is_deterministic() {
        let ambient: AmbientEnvironment = [("PATH", "/bin"), ("HOME", "/root")].into_iter().collect();
        let env = build_environment(&ambient, &params(), "42");
        let names: Vec<&str> = env.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["HOME", "PATH", "id_key", "executor", "script", "A", "X", "id"]
        );
        assert_eq!(env.last(), Some(&("id".to_string(), "42".to_string())));
        assert_eq!(env, build_environment(&ambient, &params(), "42"));
    }

    #[test]
    fn test_parameters_override_ambient() {
        let ambient: AmbientEnvironment = [("script", "stale.py"), ("X", "0")].into_iter().collect();
        let request = ExecutorRequest::build(Event::Read, &params(), "42", b"{}", &ambient);
        let env = request.effective_environment();
        assert_eq!(env["script"], "hello.py");
        assert_eq!(env["X"], "2");
        assert_eq!(env["id"], "42");
    }

    #[test]
    fn test_unset_identity_is_exported_empty() {
        let env = build_environment(&AmbientEnvironment::empty(), &params(), "");
        assert_eq!(env.last(), Some(&("id".to_string(), String::new())));
    }

    #[test]
    fn test_delete_sends_no_config() {
        let ambient = AmbientEnvironment::empty();
        let request = ExecutorRequest::build(Event::Delete, &params(), "42", br#"{"a":1}"#, &ambient);
        assert!(request.stdin.is_empty());

        let request = ExecutorRequest::build(Event::Update, &params(), "42", br#"{"a":1}"#, &ambient);
        assert_eq!(request.stdin, br#"{"a":1}"#.to_vec());
    }

    #[test]
    fn test_capture_reads_process_environment() {
        let ambient = AmbientEnvironment::capture();
        if let Ok(path) = std::env::var("PATH") {
            assert!(ambient.iter().any(|(k, v)| k == "PATH" && v == path));
        }
    }
}
