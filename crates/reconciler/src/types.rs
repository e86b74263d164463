//! Core types for executor-delegated reconciliation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::process::Output;
use std::str::FromStr;

/// Lifecycle event the host asks the executor to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Create,
    Read,
    Update,
    Delete,
    Exists,
}

impl Event {
    /// All events, in lifecycle order
    pub const ALL: [Event; 5] = [
        Event::Create,
        Event::Read,
        Event::Update,
        Event::Delete,
        Event::Exists,
    ];

    /// Name passed to the executor as its second argument
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Exists => "exists",
        }
    }

    /// Whether the declared configuration is sent on standard input
    pub fn sends_config(&self) -> bool {
        !matches!(self, Self::Delete)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown lifecycle event '{s}'"))
    }
}

/// A resource record as threaded through lifecycle events by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    /// External identity; empty until `create` succeeds and after `delete`
    #[serde(default)]
    pub identity: String,

    /// Declared configuration in any accepted encoding. Successful
    /// create/read/update events replace it with canonical JSON.
    #[serde(default)]
    pub declared_config: String,

    /// Fields owned by the executor, excluded from change detection
    #[serde(default)]
    pub computed_config: Map<String, Value>,

    /// Per-resource parameter values that override provider defaults
    #[serde(default)]
    pub overrides: Map<String, Value>,
}

impl ResourceInstance {
    /// Create an instance with a declared configuration and no identity
    pub fn new(declared_config: impl Into<String>) -> Self {
        Self {
            declared_config: declared_config.into(),
            ..Default::default()
        }
    }

    /// Set a per-resource parameter override
    pub fn with_override(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.overrides.insert(name.to_string(), value.into());
        self
    }

    /// Whether the resource has been created
    pub fn has_identity(&self) -> bool {
        !self.identity.is_empty()
    }
}

/// Merged per-invocation parameters, built fresh for every event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveParameters {
    /// Response field that carries the resource identity
    pub id_key: String,
    /// Program to run
    pub executor: Option<String>,
    /// Script passed as the first argument to the executor
    pub script: Option<String>,
    /// Registered in-process handler used instead of a process
    pub embedded: Option<String>,
    /// Entries from the `environment` mapping
    pub environment: BTreeMap<String, String>,
    /// Response fields routed to the computed configuration
    pub computed: BTreeSet<String>,
    /// The `computed` parameter as supplied (a JSON array)
    pub computed_source: Option<String>,
    /// Other string-valued provider defaults, exported verbatim
    pub extras: BTreeMap<String, String>,
}

impl EffectiveParameters {
    /// String-valued parameters in the order they are exported
    pub fn string_entries(&self) -> Vec<(&str, &str)> {
        let named = [
            ("id_key", Some(self.id_key.as_str())),
            ("executor", self.executor.as_deref()),
            ("script", self.script.as_deref()),
            ("embedded", self.embedded.as_deref()),
            ("computed", self.computed_source.as_deref()),
        ];
        named
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .chain(self.extras.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .collect()
    }
}

/// Everything an invoker needs to run one lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorRequest {
    pub event: Event,
    /// `NAME=value` entries in deterministic order; later entries win
    pub environment: Vec<(String, String)>,
    /// Canonical JSON of the declared configuration, empty for delete
    pub stdin: Vec<u8>,
}

/// Decoded executor output
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorResponse {
    /// Nothing was written
    Null,
    /// A JSON boolean, the `exists` answer
    Bool(bool),
    /// A JSON object, the answer to every other event
    Object(Map<String, Value>),
    /// Any other JSON value
    Other(Value),
}

impl ExecutorResponse {
    /// Short name of the response shape
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Null => "nothing",
            Self::Bool(_) => "boolean",
            Self::Object(_) => "mapping",
            Self::Other(_) => "other value",
        }
    }
}

impl From<Value> for ExecutorResponse {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Object(map) => Self::Object(map),
            other @ (Value::Number(_) | Value::String(_) | Value::Array(_)) => Self::Other(other),
        }
    }
}

/// Result of a lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Answer to `exists`; the record is untouched
    Exists(bool),
    /// The updated record after create/read/update/delete
    Applied(ResourceInstance),
}

impl Outcome {
    /// The updated record, if the event produced one
    pub fn instance(&self) -> Option<&ResourceInstance> {
        match self {
            Self::Applied(instance) => Some(instance),
            Self::Exists(_) => None,
        }
    }

    /// Consume the outcome, returning the updated record
    pub fn into_instance(self) -> Option<ResourceInstance> {
        match self {
            Self::Applied(instance) => Some(instance),
            Self::Exists(_) => None,
        }
    }
}

/// Captured output from an executor process
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    pub code: Option<i32>,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

impl CommandOutput {
    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}
