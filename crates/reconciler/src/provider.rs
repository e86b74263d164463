//! Lifecycle dispatch
//!
//! [`Provider`] runs one lifecycle event for one resource: it resolves the
//! effective parameters, normalizes the declared configuration, hands the
//! request to an invoker and processes what comes back.

use crate::decode::decode;
use crate::defaults::resolve_essentials;
use crate::environment::AmbientEnvironment;
use crate::error::{Error, Result};
use crate::invoker::{EmbeddedInvoker, Invoker, ProcessInvoker, ScriptHandler};
use crate::response::process;
use crate::types::{EffectiveParameters, Event, ExecutorRequest, Outcome, ResourceInstance};
use serde_json::Value;

/// Provider-level defaults plus the means to run executors
#[derive(Debug, Default)]
pub struct Provider {
    defaults: Option<Value>,
    ambient: AmbientEnvironment,
    process: ProcessInvoker,
    embedded: EmbeddedInvoker,
}

impl Provider {
    /// Create a provider with the given defaults and a snapshot of the
    /// current process environment.
    pub fn new(defaults: Option<Value>) -> Self {
        Self {
            defaults,
            ambient: AmbientEnvironment::capture(),
            ..Default::default()
        }
    }

    /// Replace the ambient environment snapshot.
    pub fn with_ambient(mut self, ambient: AmbientEnvironment) -> Self {
        self.ambient = ambient;
        self
    }

    /// Register an embedded handler.
    pub fn with_handler(mut self, name: impl Into<String>, handler: impl ScriptHandler + 'static) -> Self {
        self.embedded.register(name, handler);
        self
    }

    /// Resolve the parameters `event` would run with.
    pub fn parameters(&self, event: Event, instance: &ResourceInstance) -> Result<EffectiveParameters> {
        resolve_essentials(event, instance, self.defaults.as_ref()).map(|(params, _)| params)
    }

    /// Run `event` against `instance`.
    ///
    /// `instance` is never modified; on success the outcome carries the
    /// updated record.
    pub fn call(&self, event: Event, instance: &ResourceInstance) -> Result<Outcome> {
        let (params, identity) = resolve_essentials(event, instance, self.defaults.as_ref())?;

        let config = if event.sends_config() {
            decode(instance.declared_config.as_bytes())?
        } else {
            Vec::new()
        };

        let request = ExecutorRequest::build(event, &params, &identity, &config, &self.ambient);
        let invoker = self.invoker(&params);

        log::info!(
            "{event} '{}' via {} invoker",
            display_identity(&identity),
            invoker.name()
        );
        let raw = invoker.invoke(&params, &request)?;
        log::debug!("{event} output: {}", String::from_utf8_lossy(&raw).trim_end());

        process(event, &raw, &params, instance)
    }

    fn invoker(&self, params: &EffectiveParameters) -> &dyn Invoker {
        if params.embedded.is_some() {
            &self.embedded
        } else {
            &self.process
        }
    }

    pub fn create(&self, instance: &ResourceInstance) -> Result<ResourceInstance> {
        self.applied(Event::Create, instance)
    }

    pub fn read(&self, instance: &ResourceInstance) -> Result<ResourceInstance> {
        self.applied(Event::Read, instance)
    }

    pub fn update(&self, instance: &ResourceInstance) -> Result<ResourceInstance> {
        self.applied(Event::Update, instance)
    }

    /// Delete the resource. Identity is cleared only if the executor succeeds.
    pub fn delete(&self, instance: &ResourceInstance) -> Result<ResourceInstance> {
        self.applied(Event::Delete, instance)
    }

    pub fn exists(&self, instance: &ResourceInstance) -> Result<bool> {
        match self.call(Event::Exists, instance)? {
            Outcome::Exists(exists) => Ok(exists),
            Outcome::Applied(_) => Err(unexpected(Event::Exists, "a boolean")),
        }
    }

    fn applied(&self, event: Event, instance: &ResourceInstance) -> Result<ResourceInstance> {
        match self.call(event, instance)? {
            Outcome::Applied(updated) => Ok(updated),
            Outcome::Exists(_) => Err(unexpected(event, "a JSON object")),
        }
    }
}

fn unexpected(event: Event, expected: &'static str) -> Error {
    Error::ResponseShape {
        event,
        expected,
        output: String::new(),
    }
}

fn display_identity(identity: &str) -> &str {
    if identity.is_empty() { "<new>" } else { identity }
}
