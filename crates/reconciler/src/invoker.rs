//! Executor invocation backends
//!
//! An [`Invoker`] runs one lifecycle event and returns whatever the executor
//! wrote. [`ProcessInvoker`] spawns the configured program; [`EmbeddedInvoker`]
//! calls a handler registered in-process or evaluates a Rhai script. Both see
//! the same parameters and their output goes through the same response
//! processing.

use crate::environment::parameter_bindings;
use crate::error::{Error, Result};
use crate::types::{CommandOutput, EffectiveParameters, Event, ExecutorRequest};
use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Dynamic, Engine, Scope};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// Runs lifecycle events on behalf of the provider.
pub trait Invoker: Send + Sync {
    /// Get the name of this invoker.
    fn name(&self) -> &'static str;

    /// Run the event described by `request` and return the raw output.
    fn invoke(&self, params: &EffectiveParameters, request: &ExecutorRequest) -> Result<Vec<u8>>;
}

/// Invoker that spawns `executor <script> <event>` as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }

    /// Spawn the executor and capture its output.
    ///
    /// Blocks until the child exits. There is no timeout.
    pub fn run(&self, program: &str, script: &Path, request: &ExecutorRequest) -> Result<CommandOutput> {
        log::debug!(
            "running {} {} {}",
            program,
            script.display(),
            request.event
        );

        let mut child = Command::new(program)
            .arg(script)
            .arg(request.event.as_str())
            .env_clear()
            .envs(request.environment.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdin = child.stdin.take();
        let input = request.stdin.as_slice();

        // The child may exit without reading its input, so the write happens
        // on its own thread while stdout and stderr are drained here.
        let (output, written) = thread::scope(|s| {
            let writer = stdin.map(|mut pipe| {
                s.spawn(move || match pipe.write_all(input) {
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                })
            });
            let output = child.wait_with_output();
            let written = writer.map_or(Ok(()), |handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")))
            });
            (output, written)
        });

        let output = CommandOutput::from(output?);
        if let Err(e) = written {
            log::warn!("failed to write configuration to {program}: {e}");
        }
        Ok(output)
    }
}

impl Invoker for ProcessInvoker {
    fn name(&self) -> &'static str {
        "process"
    }

    fn invoke(&self, params: &EffectiveParameters, request: &ExecutorRequest) -> Result<Vec<u8>> {
        let program = params.executor.as_deref().unwrap_or_default();
        let script = absolute_script(params.script.as_deref().unwrap_or_default());

        let output = self.run(program, &script, request)?;

        if !output.success {
            return Err(Error::ExecutorExit {
                program: program.to_string(),
                code: output.code,
                stderr: output.stderr_str(),
            });
        }

        let stderr = output.stderr_str();
        if !stderr.trim().is_empty() {
            log::debug!("{program} stderr: {}", stderr.trim_end());
        }

        Ok(output.stdout)
    }
}

/// Resolve a script path against the current working directory.
fn absolute_script(script: &str) -> PathBuf {
    std::path::absolute(script).unwrap_or_else(|e| {
        log::debug!("cannot make '{script}' absolute: {e}");
        PathBuf::from(script)
    })
}

/// What an embedded handler is given for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptContext {
    pub event: Event,
    /// Current identity, empty when unset
    pub identity: String,
    /// Parameter bindings, as a process executor would see them in its
    /// environment (without the ambient variables)
    pub bindings: BTreeMap<String, String>,
    /// Declared configuration, `None` for delete
    pub config: Option<Map<String, Value>>,
}

/// What an embedded handler answers: a JSON value or a failure message
pub type HandlerResult = std::result::Result<Value, String>;

/// An in-process executor.
///
/// Returning `Value::Null` is the same as a process writing nothing.
pub trait ScriptHandler: Send + Sync {
    fn handle(&self, context: &ScriptContext) -> HandlerResult;
}

impl<F> ScriptHandler for F
where
    F: Fn(&ScriptContext) -> HandlerResult + Send + Sync,
{
    fn handle(&self, context: &ScriptContext) -> HandlerResult {
        self(context)
    }
}

/// Invoker behind the `embedded` parameter.
///
/// A name registered with [`register`](Self::register) runs that handler.
/// Any other value is the path of a Rhai script, resolved against the
/// working directory and evaluated in a fresh engine for every event. The
/// script sees each binding as a string variable, plus `config` (an object
/// map, `()` for delete) and `event`. Its final expression is the response.
#[derive(Default)]
pub struct EmbeddedInvoker {
    handlers: BTreeMap<String, Box<dyn ScriptHandler>>,
}

impl EmbeddedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: impl ScriptHandler + 'static) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_handler(mut self, name: impl Into<String>, handler: impl ScriptHandler + 'static) -> Self {
        self.register(name, handler);
        self
    }

    fn context(params: &EffectiveParameters, request: &ExecutorRequest) -> Result<ScriptContext> {
        let identity = request
            .effective_environment()
            .get(params.id_key.as_str())
            .map(|id| (*id).to_string())
            .unwrap_or_default();

        let config = if request.event.sends_config() && !request.stdin.is_empty() {
            Some(serde_json::from_slice(&request.stdin)?)
        } else {
            None
        };

        Ok(ScriptContext {
            event: request.event,
            bindings: parameter_bindings(params, &identity).into_iter().collect(),
            identity,
            config,
        })
    }
}

impl std::fmt::Debug for EmbeddedInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedInvoker")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Invoker for EmbeddedInvoker {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn invoke(&self, params: &EffectiveParameters, request: &ExecutorRequest) -> Result<Vec<u8>> {
        let name = params.embedded.as_deref().unwrap_or_default();
        let context = Self::context(params, request)?;

        let value = match self.handlers.get(name) {
            Some(handler) => {
                log::debug!("calling embedded handler '{name}' for {}", request.event);
                handler.handle(&context).map_err(|message| Error::Handler {
                    name: name.to_string(),
                    message,
                })?
            }
            None => run_script(&absolute_script(name), &context)?,
        };

        match value {
            Value::Null => Ok(Vec::new()),
            value => Ok(serde_json::to_vec(&value)?),
        }
    }
}

/// Evaluate a Rhai script file against `context`.
fn run_script(path: &Path, context: &ScriptContext) -> Result<Value> {
    log::debug!("evaluating {} for {}", path.display(), context.event);
    let source = fs::read_to_string(path).map_err(|source| Error::ScriptRead {
        path: path.to_path_buf(),
        source,
    })?;
    let failed = |message: String| Error::Handler {
        name: path.display().to_string(),
        message,
    };

    // stdout belongs to the host
    let mut engine = Engine::new();
    engine.on_print(|text| log::info!("script: {text}"));
    engine.on_debug(|text, _, pos| log::debug!("script {pos}: {text}"));

    let mut scope = Scope::new();
    for (name, value) in &context.bindings {
        scope.push(name.as_str(), value.clone());
    }
    let config = match &context.config {
        Some(config) => to_dynamic(config).map_err(|e| failed(e.to_string()))?,
        None => Dynamic::UNIT,
    };
    scope.push_dynamic("config", config);
    scope.push("event", context.event.as_str().to_string());

    let result = engine
        .eval_with_scope::<Dynamic>(&mut scope, &source)
        .map_err(|e| failed(e.to_string()))?;
    from_dynamic::<Value>(&result).map_err(|e| failed(e.to_string()))
}
