//! # Reconciler
//!
//! Executor-delegated resource reconciliation.
//!
//! The host owns resource records and decides when to create, read, update,
//! delete or check them. This crate turns each of those lifecycle events into
//! a call to an external executor (any program plus a script) and folds the
//! executor's answer back into the record.
//!
//! ## Core Concepts
//!
//! - **ResourceInstance**: identity, declared configuration, computed fields
//!   and per-resource parameter overrides
//! - **EffectiveParameters**: provider defaults merged with the resource's
//!   overrides, built fresh for every event
//! - **Invoker**: runs the event, either as a child process or in-process
//!   through a registered handler or a Rhai script
//! - **Outcome**: the updated record, or the answer to `exists`
//!
//! ## Example
//!
//! ```ignore
//! use reconciler::{Provider, ResourceInstance};
//! use serde_json::json;
//!
//! let provider = Provider::new(Some(json!({
//!     "id_key": "id",
//!     "executor": "python3",
//!     "script": "albums.py",
//!     "computed": "[\"created\"]",
//! })));
//!
//! let created = provider.create(&ResourceInstance::new("album: white\n"))?;
//! assert!(created.has_identity());
//! ```
//!
//! ## Executor Contract
//!
//! The executor is run as `executor <script> <event>`. Every effective
//! parameter is exported under its own name, entries of the `environment`
//! mapping are exported as they are, and the id-key field carries the
//! current identity. Standard input holds the declared configuration as
//! canonical JSON (empty for `delete`). Standard output holds nothing, a
//! JSON boolean (`exists`) or a JSON object. A non-zero exit is a failure
//! and its stderr is reported verbatim.

pub mod decode;
pub mod defaults;
pub mod diff;
pub mod environment;
pub mod error;
pub mod invoker;
pub mod provider;
pub mod response;
pub mod types;

// Re-export main types at crate root
pub use decode::{canonical_json, canonical_string, decode, decode_map};
pub use defaults::{FieldSource, resolve, resolve_essentials};
pub use diff::{COMPUTED_MARKER, ConfigDiff, FieldChange, suppress};
pub use environment::AmbientEnvironment;
pub use error::{Error, ErrorCategory, Result};
pub use invoker::{EmbeddedInvoker, HandlerResult, Invoker, ProcessInvoker, ScriptContext, ScriptHandler};
pub use provider::Provider;
pub use response::{decode_response, process};
pub use types::{
    CommandOutput, EffectiveParameters, Event, ExecutorRequest, ExecutorResponse, Outcome,
    ResourceInstance,
};
