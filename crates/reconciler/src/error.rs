//! Error types for executor-delegated reconciliation.
//!
//! Every error is returned to the lifecycle dispatcher and surfaced to the
//! host verbatim. Nothing here is retried internally, so the categories exist
//! for user feedback only.

use crate::types::Event;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Longest payload fragment quoted in an error message.
const EXCERPT_LIMIT: usize = 256;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Provider defaults or resource settings are missing or mistyped.
    Configuration,
    /// The executor could not be started or reported failure.
    Executor,
    /// The executor ran but its output did not fit the event's contract.
    Response,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Invalid provider or resource configuration",
            Self::Executor => "Executor failed",
            Self::Response => "Unexpected executor response",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Configuration => {
                "Check id_key, executor, script and computed in the provider block or the resource"
            }
            Self::Executor => "Run the executor by hand with the same event and inspect its stderr",
            Self::Response => {
                "Make the executor print a JSON object (or a boolean for exists) on stdout"
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling a resource through an executor.
#[derive(Debug, Error)]
pub enum Error {
    /// No supported serialization format could decode the configuration.
    #[error("{}", decode_failure(.input, .attempts))]
    Decode {
        /// The raw configuration as supplied.
        input: Vec<u8>,
        /// Parser message for each format that was attempted, in order.
        attempts: Vec<String>,
    },

    /// A required parameter is absent from both provider defaults and the resource.
    #[error("missing required field '{field}' in {sources}")]
    MissingField {
        /// Name of the parameter.
        field: String,
        /// The sources that were consulted.
        sources: String,
    },

    /// A parameter or payload had the wrong shape.
    #[error("expected {field} to be {expected}, but got {actual}")]
    TypeMismatch {
        /// Name of the parameter or payload.
        field: String,
        /// The shape that was required.
        expected: &'static str,
        /// What was found instead.
        actual: String,
    },

    /// The executor could not be started.
    #[error("failed to execute '{program}': {source}")]
    Spawn {
        /// Program that was run.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The executor exited unsuccessfully.
    #[error("command error: '{program}' {}: {stderr}", exit_description(.code))]
    ExecutorExit {
        /// Program that was run.
        program: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured standard error, verbatim.
        stderr: String,
    },

    /// The decoded output is not the shape the event requires.
    #[error("expecting {expected} from executor on {event}, got '{}'", excerpt(.output))]
    ResponseShape {
        /// Event being processed.
        event: Event,
        /// The shape that was required.
        expected: &'static str,
        /// Raw executor output.
        output: String,
    },

    /// A create response lacked a usable identity.
    #[error("{reason} id attribute '{id_key}' in response: {}", excerpt(.response))]
    MissingIdentity {
        /// Configured id-key field name.
        id_key: String,
        /// Why the identity was rejected.
        reason: String,
        /// Raw executor output.
        response: String,
    },

    /// The `embedded` parameter names neither a handler nor a readable script.
    #[error("cannot read embedded script '{}': {source}", .path.display())]
    ScriptRead {
        /// Script path, resolved against the working directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An embedded handler or script reported failure.
    #[error("embedded handler '{name}' failed: {message}")]
    Handler {
        /// Registered handler name.
        name: String,
        /// Failure reported by the handler.
        message: String,
    },

    /// IO error while talking to the executor.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Decode { .. }
            | Self::MissingField { .. }
            | Self::TypeMismatch { .. }
            | Self::ScriptRead { .. } => ErrorCategory::Configuration,
            Self::Spawn { .. } | Self::ExecutorExit { .. } | Self::Handler { .. } | Self::Io(_) => {
                ErrorCategory::Executor
            }
            Self::ResponseShape { .. } | Self::MissingIdentity { .. } | Self::Json(_) => {
                ErrorCategory::Response
            }
        }
    }

    pub(crate) fn type_mismatch(field: &str, expected: &'static str, actual: &Value) -> Self {
        Self::TypeMismatch {
            field: field.to_string(),
            expected,
            actual: describe(actual),
        }
    }
}

/// Shorten a payload for inclusion in an error message.
pub(crate) fn excerpt(text: &str) -> String {
    let text = text.trim_end();
    match text.char_indices().nth(EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Name the kind of a value along with a short rendering of it.
pub(crate) fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => return "null".to_string(),
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    };
    format!("{kind} {}", excerpt(&value.to_string()))
}

fn decode_failure(input: &[u8], attempts: &[String]) -> String {
    let input = String::from_utf8_lossy(input);
    let mut message = format!("expected JSON/YAML/TOML mapping but got: {}", excerpt(&input));
    if !attempts.is_empty() {
        message.push_str(" (");
        message.push_str(&attempts.join("; "));
        message.push(')');
    }
    message
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_excerpt_truncates_long_payloads() {
        let long = "x".repeat(EXCERPT_LIMIT + 10);
        let short = excerpt(&long);
        assert!(short.ends_with('…'));
        assert_eq!(short.chars().count(), EXCERPT_LIMIT + 1);
        assert_eq!(excerpt("short\n"), "short");
    }

    #[test]
    fn test_describe_values() {
        assert_eq!(describe(&Value::Null), "null");
        assert_eq!(describe(&json!(5)), "number 5");
        assert_eq!(describe(&json!({"a": 1})), r#"mapping {"a":1}"#);
    }

    #[test]
    fn test_executor_exit_message_keeps_stderr() {
        let err = Error::ExecutorExit {
            program: "python3".to_string(),
            code: Some(2),
            stderr: "boom\n".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("boom"));
        assert!(msg.contains("status 2"));
        assert_eq!(err.category(), ErrorCategory::Executor);
    }

    #[test]
    fn test_decode_message_lists_attempts() {
        let err = Error::Decode {
            input: b"[oops".to_vec(),
            attempts: vec!["json: EOF".to_string(), "yaml: bad".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "expected JSON/YAML/TOML mapping but got: [oops (json: EOF; yaml: bad)"
        );
    }

    #[test]
    fn test_categories() {
        let err = Error::MissingField {
            field: "id_key".to_string(),
            sources: "provider defaults or resource".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let err = Error::ResponseShape {
            event: Event::Exists,
            expected: "boolean",
            output: "{}".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Response);
        assert!(!err.category().advice().is_empty());
    }
}
