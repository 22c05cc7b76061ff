//! Submit endpoint failures
//!
//! Submit functions report failures as [`EndpointError`]. A structured
//! rejection lists the offending parameters; the binder turns each entry into
//! a [`ValueError`] so rejected fields surface exactly like local errors.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::error::ValueError;
use crate::validation::ServerValidator;

/// Matches the message format of server-side bean validation failures.
static SERVER_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Object of type '(.+)' has invalid property '(.+)' with value '(.+)', validation error: '(.+)'",
    )
    .expect("Invalid server message pattern")
});

/// One rejected parameter as reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrorData {
    /// Name of the rejected parameter.
    pub parameter_name: String,
    /// Server message, usually in the bean validation format.
    pub message: String,
}

impl ValidationErrorData {
    /// Creates a rejection entry.
    pub fn new(parameter_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            message: message.into(),
        }
    }

    /// Converts this entry into a field error.
    ///
    /// Messages in the bean validation format yield the property path, the
    /// offending value and the bare validation message. Anything else falls
    /// back to the parameter name and the raw message.
    pub fn to_value_error(&self) -> ValueError {
        let (property, value, message) = match SERVER_MESSAGE.captures(&self.message) {
            Some(caps) => (
                caps[2].to_string(),
                Value::String(caps[3].to_string()),
                caps[4].to_string(),
            ),
            None => (
                self.parameter_name.clone(),
                Value::Null,
                self.message.clone(),
            ),
        };

        ValueError::new(property, value, Arc::new(ServerValidator::new(message)))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailureBody {
    #[serde(default)]
    validation_error_data: Vec<ValidationErrorData>,
}

/// Failure reported by a submit function.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The endpoint rejected individual parameters.
    #[error("Endpoint rejected {} parameter(s)", .0.len())]
    Rejected(Vec<ValidationErrorData>),

    /// Any other failure (transport, authorization, server fault, ...).
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl EndpointError {
    /// Wraps an arbitrary failure.
    pub fn other(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(error.into())
    }

    /// Interprets a JSON failure body returned by the endpoint.
    ///
    /// Bodies carrying a non-empty `validationErrorData` list become
    /// [`Rejected`](Self::Rejected); everything else, including bodies that
    /// are not JSON, becomes [`Other`](Self::Other) with the body as message.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<FailureBody>(body) {
            Ok(failure) if !failure.validation_error_data.is_empty() => {
                Self::Rejected(failure.validation_error_data)
            }
            _ => Self::other(body.to_string()),
        }
    }
}

/// Translates a structured rejection into a single validation error.
pub(crate) fn translate_rejection(data: &[ValidationErrorData]) -> ValidationError {
    ValidationError::new(data.iter().map(ValidationErrorData::to_value_error).collect())
}
