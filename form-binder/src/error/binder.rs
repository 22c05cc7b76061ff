//! Binder operation errors

use super::ValidationError;

/// Errors returned by [`Binder`](crate::Binder) operations.
#[derive(Debug, thiserror::Error)]
pub enum BinderError {
    /// Submit was refused because fields are invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The model reference belongs to a different binder.
    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    /// The model does not describe the requested child position.
    #[error("No model at '{0}'")]
    UnknownPath(String),

    /// The submit endpoint failed for a reason other than field validation.
    #[error("Submit failed: {0}")]
    Submit(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BinderError {
    /// Returns the field errors if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&[crate::ValueError]> {
        match self {
            Self::Validation(err) => Some(err.errors()),
            _ => None,
        }
    }
}
