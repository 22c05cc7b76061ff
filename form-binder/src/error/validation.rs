//! Aggregate validation failure

use super::ValueError;

/// Every field error that blocked a submit.
///
/// Raised by [`Binder::submit_to`](crate::Binder::submit_to), either because
/// local validation left errors behind or because the endpoint rejected
/// individual fields.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Validation failed with {} error(s)", .errors.len())]
pub struct ValidationError {
    errors: Vec<ValueError>,
}

impl ValidationError {
    /// Creates a validation error from the full error list.
    pub fn new(errors: Vec<ValueError>) -> Self {
        Self { errors }
    }

    /// Returns the field errors.
    pub fn errors(&self) -> &[ValueError] {
        &self.errors
    }

    /// Consumes the error, returning the field errors.
    pub fn into_errors(self) -> Vec<ValueError> {
        self.errors
    }
}
