//! Field-level validation failures

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::validation::Validator;

/// A single failed validation of one field.
///
/// `ValueError`s are non-fatal: they accumulate in the
/// [`errors`](crate::BinderNode::errors) of the node they belong to and only
/// become an `Err` when a submit is attempted.
#[derive(Clone)]
pub struct ValueError {
    /// Dot/bracket name of the field, e.g. `address.street`.
    pub property: String,
    /// The offending value.
    pub value: Value,
    /// The validator that rejected the value.
    pub validator: Arc<dyn Validator>,
}

impl ValueError {
    /// Creates a new value error.
    pub fn new(property: impl Into<String>, value: Value, validator: Arc<dyn Validator>) -> Self {
        Self {
            property: property.into(),
            value,
            validator,
        }
    }

    /// Returns the failure message of the rejecting validator.
    pub fn message(&self) -> &str {
        self.validator.message()
    }
}

impl fmt::Debug for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueError")
            .field("property", &self.property)
            .field("value", &self.value)
            .field("message", &self.message())
            .finish()
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.property.is_empty() {
            write!(f, "{}", self.message())
        } else {
            write!(f, "{}: {}", self.property, self.message())
        }
    }
}
