//! Value model tree
//!
//! A [`Model`] describes the shape of a bound value: which sub-fields exist,
//! how an empty instance looks, and which validators apply at each position.
//! Models are immutable and shared between every binder built from them.
//!
//! # Example
//!
//! ```
//! use form_binder::model::Model;
//! use form_binder::validation::Required;
//!
//! let person = Model::object("Person")
//!     .field("name", Model::string().validator(Required::new("Name is required")))
//!     .field("tags", Model::array(Model::string()));
//!
//! assert_eq!(person.empty_value(), serde_json::json!({"name": "", "tags": []}));
//! ```

mod path;
mod reference;

use std::fmt;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;

pub use path::*;
pub use reference::*;

use crate::validation::Validator;

/// The structural kind of a model position.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Boolean leaf, empty value `false`.
    Boolean,
    /// Numeric leaf, empty value `0`.
    Number,
    /// String leaf, empty value `""`.
    String,
    /// Object with named sub-fields, in declaration order.
    Object(Vec<(String, Arc<Model>)>),
    /// Array whose every element follows the item model.
    Array(Arc<Model>),
}

/// Description of one position in a value tree.
#[derive(Clone)]
pub struct Model {
    type_name: Option<String>,
    shape: Shape,
    validators: Vec<Arc<dyn Validator>>,
}

impl Model {
    fn with_shape(shape: Shape) -> Self {
        Self {
            type_name: None,
            shape,
            validators: Vec::new(),
        }
    }

    /// Creates a boolean model.
    pub fn boolean() -> Self {
        Self::with_shape(Shape::Boolean)
    }

    /// Creates a numeric model.
    pub fn number() -> Self {
        Self::with_shape(Shape::Number)
    }

    /// Creates a string model.
    pub fn string() -> Self {
        Self::with_shape(Shape::String)
    }

    /// Creates an object model without fields.
    pub fn object(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::with_shape(Shape::Object(Vec::new()))
        }
    }

    /// Creates an array model whose elements follow `item`.
    pub fn array(item: Model) -> Self {
        Self::with_shape(Shape::Array(Arc::new(item)))
    }

    /// Adds a named sub-field (builder pattern).
    ///
    /// Only object models have fields; on other shapes the call is ignored
    /// and logged.
    pub fn field(mut self, name: impl Into<String>, model: Model) -> Self {
        let name = name.into();
        match &mut self.shape {
            Shape::Object(fields) => fields.push((name, Arc::new(model))),
            shape => log::warn!("Ignoring field '{}' on non-object model {:?}", name, shape),
        }
        self
    }

    /// Attaches a validator (builder pattern).
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Attaches an already shared validator (builder pattern).
    pub fn shared_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Returns the declared type name, if any.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Returns the structural kind of this model.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the validators attached to this position, in declaration order.
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    /// Returns the declaration index of `validator` on this model.
    pub(crate) fn validator_position(&self, validator: &Arc<dyn Validator>) -> Option<usize> {
        self.validators
            .iter()
            .position(|candidate| Arc::ptr_eq(candidate, validator))
    }

    /// Builds the canonical empty instance of this model.
    pub fn empty_value(&self) -> Value {
        match &self.shape {
            Shape::Boolean => Value::Bool(false),
            Shape::Number => Value::from(0),
            Shape::String => Value::String(String::new()),
            Shape::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, model)| (name.clone(), model.empty_value()))
                    .collect::<Map<_, _>>(),
            ),
            Shape::Array(_) => Value::Array(Vec::new()),
        }
    }

    /// Returns the model of the child at `key`, if this shape has one.
    pub fn child(&self, key: &PathKey) -> Option<&Arc<Model>> {
        match (&self.shape, key) {
            (Shape::Object(fields), PathKey::Field(name)) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, model)| model),
            (Shape::Array(item), PathKey::Index(_)) => Some(item),
            _ => None,
        }
    }
}

/// Walks `path` down from `root`, returning the model found there.
pub(crate) fn resolve(root: &Arc<Model>, path: &ModelPath) -> Option<Arc<Model>> {
    path.keys()
        .iter()
        .try_fold(Arc::clone(root), |model, key| model.child(key).cloned())
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("type_name", &self.type_name)
            .field("shape", &self.shape)
            .field("validators", &self.validators.len())
            .finish()
    }
}
