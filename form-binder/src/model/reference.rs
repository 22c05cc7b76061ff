//! Binder-scoped model references

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::Model;
use super::ModelPath;
use super::PathKey;
use super::resolve;
use crate::binder::BinderId;
use crate::validation::Validator;

/// A position inside the model tree of one particular binder.
///
/// `ModelRef` is the handle passed to [`Binder::for_model`](crate::Binder::for_model)
/// to obtain the [`BinderNode`](crate::BinderNode) of that position. References
/// obtained from one binder are rejected by every other binder.
#[derive(Clone)]
pub struct ModelRef {
    binder_id: BinderId,
    root: Arc<Model>,
    model: Arc<Model>,
    path: ModelPath,
}

impl ModelRef {
    /// Creates the root reference of a binder.
    pub(crate) fn root(binder_id: BinderId, root: Arc<Model>) -> Self {
        Self {
            binder_id,
            model: Arc::clone(&root),
            root,
            path: ModelPath::root(),
        }
    }

    pub(crate) fn binder_id(&self) -> BinderId {
        self.binder_id
    }

    /// Returns the dot/bracket name of this position (empty for the root).
    pub fn name(&self) -> String {
        self.path.to_string()
    }

    /// Returns the path from the root to this position.
    pub fn path(&self) -> &ModelPath {
        &self.path
    }

    /// Returns the key of this position within its parent.
    pub fn key(&self) -> Option<&PathKey> {
        self.path.last()
    }

    /// Returns `true` for the root position.
    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }

    /// Returns the model describing this position.
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Returns the validators attached to this position.
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        self.model.validators()
    }

    /// Returns the enclosing position, or `None` for the root.
    pub fn parent(&self) -> Option<ModelRef> {
        let path = self.path.parent()?;
        let model = resolve(&self.root, &path)?;
        Some(Self {
            binder_id: self.binder_id,
            root: Arc::clone(&self.root),
            model,
            path,
        })
    }

    /// Returns the child position at `key`, if the model describes one.
    pub fn child(&self, key: impl Into<PathKey>) -> Option<ModelRef> {
        let key = key.into();
        let model = Arc::clone(self.model.child(&key)?);
        Some(Self {
            binder_id: self.binder_id,
            root: Arc::clone(&self.root),
            model,
            path: self.path.child(key),
        })
    }

    /// Returns the named sub-field position.
    pub fn field(&self, name: &str) -> Option<ModelRef> {
        self.child(PathKey::Field(name.to_string()))
    }

    /// Returns the array element position at `index`.
    pub fn item(&self, index: usize) -> Option<ModelRef> {
        self.child(PathKey::Index(index))
    }

    /// Reads the value at this position out of a root value.
    ///
    /// Positions that do not exist in `root` read as `null`.
    pub fn value_in(&self, root: &Value) -> Value {
        self.path.read(root).cloned().unwrap_or(Value::Null)
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRef")
            .field("binder_id", &self.binder_id)
            .field("path", &self.path.to_string())
            .field("model", &self.model)
            .finish()
    }
}
