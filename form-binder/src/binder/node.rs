//! Per-position handles.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use super::Binder;
use crate::error::BinderError;
use crate::error::ValueError;
use crate::ledger::NodeKey;
use crate::model::ModelRef;
use crate::model::PathKey;
use crate::validation::PendingValidation;
use crate::validation::Validator;

/// Handle over one addressable position of a bound value.
///
/// Nodes are created lazily by [`Binder::for_model`], [`field`](Self::field)
/// and [`item`](Self::item); all handles for the same position share one
/// state inside the binder. A node holds a reference to its binder and its
/// position only, never to other nodes.
///
/// After [`delete`](Self::delete) a handle stays detached: it reads as not
/// visited and without errors, even if the same position is registered
/// again later.
#[derive(Clone)]
pub struct BinderNode {
    binder: Binder,
    model: ModelRef,
    generation: u64,
}

impl BinderNode {
    pub(crate) fn new(binder: Binder, model: ModelRef, generation: u64) -> Self {
        Self {
            binder,
            model,
            generation,
        }
    }

    pub(crate) fn key(&self) -> NodeKey {
        NodeKey::new(self.model.path().clone(), self.generation)
    }

    /// Returns the binder owning this node.
    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// Returns the model reference of this position.
    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Returns the dot/bracket name of this position.
    pub fn name(&self) -> String {
        self.model.name()
    }

    /// Returns `true` for the root node.
    pub fn is_root(&self) -> bool {
        self.model.is_root()
    }

    /// Returns the parent node. The root is its own parent.
    ///
    /// A deleted parent is returned as is and not registered again.
    pub fn parent(&self) -> BinderNode {
        match self.model.parent() {
            Some(parent) => self.binder.lookup(parent),
            None => self.clone(),
        }
    }

    /// Returns the node of a named sub-field.
    pub fn field(&self, name: &str) -> Result<BinderNode, BinderError> {
        self.child(PathKey::Field(name.to_string()))
    }

    /// Returns the node of an array element.
    pub fn item(&self, index: usize) -> Result<BinderNode, BinderError> {
        self.child(PathKey::Index(index))
    }

    fn child(&self, key: PathKey) -> Result<BinderNode, BinderError> {
        match self.model.child(key.clone()) {
            Some(model) => self.binder.for_model(&model),
            None => Err(BinderError::UnknownPath(
                self.model.path().child(key).to_string(),
            )),
        }
    }

    // =========================================================================
    // Value
    // =========================================================================

    /// Returns the current value at this position (`null` if absent).
    pub fn value(&self) -> Value {
        self.binder.value_at(self.model.path())
    }

    /// Writes a new value at this position.
    ///
    /// If the node was already visited or is invalid, this node and its
    /// ancestors are validated again; untouched fields are left alone.
    pub fn set_value(&self, value: Value) {
        self.binder.write_at(self.model.path(), value);
        if self.visited() || self.invalid() {
            self.request_validation_with_parents();
        }
    }

    /// Returns the default value at this position, derived from the binder's
    /// default value. For the root this is the binder's default value.
    pub fn default_value(&self) -> Value {
        self.binder.default_value_at(self.model.path())
    }

    /// Returns `true` if the value differs from the default value.
    pub fn dirty(&self) -> bool {
        self.value() != self.default_value()
    }

    /// Returns the validators attached to this position.
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        self.model.validators()
    }

    // =========================================================================
    // Interaction state
    // =========================================================================

    /// Returns `true` once the user has interacted with this node.
    pub fn visited(&self) -> bool {
        self.binder.node_visited(&self.key())
    }

    /// Marks the node as (not) visited and validates it if visited.
    ///
    /// Ignored on deleted nodes.
    pub fn set_visited(&self, visited: bool) {
        if !self.binder.set_node_visited(&self.key(), visited) {
            log::debug!("Ignoring visited flag on deleted node '{}'", self.model.path());
            return;
        }
        if visited {
            self.request_validation_with_parents();
        }
    }

    /// Returns the last validation failures of this node (not descendants).
    pub fn errors(&self) -> Vec<ValueError> {
        self.binder.node_errors(&self.key())
    }

    /// Returns `true` if this node has errors.
    pub fn invalid(&self) -> bool {
        self.binder.node_invalid(&self.key())
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Requests a run of every validator attached to this node.
    pub fn request_validation(&self) -> Vec<PendingValidation> {
        self.validators()
            .iter()
            .map(|validator| self.binder.request_validation(self, validator))
            .collect()
    }

    /// Requests validation of this node followed by each of its ancestors,
    /// so whole-object validators see changes of their fields.
    pub fn request_validation_with_parents(&self) -> Vec<PendingValidation> {
        let mut pending = self.request_validation();
        if !self.is_root() {
            pending.extend(self.parent().request_validation_with_parents());
        }
        pending
    }

    /// Validates this node and its ancestors, if the node has been visited.
    pub async fn validate(&self) {
        if !self.visited() {
            return;
        }
        join_all(self.request_validation_with_parents()).await;
    }

    /// Removes this node from the binder.
    ///
    /// Descendants stay registered and validations already scheduled keep
    /// running; their results are discarded.
    pub fn delete(&self) {
        self.binder.remove_node(&self.key());
    }
}

impl PartialEq for BinderNode {
    fn eq(&self, other: &Self) -> bool {
        self.binder.id() == other.binder.id()
            && self.generation == other.generation
            && self.model.path() == other.model.path()
    }
}

impl Eq for BinderNode {}

impl fmt::Debug for BinderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinderNode")
            .field("binder", &self.binder.id())
            .field("name", &self.name())
            .finish()
    }
}
